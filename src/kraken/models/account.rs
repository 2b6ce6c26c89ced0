//! Account, funding and order models for private REST endpoints.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Entry of the public `Assets` result.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetInfo {
    pub altname: String,
    /// `"enabled"`, `"deposit_only"`, `"withdrawal_only"` or
    /// `"funding_temporarily_disabled"`. Absent on older responses.
    #[serde(default)]
    pub status: Option<String>,
}

impl AssetInfo {
    /// Whether deposits and withdrawals are both open.
    pub fn is_enabled(&self) -> bool {
        self.status.as_deref().is_none_or(|s| s == "enabled")
    }
}

/// Entry of the private `BalanceEx` result.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ExtendedBalance {
    pub balance: Decimal,
    /// Amount reserved by open orders.
    #[serde(default)]
    pub hold_trade: Decimal,
}

impl ExtendedBalance {
    pub fn available(&self) -> Decimal {
        self.balance - self.hold_trade
    }
}

/// Entry of the `DepositMethods` result.
#[derive(Debug, Clone, Deserialize)]
pub struct DepositMethod {
    pub method: String,
}

/// Entry of the `DepositAddresses` result.
#[derive(Debug, Clone, Deserialize)]
pub struct DepositAddress {
    pub address: String,
}

/// `AddOrder` result.
#[derive(Debug, Clone, Deserialize)]
pub struct AddOrderResult {
    pub descr: OrderDescription,
    pub txid: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderDescription {
    pub order: String,
}

/// `Withdraw` result.
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawResult {
    pub refid: String,
}
