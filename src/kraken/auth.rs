//! Kraken private REST request signing.
//!
//! Private endpoints require an `API-Key` header and an `API-Sign` header
//! computed over the URL path, a strictly increasing nonce and the POST
//! body.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};

use crate::Result;
use crate::TickwatchError;

/// Tracks the last nonce issued so every call returns a strictly
/// increasing value even when the wall-clock hasn't advanced.
///
/// Uses nanosecond resolution in a `u64`, which overflows around year 2554.
static LAST_NONCE: AtomicU64 = AtomicU64::new(0);

/// Returns a strictly monotonically-increasing nonce with nanosecond resolution.
///
/// A clock set before the UNIX epoch is treated as zero; monotonicity is
/// still guaranteed by the stored previous value.
pub(crate) fn next_nonce() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    let mut prev = LAST_NONCE.load(Ordering::Relaxed);
    loop {
        let nonce = now.max(prev + 1);
        match LAST_NONCE.compare_exchange_weak(prev, nonce, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return nonce,
            Err(actual) => prev = actual,
        }
    }
}

/// Builds the form body for a private call, nonce first.
pub(crate) fn post_data(nonce: u64, params: &[(&str, String)]) -> String {
    let mut body = format!("nonce={nonce}");
    for (key, value) in params {
        body.push('&');
        body.push_str(key);
        body.push('=');
        body.push_str(value);
    }
    body
}

/// Computes the `API-Sign` header value.
///
/// Algorithm: `Base64(HMAC-SHA512(Base64Decode(secret), path + SHA256(nonce + post_data)))`
pub(crate) fn sign(api_secret: &str, path: &str, nonce: u64, post_data: &str) -> Result<String> {
    let secret = BASE64_STANDARD.decode(api_secret).map_err(|e| {
        TickwatchError::Config(format!("invalid base64 api_secret: {e}"))
    })?;

    let mut sha256 = Sha256::new();
    sha256.update(format!("{nonce}{post_data}").as_bytes());
    let sha256_digest = sha256.finalize();

    let mut hmac_input = Vec::from(path.as_bytes());
    hmac_input.extend_from_slice(&sha256_digest);

    let mut mac = Hmac::<Sha512>::new_from_slice(&secret)
        .map_err(|e| TickwatchError::Config(format!("invalid HMAC key: {e}")))?;
    mac.update(&hmac_input);
    let result = mac.finalize().into_bytes();

    Ok(BASE64_STANDARD.encode(result))
}
