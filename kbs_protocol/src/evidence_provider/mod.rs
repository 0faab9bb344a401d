// Copyright (c) 2023 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

pub mod file;
pub use file::*;

pub mod mock;
pub use mock::*;

pub mod simulated;
pub use simulated::*;

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;

use crate::{
    types::{Evidence, Tee},
    Result,
};

#[async_trait]
pub trait EvidenceProvider: Send + Sync {
    /// Get a fresh evidence document. Every call carries a new nonce.
    async fn get_evidence(&self) -> Result<Evidence>;

    /// Get the underlying Tee type
    async fn get_tee_type(&self) -> Result<Tee>;
}

static LAST_NONCE: AtomicU64 = AtomicU64::new(0);

/// Time-derived nonce (unix seconds), strictly increasing within the
/// process even when called twice in the same second.
pub fn fresh_nonce() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let mut last = LAST_NONCE.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_NONCE.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next.to_string(),
            Err(current) => last = current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fresh_nonce;

    #[test]
    fn nonces_are_unique_and_increasing() {
        let nonces: Vec<u64> = (0..16)
            .map(|_| fresh_nonce().parse().expect("numeric nonce"))
            .collect();

        assert!(nonces.windows(2).all(|w| w[0] < w[1]));
    }
}
