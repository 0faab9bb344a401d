// Copyright (c) 2023 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use async_trait::async_trait;

use super::{fresh_nonce, EvidenceProvider};

use crate::{
    types::{Evidence, EvidenceMode, Tee},
    Result,
};

pub const DEFAULT_PLATFORM: &str = "kind-cluster";
pub const DEFAULT_MEASUREMENT: &str = "demo-measurement-hash";
pub const DEFAULT_SECURITY_VERSION: u64 = 2;

/// Evidence for demo deployments that run outside a real TEE. The claims
/// are taken from configuration; only the nonce changes between calls.
#[derive(Debug, Clone)]
pub struct SimulatedEvidenceProvider {
    platform: String,
    measurement: String,
    security_version: u64,
}

impl SimulatedEvidenceProvider {
    pub fn new(platform: &str, measurement: &str, security_version: u64) -> Self {
        Self {
            platform: platform.to_string(),
            measurement: measurement.to_string(),
            security_version,
        }
    }
}

impl Default for SimulatedEvidenceProvider {
    fn default() -> Self {
        Self::new(
            DEFAULT_PLATFORM,
            DEFAULT_MEASUREMENT,
            DEFAULT_SECURITY_VERSION,
        )
    }
}

#[async_trait]
impl EvidenceProvider for SimulatedEvidenceProvider {
    async fn get_evidence(&self) -> Result<Evidence> {
        Ok(Evidence {
            platform: self.platform.clone(),
            measurement: self.measurement.clone(),
            security_version: self.security_version,
            nonce: fresh_nonce(),
            mode: EvidenceMode::Simulated,
        })
    }

    async fn get_tee_type(&self) -> Result<Tee> {
        Ok(Tee::Sample)
    }
}
