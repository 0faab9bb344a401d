// Copyright (c) 2023 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use async_trait::async_trait;

use super::EvidenceProvider;

use crate::{
    types::{Evidence, EvidenceMode, Tee},
    Result,
};

/// Returns the same evidence every time. Only meant for tests.
pub struct MockedEvidenceProvider {
    pub evidence: Evidence,
}

impl Default for MockedEvidenceProvider {
    fn default() -> Self {
        Self {
            evidence: Evidence {
                platform: "kind-cluster".into(),
                measurement: "demo-measurement-hash".into(),
                security_version: 2,
                nonce: "1700000000".into(),
                mode: EvidenceMode::Simulated,
            },
        }
    }
}

#[async_trait]
impl EvidenceProvider for MockedEvidenceProvider {
    async fn get_evidence(&self) -> Result<Evidence> {
        Ok(self.evidence.clone())
    }

    async fn get_tee_type(&self) -> Result<Tee> {
        Ok(Tee::Sample)
    }
}
