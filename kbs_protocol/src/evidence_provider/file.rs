// Copyright (c) 2023 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use super::{fresh_nonce, EvidenceProvider};

use crate::{
    types::{Evidence, EvidenceMode, Tee},
    Error, Result,
};

/// Claims document placed by the environment (e.g. by the TEE guest
/// tooling) before the fetcher starts.
#[derive(Deserialize, Debug)]
struct ClaimsDocument {
    platform: String,
    measurement: String,
    security_version: u64,
}

/// Reads environment-provided claims from a file and stamps them with a
/// fresh nonce.
pub struct FileEvidenceProvider {
    claims_path: PathBuf,
    tee: Tee,
}

impl FileEvidenceProvider {
    pub fn new(claims_path: impl Into<PathBuf>, tee: Tee) -> Self {
        Self {
            claims_path: claims_path.into(),
            tee,
        }
    }
}

#[async_trait]
impl EvidenceProvider for FileEvidenceProvider {
    async fn get_evidence(&self) -> Result<Evidence> {
        let raw = tokio::fs::read(&self.claims_path).await.map_err(|e| {
            Error::GetEvidence(format!("read {}: {e}", self.claims_path.display()))
        })?;
        let claims: ClaimsDocument = serde_json::from_slice(&raw).map_err(|e| {
            Error::GetEvidence(format!("parse {}: {e}", self.claims_path.display()))
        })?;

        Ok(Evidence {
            platform: claims.platform,
            measurement: claims.measurement,
            security_version: claims.security_version,
            nonce: fresh_nonce(),
            mode: EvidenceMode::Real,
        })
    }

    async fn get_tee_type(&self) -> Result<Tee> {
        Ok(self.tee)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn reads_claims_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"platform": "snp-host", "measurement": "abcd", "security_version": 7}}"#
        )
        .unwrap();

        let provider = FileEvidenceProvider::new(file.path(), Tee::Snp);
        let evidence = provider.get_evidence().await.unwrap();

        assert_eq!(evidence.platform, "snp-host");
        assert_eq!(evidence.measurement, "abcd");
        assert_eq!(evidence.security_version, 7);
        assert_eq!(evidence.mode, EvidenceMode::Real);
        assert_eq!(provider.get_tee_type().await.unwrap(), Tee::Snp);
    }

    #[tokio::test]
    async fn missing_file_is_evidence_error() {
        let provider = FileEvidenceProvider::new("/nonexistent/claims.json", Tee::Snp);
        let err = provider.get_evidence().await.unwrap_err();
        assert!(matches!(err, Error::GetEvidence(_)));
    }

    #[tokio::test]
    async fn malformed_claims_are_evidence_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"platform": "snp-host"}}"#).unwrap();

        let provider = FileEvidenceProvider::new(file.path(), Tee::Snp);
        let err = provider.get_evidence().await.unwrap_err();
        assert!(matches!(err, Error::GetEvidence(_)));
    }
}
