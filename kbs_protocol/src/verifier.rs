// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! Client of the attestation service that turns [`Evidence`] into a
//! [`Verdict`].

use std::time::Duration;

use log::debug;
use serde::Deserialize;
use serde_json::json;

use crate::{
    types::{Claims, Evidence},
    Error, Result,
};

/// Timeout of a single liveness probe.
pub const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

const REJECTION_FALLBACK_REASON: &str = "Unknown error";

/// Outcome of evidence evaluation. A rejection is a regular outcome, not
/// an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted { claims: Claims },
    Rejected { reason: String },
}

#[derive(Deserialize)]
struct AcceptedBody {
    tee_evidence: Claims,
}

#[derive(Deserialize)]
struct RejectedBody {
    error: Option<String>,
}

pub struct AttestationVerifier {
    as_url: String,
    http_client: reqwest::Client,
}

impl AttestationVerifier {
    pub fn new(as_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(format!("kbs-key-fetcher/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::BuildClient(e.to_string()))?;

        Ok(Self {
            as_url: as_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Probe `/health`. Any transport failure or non-success status means
    /// the service is not ready.
    pub async fn health(&self) -> Result<()> {
        let endpoint = format!("{}/health", self.as_url);
        let res = self
            .http_client
            .get(endpoint)
            .timeout(HEALTH_PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::VerifierUnavailable(e.to_string()))?;

        if !res.status().is_success() {
            return Err(Error::VerifierUnavailable(format!(
                "health check returned {}",
                res.status()
            )));
        }

        Ok(())
    }

    pub async fn attest(&self, evidence: &Evidence) -> Result<Verdict> {
        let endpoint = format!("{}/attest", self.as_url);
        debug!("send evidence with nonce {} to {endpoint}", evidence.nonce);

        let res = self
            .http_client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .json(&json!({ "evidence": evidence }))
            .send()
            .await
            .map_err(|e| Error::VerifierUnavailable(e.to_string()))?;

        match res.status() {
            reqwest::StatusCode::OK => {
                let body = res
                    .json::<AcceptedBody>()
                    .await
                    .map_err(|e| Error::ResponseDeserializationFailed(e.to_string()))?;
                Ok(Verdict::Accepted {
                    claims: body.tee_evidence,
                })
            }
            reqwest::StatusCode::FORBIDDEN => {
                let text = res
                    .text()
                    .await
                    .map_err(|e| Error::VerifierUnavailable(e.to_string()))?;
                let reason = serde_json::from_str::<RejectedBody>(&text)
                    .ok()
                    .and_then(|body| body.error)
                    .unwrap_or_else(|| REJECTION_FALLBACK_REASON.to_string());
                Ok(Verdict::Rejected { reason })
            }
            status => Err(Error::VerifierUnavailable(format!(
                "attestation service returned {status}: {}",
                res.text().await.unwrap_or_default()
            ))),
        }
    }
}
