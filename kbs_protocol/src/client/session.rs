// Copyright (c) 2023 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use log::debug;
use serde_json::Value;

use crate::{
    client::{HttpSettings, KBS_PREFIX},
    envelope::BrokerEvidenceEnvelope,
    token::AccessToken,
    types::{Challenge, Request},
    Error, Result,
};

/// One cookie-bearing http session towards the KBS.
///
/// The KBS correlates `/auth` and `/attest` through the session cookie it
/// sets in the first round, so both rounds of a handshake must go through
/// the same `KbsSession`. The session is closed when dropped.
pub struct KbsSession {
    http_client: reqwest::Client,
    kbs_host_url: String,
}

impl KbsSession {
    pub(crate) fn open(settings: &HttpSettings, kbs_host_url: &str) -> Result<Self> {
        let http_client = settings
            .client_builder()
            .cookie_store(true)
            .build()
            .map_err(|e| Error::BuildClient(e.to_string()))?;

        debug!("KBS session opened towards {kbs_host_url}");
        Ok(Self {
            http_client,
            kbs_host_url: kbs_host_url.to_string(),
        })
    }

    /// Round 1: announce the TEE and receive the challenge nonce.
    pub async fn request_challenge(&self, request: &Request) -> Result<Challenge> {
        let auth_endpoint = format!("{}/{KBS_PREFIX}/auth", self.kbs_host_url);
        debug!("send auth request {request:?} to {auth_endpoint}");

        let resp = self
            .http_client
            .post(auth_endpoint)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let body = json_body(resp).await?;
        let nonce = body
            .get("nonce")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MissingField("nonce".into()))?
            .to_string();
        let extra_params = body.get("extra-params").cloned().unwrap_or_default();

        debug!("get challenge nonce: {nonce}");
        Ok(Challenge {
            nonce,
            extra_params,
        })
    }

    /// Round 2: submit the evidence envelope and receive the access token.
    pub async fn submit_evidence(&self, envelope: &BrokerEvidenceEnvelope) -> Result<AccessToken> {
        let attest_endpoint = format!("{}/{KBS_PREFIX}/attest", self.kbs_host_url);
        debug!("send attest request to {attest_endpoint}");

        let resp = self
            .http_client
            .post(attest_endpoint)
            .header("Content-Type", "application/json")
            .json(envelope)
            .send()
            .await?;

        let body = json_body(resp).await?;
        AccessToken::from_attest_response(&body)
    }
}

impl Drop for KbsSession {
    fn drop(&mut self) {
        debug!("KBS session towards {} closed", self.kbs_host_url);
    }
}

/// Map a KBS response onto its JSON body or the matching error.
async fn json_body(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    match status {
        reqwest::StatusCode::OK => resp
            .json::<Value>()
            .await
            .map_err(|e| Error::ResponseDeserializationFailed(e.to_string())),
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            Err(Error::KbsRejected {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            })
        }
        _ => Err(Error::KbsInternalError {
            status: status.as_u16(),
            body: resp.text().await.unwrap_or_default(),
        }),
    }
}
