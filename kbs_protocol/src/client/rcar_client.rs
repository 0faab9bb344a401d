// Copyright (c) 2023 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use async_trait::async_trait;
use log::{debug, warn};

use crate::{
    api::KbsClientCapabilities,
    client::{HandshakeState, KbsClient, KBS_PREFIX, KBS_PROTOCOL_VERSION},
    envelope::{BrokerEvidenceEnvelope, TeeClaims},
    token::AccessToken,
    types::{Request, Tee},
    Error, Result,
};

pub(crate) fn build_request(tee: Tee) -> Request {
    Request::new(KBS_PROTOCOL_VERSION, tee)
}

impl KbsClient {
    /// Perform the two rounds of the RCAR handshake on one fresh session.
    /// The session is dropped on return, whatever the outcome.
    async fn rcar_handshake(
        &self,
        tee: Tee,
        claims: &TeeClaims,
        state: &mut HandshakeState,
    ) -> Result<AccessToken> {
        let session = self.open_session()?;

        let challenge = session.request_challenge(&build_request(tee)).await?;
        state.advance(HandshakeState::NonceRequested);

        let envelope = BrokerEvidenceEnvelope::new(
            tee,
            challenge.nonce,
            self.tee_key.export_pubkey(),
            claims,
            self.init_data(),
        );

        state.advance(HandshakeState::EvidenceSubmitted);
        let token = session.submit_evidence(&envelope).await?;
        state.advance(HandshakeState::TokenObtained);

        Ok(token)
    }
}

#[async_trait]
impl KbsClientCapabilities for KbsClient {
    async fn get_token(&self, tee: Tee, claims: &TeeClaims) -> Result<AccessToken> {
        let mut state = HandshakeState::Init;

        match self.rcar_handshake(tee, claims, &mut state).await {
            Ok(token) => Ok(token),
            Err(e) => {
                let failed_in = state.clone();
                state.advance(HandshakeState::Failed(e.to_string()));
                warn!("RCAR handshake failed in state {failed_in}: {e}");
                Err(Error::RcarHandshake {
                    failed_in,
                    state,
                    source: Box::new(e),
                })
            }
        }
    }

    async fn get_resource(&self, resource_path: &str, token: AccessToken) -> Result<Vec<u8>> {
        let resource_path = resource_path.trim_start_matches('/');
        let remote_url = format!("{}/{KBS_PREFIX}/resource/{resource_path}", self.kbs_host_url);
        debug!("KBS client: request resource {remote_url}");

        let res = self
            .http_client
            .get(&remote_url)
            .bearer_auth(token.content())
            .send()
            .await?;

        match res.status() {
            reqwest::StatusCode::OK => Ok(res.bytes().await?.to_vec()),
            reqwest::StatusCode::UNAUTHORIZED => Err(Error::UnAuthorized(
                res.text().await.unwrap_or_default(),
            )),
            reqwest::StatusCode::NOT_FOUND => Err(Error::ResourceNotFound(format!(
                "{resource_path}: {}",
                res.text().await.unwrap_or_default()
            ))),
            status => Err(Error::KbsInternalError {
                status: status.as_u16(),
                body: res.text().await.unwrap_or_default(),
            }),
        }
    }
}
