// Copyright (c) 2023 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use thiserror::Error;

use crate::client::HandshakeState;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("build http client failed: {0}")]
    BuildClient(String),

    #[error("get key pair failed: {0}")]
    GenerateKeyPairFailed(String),

    #[error("get evidence failed: {0}")]
    GetEvidence(String),

    #[error("http request failed: {0}")]
    HttpError(String),

    #[error("KBS rejected the request (status {status}): {body}")]
    KbsRejected { status: u16, body: String },

    #[error("KBS internal error (status {status}): {body}")]
    KbsInternalError { status: u16, body: String },

    #[error("KBS response is missing field(s) `{0}`")]
    MissingField(String),

    #[error("RCAR handshake failed in state {failed_in}: {source}")]
    RcarHandshake {
        /// Last state reached before the failure.
        failed_in: HandshakeState,
        /// Terminal state, always `HandshakeState::Failed`.
        state: HandshakeState,
        #[source]
        source: Box<Error>,
    },

    #[error("deserialize http response failed: {0}")]
    ResponseDeserializationFailed(String),

    #[error("KBS resource not found: {0}")]
    ResourceNotFound(String),

    #[error("request unauthorized: {0}")]
    UnAuthorized(String),

    #[error("attestation service unavailable: {0}")]
    VerifierUnavailable(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::ResponseDeserializationFailed(e.to_string())
        } else {
            Error::HttpError(e.to_string())
        }
    }
}
