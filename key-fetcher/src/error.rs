// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("services not available after {attempts} attempts")]
    ServicesNotReady { attempts: u32 },

    #[error("attestation rejected: {reason}")]
    AttestationRejected { reason: String },

    #[error(transparent)]
    Protocol(#[from] kbs_protocol::Error),

    #[error("secret looks base64 encoded but does not decode: {0}")]
    DecodeSecret(#[from] base64::DecodeError),

    #[error("failed to save secret to {}: {source}", path.display())]
    Materialize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
