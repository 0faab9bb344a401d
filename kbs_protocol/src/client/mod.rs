// Copyright (c) 2023 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! # KBS Client
//!
//! `KbsClient` performs the RCAR handshake and exchanges the resulting
//! [`AccessToken`](crate::AccessToken) for a resource. Each handshake runs
//! on its own [`KbsSession`], a cookie-bearing http client that lives for
//! exactly the two rounds of one attempt.

pub mod rcar_client;
pub mod session;

pub use session::KbsSession;

use std::{fmt, time::Duration};

use crate::{keypair::TeeKeyPair, types::InitData};

pub const KBS_PROTOCOL_VERSION: &str = "0.4.0";

pub const KBS_PREFIX: &str = "kbs/v0";

pub const KBS_REQ_TIMEOUT: Duration = Duration::from_secs(10);

/// Progress of one RCAR handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    Init,
    NonceRequested,
    EvidenceSubmitted,
    TokenObtained,
    Failed(String),
}

impl HandshakeState {
    pub(crate) fn advance(&mut self, next: HandshakeState) {
        log::debug!("RCAR handshake: {self} -> {next}");
        *self = next;
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeState::Init => write!(f, "Init"),
            HandshakeState::NonceRequested => write!(f, "NonceRequested"),
            HandshakeState::EvidenceSubmitted => write!(f, "EvidenceSubmitted"),
            HandshakeState::TokenObtained => write!(f, "TokenObtained"),
            HandshakeState::Failed(reason) => write!(f, "Failed({reason})"),
        }
    }
}

/// Transport settings shared by every http client the KBS client creates.
#[derive(Clone)]
pub(crate) struct HttpSettings {
    pub(crate) timeout: Duration,
    pub(crate) root_certs: Vec<reqwest::Certificate>,
    pub(crate) insecure_skip_verify: bool,
}

impl HttpSettings {
    pub(crate) fn client_builder(&self) -> reqwest::ClientBuilder {
        let mut builder = reqwest::Client::builder()
            .user_agent(format!("kbs-key-fetcher/{}", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout)
            .use_rustls_tls();

        for cert in &self.root_certs {
            builder = builder.add_root_certificate(cert.clone());
        }

        if self.insecure_skip_verify {
            log::warn!("TLS certificate verification towards the KBS is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder
    }
}

/// This Client is used to connect to the remote KBS.
pub struct KbsClient {
    /// The asymmetric key pair inside the TEE
    pub(crate) tee_key: TeeKeyPair,

    /// Http client used for bearer-authenticated resource requests
    pub(crate) http_client: reqwest::Client,

    pub(crate) http_settings: HttpSettings,

    /// KBS Host URL
    pub(crate) kbs_host_url: String,

    /// initdata toml plaintext (if any)
    pub(crate) initdata: Option<String>,
}

impl KbsClient {
    pub(crate) fn init_data(&self) -> InitData {
        InitData {
            body: self.initdata.clone().unwrap_or_default(),
            ..Default::default()
        }
    }

    /// Open a fresh session for one handshake attempt.
    pub fn open_session(&self) -> crate::Result<KbsSession> {
        KbsSession::open(&self.http_settings, &self.kbs_host_url)
    }
}
