// Copyright (c) 2023 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! # The Client of KBS RCAR Protocol.
//!
//! This crate implements the client side of the KBS RCAR
//! (Request-Challenge-Attest-Response) handshake together with the
//! attestation service call that precedes it.
//!
//! ## Flow
//!
//! 1. An [`EvidenceProvider`](evidence_provider::EvidenceProvider) produces
//!    [`Evidence`] carrying a fresh nonce.
//! 2. The [`AttestationVerifier`] evaluates the evidence and returns a
//!    [`Verdict`].
//! 3. The [`KbsClient`](client::KbsClient) performs the two RCAR rounds on
//!    one cookie-bearing [`KbsSession`](client::KbsSession) and obtains an
//!    [`AccessToken`].
//! 4. The token is exchanged for the resource.
//!
//! ```no_run
//! use kbs_protocol::evidence_provider::{EvidenceProvider, SimulatedEvidenceProvider};
//! use kbs_protocol::{
//!     AttestationVerifier, KbsClientBuilder, KbsClientCapabilities, TeeClaims, TeeKeyPair,
//!     Verdict, KBS_REQ_TIMEOUT,
//! };
//!
//! async fn fetch() -> kbs_protocol::Result<Vec<u8>> {
//!     let provider = SimulatedEvidenceProvider::default();
//!     let evidence = provider.get_evidence().await?;
//!
//!     let verifier = AttestationVerifier::new("http://as.example", KBS_REQ_TIMEOUT)?;
//!     let Verdict::Accepted { claims } = verifier.attest(&evidence).await? else {
//!         panic!("evidence rejected");
//!     };
//!
//!     let client = KbsClientBuilder::new("https://kbs.example")
//!         .set_tee_key(TeeKeyPair::placeholder())
//!         .build()?;
//!     let tee = provider.get_tee_type().await?;
//!     let token = client
//!         .get_token(tee, &TeeClaims::from_verdict(&claims, &evidence))
//!         .await?;
//!
//!     client.get_resource("default/key/1", token).await
//! }
//! ```

pub mod api;
pub mod builder;
pub mod client;
pub mod envelope;
pub mod error;
pub mod evidence_provider;
pub mod keypair;
pub mod token;
pub mod types;
pub mod verifier;

pub use api::*;
pub use builder::KbsClientBuilder;
pub use client::{HandshakeState, KbsClient, KbsSession, KBS_PROTOCOL_VERSION, KBS_REQ_TIMEOUT};
pub use envelope::{BrokerEvidenceEnvelope, TeeClaims};
pub use error::{Error, Result};
pub use keypair::TeeKeyPair;
pub use token::AccessToken;
pub use types::{Claims, Evidence, EvidenceMode, Tee};
pub use verifier::{AttestationVerifier, Verdict};
