// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use kbs_protocol::{
    evidence_provider::{EvidenceProvider, FileEvidenceProvider, SimulatedEvidenceProvider},
    AttestationVerifier, EvidenceMode, KbsClient, KbsClientBuilder, KbsClientCapabilities,
    TeeClaims, TeeKeyPair, Verdict,
};
use log::info;

use crate::{
    config::{EvidenceConfig, FetcherConfig, Profile, ResourceConfig},
    materialize::materialize,
    readiness::wait_until_ready,
    FetchError, Result,
};

fn evidence_provider(config: &EvidenceConfig) -> Box<dyn EvidenceProvider> {
    match (&config.mode, &config.claims_file) {
        (EvidenceMode::Real, Some(claims_file)) => {
            Box::new(FileEvidenceProvider::new(claims_file, config.tee))
        }
        _ => Box::new(SimulatedEvidenceProvider::new(
            &config.platform,
            &config.measurement,
            config.security_version,
        )),
    }
}

fn kbs_client(config: &FetcherConfig) -> anyhow::Result<KbsClient> {
    let mut builder = KbsClientBuilder::new(&config.kbs.url)
        .set_timeout(config.kbs.request_timeout())
        .danger_accept_invalid_certs(
            config.profile == Profile::Development && config.kbs.insecure_skip_verify,
        );

    if let Some(cert) = config.kbs.get_cert()? {
        builder = builder.add_kbs_cert(&cert);
    }

    if let Some(initdata) = &config.kbs.initdata {
        builder = builder.add_initdata(initdata.clone());
    }

    // Simulated TEEs never receive wrapped keys, so no key pair is needed.
    let tee_key = match config.evidence.mode {
        EvidenceMode::Simulated => TeeKeyPair::placeholder(),
        EvidenceMode::Real => TeeKeyPair::new()?,
    };

    Ok(builder.set_tee_key(tee_key).build()?)
}

/// Wait for the services, then attest, fetch and save the secret.
pub async fn run(config: &FetcherConfig) -> anyhow::Result<()> {
    let verifier =
        AttestationVerifier::new(&config.attestation_service.url, config.kbs.request_timeout())?;

    info!("Waiting for KBS and Attestation Service...");
    wait_until_ready(
        &verifier,
        config.readiness.max_attempts,
        config.readiness.interval(),
    )
    .await?;

    let provider = evidence_provider(&config.evidence);
    let client = kbs_client(config)?;

    fetch_secret(provider.as_ref(), &verifier, &client, &config.resource).await?;
    Ok(())
}

/// Evidence -> attestation service -> RCAR handshake -> resource ->
/// destination file. The first failing stage ends the attempt.
pub async fn fetch_secret(
    provider: &dyn EvidenceProvider,
    verifier: &AttestationVerifier,
    client: &(dyn KbsClientCapabilities + Sync),
    resource: &ResourceConfig,
) -> Result<()> {
    info!("Requesting attestation...");
    let evidence = provider.get_evidence().await?;

    let claims = match verifier.attest(&evidence).await? {
        Verdict::Accepted { claims } => claims,
        Verdict::Rejected { reason } => return Err(FetchError::AttestationRejected { reason }),
    };
    info!(
        "Attestation successful! Platform: {}, Security Version: {}",
        claims.platform, claims.security_version
    );

    let tee = provider.get_tee_type().await?;
    let token = client
        .get_token(tee, &TeeClaims::from_verdict(&claims, &evidence))
        .await?;
    info!("KBS token obtained");

    info!("Requesting secret: {}", resource.path);
    let secret = client.get_resource(&resource.path, token).await?;
    info!("Secret retrieved successfully!");

    materialize(&secret, &resource.destination)?;
    info!("Private key saved to {}", resource.destination.display());

    Ok(())
}
