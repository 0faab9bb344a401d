// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use std::time::Duration;

use kbs_protocol::{
    evidence_provider::{EvidenceProvider, MockedEvidenceProvider},
    AttestationVerifier, Error, Verdict,
};
use serde_json::json;
use test_utils::{StubVerifier, VerifierBehaviour};

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn accepted_evidence_yields_claims() {
    let stub = StubVerifier::start(VerifierBehaviour::accepting(json!({
        "platform": "kind-cluster",
        "security_version": 2,
    })))
    .await;
    let verifier = AttestationVerifier::new(stub.url(), TIMEOUT).unwrap();
    let evidence = MockedEvidenceProvider::default().get_evidence().await.unwrap();

    let Verdict::Accepted { claims } = verifier.attest(&evidence).await.unwrap() else {
        panic!("evidence should be accepted");
    };
    assert_eq!(claims.platform, "kind-cluster");
    assert_eq!(claims.security_version, 2);

    let submitted = stub.evidence();
    assert_eq!(
        submitted,
        vec![json!({
            "platform": "kind-cluster",
            "measurement": "demo-measurement-hash",
            "security_version": 2,
            "nonce": "1700000000",
            "mode": "simulated",
        })]
    );
}

#[tokio::test]
async fn rejection_is_a_verdict() {
    let stub = StubVerifier::start(VerifierBehaviour::rejecting("svn too old")).await;
    let verifier = AttestationVerifier::new(stub.url(), TIMEOUT).unwrap();
    let evidence = MockedEvidenceProvider::default().get_evidence().await.unwrap();

    assert_eq!(
        verifier.attest(&evidence).await.unwrap(),
        Verdict::Rejected {
            reason: "svn too old".into()
        }
    );
}

#[tokio::test]
async fn rejection_without_reason() {
    let stub = StubVerifier::start(VerifierBehaviour {
        attest_response: json!({}),
        ..VerifierBehaviour::rejecting("")
    })
    .await;
    let verifier = AttestationVerifier::new(stub.url(), TIMEOUT).unwrap();
    let evidence = MockedEvidenceProvider::default().get_evidence().await.unwrap();

    assert_eq!(
        verifier.attest(&evidence).await.unwrap(),
        Verdict::Rejected {
            reason: "Unknown error".into()
        }
    );
}

#[tokio::test]
async fn other_status_means_unavailable() {
    let stub = StubVerifier::start(VerifierBehaviour {
        attest_status: 500,
        ..VerifierBehaviour::rejecting("boom")
    })
    .await;
    let verifier = AttestationVerifier::new(stub.url(), TIMEOUT).unwrap();
    let evidence = MockedEvidenceProvider::default().get_evidence().await.unwrap();

    let err = verifier.attest(&evidence).await.unwrap_err();
    assert!(matches!(err, Error::VerifierUnavailable(_)), "{err:?}");
}

#[tokio::test]
async fn accepted_body_without_claims_is_malformed() {
    let stub = StubVerifier::start(VerifierBehaviour {
        attest_response: json!({"status": "ok"}),
        ..VerifierBehaviour::accepting(json!({}))
    })
    .await;
    let verifier = AttestationVerifier::new(stub.url(), TIMEOUT).unwrap();
    let evidence = MockedEvidenceProvider::default().get_evidence().await.unwrap();

    let err = verifier.attest(&evidence).await.unwrap_err();
    assert!(matches!(err, Error::ResponseDeserializationFailed(_)), "{err:?}");
}

#[tokio::test]
async fn unreachable_service() {
    let verifier = AttestationVerifier::new("http://127.0.0.1:1", TIMEOUT).unwrap();
    let evidence = MockedEvidenceProvider::default().get_evidence().await.unwrap();

    assert!(matches!(
        verifier.attest(&evidence).await.unwrap_err(),
        Error::VerifierUnavailable(_)
    ));
    assert!(matches!(
        verifier.health().await.unwrap_err(),
        Error::VerifierUnavailable(_)
    ));
}

#[tokio::test]
async fn health_requires_success_status() {
    let healthy = StubVerifier::start(VerifierBehaviour::accepting(json!({}))).await;
    AttestationVerifier::new(healthy.url(), TIMEOUT)
        .unwrap()
        .health()
        .await
        .expect("healthy");

    let starting = StubVerifier::start(VerifierBehaviour {
        healthy: false,
        ..VerifierBehaviour::accepting(json!({}))
    })
    .await;
    let err = AttestationVerifier::new(starting.url(), TIMEOUT)
        .unwrap()
        .health()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::VerifierUnavailable(_)));
    assert_eq!(starting.health_probes(), 1);
}
