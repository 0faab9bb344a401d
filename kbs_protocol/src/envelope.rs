// Copyright (c) 2023 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! The evidence envelope submitted to `/kbs/v0/attest`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::types::{Claims, Evidence, InitData, Tee, TeePubKey};

/// Names under which the security version claim is emitted. KBS evidence
/// schemas differ on this key, so every alias carries the same value.
pub const SECURITY_VERSION_ALIASES: [&str; 2] = ["svn", "security_version"];

/// Claims about the TEE that go into the primary evidence block.
#[derive(Debug, Clone, PartialEq)]
pub struct TeeClaims {
    pub platform: String,
    pub measurement: String,
    pub security_version: u64,
}

impl TeeClaims {
    /// Take the verified claims, falling back to the submitted evidence for
    /// a measurement the attestation service did not echo back.
    pub fn from_verdict(claims: &Claims, evidence: &Evidence) -> Self {
        Self {
            platform: claims.platform.clone(),
            measurement: claims
                .measurement
                .clone()
                .unwrap_or_else(|| evidence.measurement.clone()),
            security_version: claims.security_version,
        }
    }

    /// Map the claims onto the KBS claims schema.
    pub fn to_broker_claims(&self) -> Map<String, Value> {
        let mut claims = Map::new();
        claims.insert("platform".into(), json!(self.platform));
        claims.insert("measurement".into(), json!(self.measurement));
        for alias in SECURITY_VERSION_ALIASES {
            claims.insert(alias.into(), json!(self.security_version));
        }
        claims
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RuntimeData {
    pub nonce: String,
    #[serde(rename = "tee-pubkey")]
    pub tee_pubkey: TeePubKey,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TeeEvidence {
    /// `{<tee>: {"claims": {...}}}`
    pub primary_evidence: Value,
    pub additional_evidence: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BrokerEvidenceEnvelope {
    pub tee: Tee,
    #[serde(rename = "runtime-data")]
    pub runtime_data: RuntimeData,
    #[serde(rename = "init-data")]
    pub init_data: InitData,
    #[serde(rename = "tee-evidence")]
    pub tee_evidence: TeeEvidence,
}

impl BrokerEvidenceEnvelope {
    pub fn new(
        tee: Tee,
        nonce: String,
        tee_pubkey: TeePubKey,
        claims: &TeeClaims,
        init_data: InitData,
    ) -> Self {
        let mut primary_evidence = Map::new();
        primary_evidence.insert(
            tee.to_string(),
            json!({ "claims": claims.to_broker_claims() }),
        );

        Self {
            tee,
            runtime_data: RuntimeData { nonce, tee_pubkey },
            init_data,
            tee_evidence: TeeEvidence {
                primary_evidence: Value::Object(primary_evidence),
                additional_evidence: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_json_diff::assert_json_eq;

    use super::*;
    use crate::{keypair::TeeKeyPair, types::EvidenceMode};

    fn evidence() -> Evidence {
        Evidence {
            platform: "kind-cluster".into(),
            measurement: "demo-measurement-hash".into(),
            security_version: 2,
            nonce: "1700000000".into(),
            mode: EvidenceMode::Simulated,
        }
    }

    fn verdict_claims() -> Claims {
        serde_json::from_value(json!({"platform": "kind-cluster", "security_version": 2}))
            .unwrap()
    }

    #[test]
    fn measurement_falls_back_to_evidence() {
        let claims = TeeClaims::from_verdict(&verdict_claims(), &evidence());
        assert_eq!(claims.measurement, "demo-measurement-hash");
    }

    #[test]
    fn measurement_from_verdict_wins() {
        let mut verdict = verdict_claims();
        verdict.measurement = Some("verified-hash".into());
        let claims = TeeClaims::from_verdict(&verdict, &evidence());
        assert_eq!(claims.measurement, "verified-hash");
    }

    #[test]
    fn security_version_under_every_alias() {
        let claims = TeeClaims::from_verdict(&verdict_claims(), &evidence()).to_broker_claims();
        for alias in SECURITY_VERSION_ALIASES {
            assert_eq!(claims[alias], json!(2));
        }
    }

    #[test]
    fn envelope_wire_format() {
        let claims = TeeClaims::from_verdict(&verdict_claims(), &evidence());
        let pubkey = TeeKeyPair::placeholder().export_pubkey();
        let envelope = BrokerEvidenceEnvelope::new(
            Tee::Sample,
            "abc123".into(),
            pubkey.clone(),
            &claims,
            InitData::default(),
        );

        assert_json_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "tee": "sample",
                "runtime-data": {
                    "nonce": "abc123",
                    "tee-pubkey": pubkey,
                },
                "init-data": {"format": "toml", "body": ""},
                "tee-evidence": {
                    "primary_evidence": {
                        "sample": {
                            "claims": {
                                "platform": "kind-cluster",
                                "measurement": "demo-measurement-hash",
                                "svn": 2,
                                "security_version": 2,
                            }
                        }
                    },
                    "additional_evidence": "",
                }
            })
        );
    }
}
