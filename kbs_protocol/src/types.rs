// Copyright (c) 2022 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// TEE kind announced to the KBS in the `Request` and used as the key of
/// the primary evidence block.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::AsRefStr,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Tee {
    AzSnpVtpm,
    AzTdxVtpm,
    Cca,
    Csv,
    Sample,
    Se,
    Sgx,
    Snp,
    Tdx,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Request {
    pub version: String,
    pub tee: Tee,

    // Reserved field.
    #[serde(rename = "extra-params")]
    pub extra_params: String,
}

impl Request {
    pub fn new(version: &str, tee: Tee) -> Request {
        Request {
            version: version.to_string(),
            tee,
            extra_params: "".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Challenge {
    // Nonce from KBS to prevent replay attack.
    pub nonce: String,

    #[serde(rename = "extra-params", default)]
    pub extra_params: Value,
}

/// Whether the evidence came from the platform or was synthesized for a
/// demo deployment.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EvidenceMode {
    Real,
    Simulated,
}

/// Claims document describing the caller's execution environment, as sent
/// to the attestation service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Evidence {
    pub platform: String,
    pub measurement: String,
    pub security_version: u64,
    pub nonce: String,
    pub mode: EvidenceMode,
}

/// Trusted claims returned by the attestation service. Claims other than
/// the ones the KBS envelope needs are kept in `others`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Claims {
    pub platform: String,
    pub security_version: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement: Option<String>,

    #[serde(flatten)]
    pub others: Map<String, Value>,
}

/// Public key of the TEE in JWK-like form, as carried in `runtime-data`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TeePubKey {
    pub kty: String,
    pub alg: String,
    pub k_mod: String,
    pub k_exp: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InitData {
    pub format: String,
    pub body: String,
}

impl Default for InitData {
    fn default() -> Self {
        Self {
            format: "toml".to_string(),
            body: String::new(),
        }
    }
}
