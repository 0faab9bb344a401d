// Copyright (c) 2024 Alibaba Cloud
// Copyright (c) 2024 Red Hat, Inc
//
// SPDX-License-Identifier: Apache-2.0
//

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use kbs_protocol::{EvidenceMode, Tee, KBS_REQ_TIMEOUT};
use log::{debug, info};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE_PATH: &str = "/etc/kbs-key-fetcher.toml";

/// Environment variables starting with this prefix override the file, e.g.
/// `KBS_FETCHER_KBS__URL`.
pub const ENV_PREFIX: &str = "KBS_FETCHER";

/// Deployment profile. TLS verification may only be relaxed under
/// `development`.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Profile {
    #[default]
    Production,
    Development,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(default)]
pub struct FetcherConfig {
    pub profile: Profile,
    pub kbs: KbsConfig,
    pub attestation_service: AttestationServiceConfig,
    pub evidence: EvidenceConfig,
    pub resource: ResourceConfig,
    pub readiness: ReadinessConfig,
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct KbsConfig {
    /// URL Address of KBS.
    pub url: String,

    /// https:// certificate for KBS as a string
    pub cert: Option<String>,

    /// https:// certificate for KBS in a cert_file
    pub cert_file: Option<String>,

    /// Skip TLS certificate verification. Development profile only.
    pub insecure_skip_verify: bool,

    /// Timeout of every request to the KBS and to the attestation service.
    pub request_timeout_secs: u64,

    /// Initdata toml carried in the evidence envelope.
    pub initdata: Option<String>,
}

impl Default for KbsConfig {
    fn default() -> Self {
        Self {
            url: "http://kbs-service:8080".into(),
            cert: None,
            cert_file: None,
            insecure_skip_verify: false,
            request_timeout_secs: KBS_REQ_TIMEOUT.as_secs(),
            initdata: None,
        }
    }
}

impl KbsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    // get the certificate from the configuration file, if exists
    // If cert does not exists but cert_file does, read cert from cert_file
    pub fn get_cert(&self) -> Result<Option<String>> {
        if let Some(c) = &self.cert {
            return Ok(Some(c.clone()));
        }

        if let Some(cf) = &self.cert_file {
            debug!("Reading KBS certificate from {cf}");
            let cert = fs::read_to_string(cf).with_context(|| format!("read cert_file {cf}"))?;
            return Ok(Some(cert));
        }

        Ok(None)
    }
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct AttestationServiceConfig {
    /// URL Address of Attestation Service.
    pub url: String,
}

impl Default for AttestationServiceConfig {
    fn default() -> Self {
        Self {
            url: "http://mock-attestation-service:8080".into(),
        }
    }
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct EvidenceConfig {
    pub mode: EvidenceMode,

    /// TEE announced to the KBS in `real` mode. Simulated evidence is
    /// always announced as `sample`.
    pub tee: Tee,

    pub platform: String,
    pub measurement: String,
    pub security_version: u64,

    /// Claims document provided by the environment in `real` mode.
    pub claims_file: Option<PathBuf>,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            mode: EvidenceMode::Simulated,
            tee: Tee::Sample,
            platform: kbs_protocol::evidence_provider::DEFAULT_PLATFORM.into(),
            measurement: kbs_protocol::evidence_provider::DEFAULT_MEASUREMENT.into(),
            security_version: kbs_protocol::evidence_provider::DEFAULT_SECURITY_VERSION,
            claims_file: None,
        }
    }
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct ResourceConfig {
    /// KBS resource path, requested under `/kbs/v0/resource/`.
    pub path: String,

    /// Where the retrieved secret is written.
    pub destination: PathBuf,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            path: "private.key".into(),
            destination: PathBuf::from("/shared/keys/private.key"),
        }
    }
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct ReadinessConfig {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval_ms: 1000,
        }
    }
}

impl ReadinessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl FetcherConfig {
    /// Load the configuration file (optional when no path is given), apply
    /// environment overrides and the profile override, then validate.
    pub fn load(path_arg: Option<&str>, profile: Option<Profile>) -> Result<Self> {
        let file = match path_arg {
            Some(path) => {
                if !Path::new(path).exists() {
                    bail!("Config file {path} not found.")
                }
                File::new(path, FileFormat::Toml)
            }
            None => File::new(DEFAULT_CONFIG_FILE_PATH, FileFormat::Toml).required(false),
        };
        debug!("Using configuration file {}", path_arg.unwrap_or(DEFAULT_CONFIG_FILE_PATH));

        let c = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: FetcherConfig = c.try_deserialize().context("failed to parse config")?;
        if let Some(profile) = profile {
            cfg.profile = profile;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.kbs.url.is_empty() {
            bail!("KBS url must not be empty");
        }
        if self.attestation_service.url.is_empty() {
            bail!("attestation service url must not be empty");
        }
        if self.kbs.cert.is_some() && self.kbs.cert_file.is_some() {
            bail!("Please provide only one of 'cert' and 'cert_file'");
        }
        if self.kbs.insecure_skip_verify && self.profile != Profile::Development {
            bail!("'insecure_skip_verify' is only allowed with the development profile");
        }
        if self.evidence.mode == EvidenceMode::Real && self.evidence.claims_file.is_none() {
            bail!("'claims_file' is required for real evidence");
        }
        if self.readiness.max_attempts == 0 {
            bail!("readiness 'max_attempts' must be at least 1");
        }
        if self.kbs.url.starts_with("https://") && self.kbs.cert.is_none() && self.kbs.cert_file.is_none() {
            info!("An https:// URL is used but no certificate is provided");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rstest::rstest;
    use serial_test::serial;

    use super::*;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("create config file");
        file.write_all(content.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn defaults() {
        let cfg = FetcherConfig::default();
        assert_eq!(cfg.profile, Profile::Production);
        assert_eq!(cfg.kbs.url, "http://kbs-service:8080");
        assert_eq!(cfg.kbs.request_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.attestation_service.url, "http://mock-attestation-service:8080");
        assert_eq!(cfg.evidence.mode, EvidenceMode::Simulated);
        assert_eq!(cfg.resource.destination, PathBuf::from("/shared/keys/private.key"));
        assert_eq!(cfg.readiness.max_attempts, 30);
        assert_eq!(cfg.readiness.interval(), Duration::from_secs(1));
        cfg.validate().expect("defaults are valid");
    }

    #[test]
    #[serial]
    fn parse_partial_file() {
        let file = write_config(
            r#"
            profile = "development"

            [kbs]
            url = "https://kbs.internal:8080"
            insecure_skip_verify = true

            [evidence]
            security_version = 5

            [readiness]
            interval_ms = 10
            "#,
        );

        let cfg = FetcherConfig::load(file.path().to_str(), None).expect("load config");
        assert_eq!(cfg.profile, Profile::Development);
        assert_eq!(cfg.kbs.url, "https://kbs.internal:8080");
        assert!(cfg.kbs.insecure_skip_verify);
        assert_eq!(cfg.evidence.security_version, 5);
        assert_eq!(cfg.evidence.platform, "kind-cluster");
        assert_eq!(cfg.readiness.max_attempts, 30);
        assert_eq!(cfg.readiness.interval_ms, 10);
    }

    #[test]
    #[serial]
    fn profile_override_is_validated() {
        let file = write_config(
            r#"
            profile = "development"

            [kbs]
            insecure_skip_verify = true
            "#,
        );

        let err = FetcherConfig::load(file.path().to_str(), Some(Profile::Production)).unwrap_err();
        assert!(err.to_string().contains("insecure_skip_verify"), "{err}");
    }

    #[test]
    #[serial]
    fn missing_file_is_an_error() {
        assert!(FetcherConfig::load(Some("/nonexistent/kbs-key-fetcher.toml"), None).is_err());
    }

    #[test]
    #[serial]
    fn environment_overrides_file() {
        let file = write_config(
            r#"
            [resource]
            path = "default/key/1"
            "#,
        );

        std::env::set_var("KBS_FETCHER_RESOURCE__PATH", "default/key/2");
        let cfg = FetcherConfig::load(file.path().to_str(), None);
        std::env::remove_var("KBS_FETCHER_RESOURCE__PATH");

        assert_eq!(cfg.expect("load config").resource.path, "default/key/2");
    }

    #[rstest]
    #[case("insecure_in_production")]
    #[case("real_mode_without_claims")]
    #[case("no_attempts")]
    #[case("empty_kbs_url")]
    #[case("empty_as_url")]
    #[case("two_certs")]
    fn invalid_configs(#[case] defect: &str) {
        let mut cfg = FetcherConfig::default();
        match defect {
            "insecure_in_production" => cfg.kbs.insecure_skip_verify = true,
            "real_mode_without_claims" => cfg.evidence.mode = EvidenceMode::Real,
            "no_attempts" => cfg.readiness.max_attempts = 0,
            "empty_kbs_url" => cfg.kbs.url.clear(),
            "empty_as_url" => cfg.attestation_service.url.clear(),
            "two_certs" => {
                cfg.kbs.cert = Some("a".into());
                cfg.kbs.cert_file = Some("b".into());
            }
            _ => unreachable!(),
        }
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn cert_from_cert_file() {
        let file = write_config("-----BEGIN CERTIFICATE-----");
        let kbs = KbsConfig {
            cert_file: file.path().to_str().map(String::from),
            ..Default::default()
        };
        assert_eq!(kbs.get_cert().unwrap().as_deref(), Some("-----BEGIN CERTIFICATE-----"));
    }
}
