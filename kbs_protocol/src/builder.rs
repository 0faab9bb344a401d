// Copyright (c) 2023 Microsoft Corporation
// Copyright (c) 2023 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use std::time::Duration;

use crate::{
    client::{HttpSettings, KbsClient, KBS_REQ_TIMEOUT},
    keypair::TeeKeyPair,
    Error, Result,
};

pub struct KbsClientBuilder {
    kbs_certs: Vec<String>,
    kbs_host_url: String,
    tee_key: Option<TeeKeyPair>,
    initdata: Option<String>,
    timeout: Duration,
    insecure_skip_verify: bool,
}

impl KbsClientBuilder {
    pub fn new(kbs_host_url: &str) -> Self {
        Self {
            kbs_certs: vec![],
            kbs_host_url: kbs_host_url.trim_end_matches('/').to_string(),
            tee_key: None,
            initdata: None,
            timeout: KBS_REQ_TIMEOUT,
            insecure_skip_verify: false,
        }
    }

    pub fn add_kbs_cert(mut self, cert_pem: &str) -> Self {
        self.kbs_certs.push(cert_pem.to_string());
        self
    }

    pub fn set_tee_key(mut self, tee_key: TeeKeyPair) -> Self {
        self.tee_key = Some(tee_key);
        self
    }

    pub fn add_initdata(mut self, initdata: String) -> Self {
        self.initdata = Some(initdata);
        self
    }

    pub fn set_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Skip TLS certificate verification towards the KBS. Only meant for
    /// development deployments using self-signed certificates.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.insecure_skip_verify = accept;
        self
    }

    pub fn build(self) -> Result<KbsClient> {
        let mut root_certs = Vec::with_capacity(self.kbs_certs.len());
        for customer_root_cert in &self.kbs_certs {
            let cert = reqwest::Certificate::from_pem(customer_root_cert.as_bytes())
                .map_err(|e| Error::BuildClient(format!("read KBS public key cert: {e}")))?;
            root_certs.push(cert);
        }

        let http_settings = HttpSettings {
            timeout: self.timeout,
            root_certs,
            insecure_skip_verify: self.insecure_skip_verify,
        };

        let tee_key = match self.tee_key {
            Some(key) => key,
            None => TeeKeyPair::new()?,
        };

        let http_client = http_settings
            .client_builder()
            .build()
            .map_err(|e| Error::BuildClient(format!("Build KBS http client: {e}")))?;

        Ok(KbsClient {
            tee_key,
            http_client,
            http_settings,
            kbs_host_url: self.kbs_host_url,
            initdata: self.initdata,
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{builder::KbsClientBuilder, keypair::TeeKeyPair};

    #[rstest]
    #[case(
        r"-----BEGIN CERTIFICATE-----
MIIBzTCCAX+gAwIBAgIUOGdGRmt/IDSVIem7iFwsuxnV62AwBQYDK2VwMGkxCzAJ
BgNVBAYTAkNOMREwDwYDVQQIDAhTaGFuZ2hhaTERMA8GA1UEBwwIU2hhbmdoYWkx
EDAOBgNVBAoMB0FsaWJhYmExDzANBgNVBAsMBkFsaXl1bjERMA8GA1UEAwwIS0JT
LXJvb3QwHhcNMjMwNzE0MDYzMzA1WhcNMjMwODEzMDYzMzA1WjBpMQswCQYDVQQG
EwJDTjERMA8GA1UECAwIU2hhbmdoYWkxETAPBgNVBAcMCFNoYW5naGFpMRAwDgYD
VQQKDAdBbGliYWJhMQ8wDQYDVQQLDAZBbGl5dW4xETAPBgNVBAMMCEtCUy1yb290
MCowBQYDK2VwAyEAOo8z6/Ul3XvNBf2Oa7qDevljyhGSKyGMjV+4qneVNr+jOTA3
MAkGA1UdEwQCMAAwCwYDVR0PBAQDAgXgMB0GA1UdDgQWBBREKNLFRe7fCBKRffTv
x13TMfDeczAFBgMrZXADQQBpP6ABBkzVj3mF55nWUtP5vxwq3t91wqQJ6NyC7WsT
3Z29bFfJn7C280JfkCqiqeSZjYV/JjTepATH659kktcA
-----END CERTIFICATE-----"
    )]
    fn test_build_client(#[case] cert: &str) {
        let client = KbsClientBuilder::new("http://test.io/")
            .set_tee_key(TeeKeyPair::placeholder())
            .add_kbs_cert(cert)
            .build()
            .expect("build client failed");

        assert_eq!(client.kbs_host_url, "http://test.io");
    }

    #[test]
    fn initdata_is_carried_into_envelope() {
        let client = KbsClientBuilder::new("http://test.io")
            .set_tee_key(TeeKeyPair::placeholder())
            .add_initdata("algorithm = \"sha384\"".into())
            .build()
            .expect("build client failed");

        let init_data = client.init_data();
        assert_eq!(init_data.format, "toml");
        assert_eq!(init_data.body, "algorithm = \"sha384\"");
    }
}
