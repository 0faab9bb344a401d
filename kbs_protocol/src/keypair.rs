// Copyright (c) 2023 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rsa::{rand_core::OsRng, traits::PublicKeyParts, RsaPrivateKey, RsaPublicKey};

use crate::{types::TeePubKey, Error, Result};

pub const RSA_KEY_TYPE: &str = "RSA";

pub const RSA_OAEP_ALGORITHM: &str = "RSA-OAEP";

pub const RSA_PUBKEY_LENGTH: usize = 2048;

/// Placeholder modulus announced when no key is generated (simulated TEE).
const PLACEHOLDER_MODULUS: &str = "placeholder-modulus";

/// 65537, base64url encoded.
const DEFAULT_EXPONENT: &str = "AQAB";

#[derive(Clone, Debug)]
pub struct TeeKeyPair {
    key: TeeKey,
}

#[derive(Clone, Debug)]
enum TeeKey {
    Rsa(Box<RsaPrivateKey>),
    Placeholder,
}

impl TeeKeyPair {
    /// Create a new RSA key pair inside the TEE.
    pub fn new() -> Result<Self> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_PUBKEY_LENGTH)
            .map_err(|e| Error::GenerateKeyPairFailed(e.to_string()))?;
        Ok(Self {
            key: TeeKey::Rsa(Box::new(private_key)),
        })
    }

    /// A key pair that only announces fixed placeholder values. Simulated
    /// TEEs use it since the KBS never wraps anything to this key.
    pub fn placeholder() -> Self {
        Self {
            key: TeeKey::Placeholder,
        }
    }

    /// Export TEE public key as specific structure.
    pub fn export_pubkey(&self) -> TeePubKey {
        match &self.key {
            TeeKey::Rsa(key) => {
                let public_key = RsaPublicKey::from(&**key);
                TeePubKey {
                    kty: RSA_KEY_TYPE.to_string(),
                    alg: RSA_OAEP_ALGORITHM.to_string(),
                    k_mod: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
                    k_exp: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
                }
            }
            TeeKey::Placeholder => TeePubKey {
                kty: RSA_KEY_TYPE.to_string(),
                alg: RSA_OAEP_ALGORITHM.to_string(),
                k_mod: PLACEHOLDER_MODULUS.to_string(),
                k_exp: DEFAULT_EXPONENT.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_pubkey() {
        let pubkey = TeeKeyPair::placeholder().export_pubkey();
        assert_eq!(pubkey.kty, "RSA");
        assert_eq!(pubkey.alg, "RSA-OAEP");
        assert_eq!(pubkey.k_exp, "AQAB");
    }

    #[test]
    fn rsa_pubkey_exports_exponent_and_modulus() {
        let pubkey = TeeKeyPair::new().expect("generate key").export_pubkey();
        assert_eq!(pubkey.k_exp, "AQAB");

        let modulus = URL_SAFE_NO_PAD.decode(pubkey.k_mod).expect("decode modulus");
        assert_eq!(modulus.len(), RSA_PUBKEY_LENGTH / 8);
    }
}
