// Copyright (c) 2023 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use std::fmt;

use serde_json::Value;
use zeroize::Zeroizing;

use crate::{Error, Result};

/// Fields of the attest response that may carry the credential, in the
/// order they are looked up. KBS deployments disagree on the name.
pub const TOKEN_FIELDS: [&str; 3] = ["token", "session_id", "challenge"];

/// Return the first of `fields` that is present in `object` as a non-empty
/// string.
pub fn lookup_first<'v, 'f>(object: &'v Value, fields: &[&'f str]) -> Option<(&'f str, &'v str)> {
    fields.iter().find_map(|field| {
        object
            .get(*field)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(|value| (*field, value))
    })
}

/// Opaque bearer credential issued by the KBS at the end of an RCAR
/// handshake.
///
/// It is deliberately not `Clone`: fetching a resource consumes it.
pub struct AccessToken {
    content: Zeroizing<String>,
}

impl AccessToken {
    pub fn new(content: String) -> Result<Self> {
        if content.is_empty() {
            return Err(Error::MissingField("token".into()));
        }

        Ok(Self {
            content: Zeroizing::new(content),
        })
    }

    /// Extract the token out of an attest response body.
    pub fn from_attest_response(body: &Value) -> Result<Self> {
        let (field, token) = lookup_first(body, &TOKEN_FIELDS)
            .ok_or_else(|| Error::MissingField(TOKEN_FIELDS.join("|")))?;
        log::debug!("KBS token found in field `{field}`");
        Self::new(token.to_string())
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("content", &"<redacted>")
            .finish()
    }
}
