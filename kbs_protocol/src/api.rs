// Copyright (c) 2023 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use crate::{envelope::TeeClaims, token::AccessToken, types::Tee, Result};
use async_trait::async_trait;

#[async_trait]
pub trait KbsClientCapabilities {
    /// Run a full RCAR handshake for verified `claims` and return the
    /// token the KBS issued for it.
    async fn get_token(&self, tee: Tee, claims: &TeeClaims) -> Result<AccessToken>;

    /// Fetch `resource_path` with `token`. The token is consumed.
    async fn get_resource(&self, resource_path: &str, token: AccessToken) -> Result<Vec<u8>>;
}
