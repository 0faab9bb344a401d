// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! Retrieve a private key from a KBS after attesting the environment, and
//! save it owner read-only.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod materialize;
pub mod readiness;

pub use error::{FetchError, Result};
pub use fetcher::{fetch_secret, run};
