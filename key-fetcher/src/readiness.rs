// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use std::time::Duration;

use kbs_protocol::AttestationVerifier;
use log::{debug, info};

use crate::{FetchError, Result};

/// Poll the attestation service's health endpoint until it answers or
/// `max_attempts` probes have failed.
pub async fn wait_until_ready(
    verifier: &AttestationVerifier,
    max_attempts: u32,
    interval: Duration,
) -> Result<()> {
    for attempt in 1..=max_attempts {
        match verifier.health().await {
            Ok(()) => {
                info!("Services are ready!");
                return Ok(());
            }
            Err(e) => {
                debug!("services not ready (attempt {attempt}/{max_attempts}): {e}");
                if attempt < max_attempts {
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    Err(FetchError::ServicesNotReady {
        attempts: max_attempts,
    })
}
