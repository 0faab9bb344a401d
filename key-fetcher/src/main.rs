// Copyright (c) 2023 by Alibaba.
// Copyright (c) 2024 Red Hat, Inc
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Attest, fetch a private key from the KBS and save it.

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use kbs_key_fetcher::config::{FetcherConfig, Profile};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default is /etc/kbs-key-fetcher.toml, optional)
    #[arg(long)]
    config_file: Option<String>,

    /// Deployment profile, overrides the one in the configuration file
    #[arg(long)]
    profile: Option<Profile>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();

    let config = FetcherConfig::load(cli.config_file.as_deref(), cli.profile)?;
    debug!("config {config:?}");

    info!("KBS-based private key retrieval");
    kbs_key_fetcher::run(&config)
        .await
        .context("Key retrieval failed")?;

    info!("Key retrieval completed successfully!");
    Ok(())
}
