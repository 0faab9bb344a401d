// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! Write a retrieved secret to disk.

use std::{
    fs::{self, Permissions},
    io::Write,
    os::unix::fs::PermissionsExt,
    path::Path,
};

use base64::{engine::general_purpose::STANDARD, Engine};
use log::debug;
use tempfile::NamedTempFile;
use zeroize::Zeroizing;

use crate::{FetchError, Result};

/// `---` base64 encoded, i.e. the start of an encoded PEM block.
pub const BASE64_PEM_PREFIX: &[u8] = b"LS0t";

/// Owner read-only.
pub const SECRET_FILE_MODE: u32 = 0o400;

/// Decode `raw` if it is a base64 encoded PEM block, otherwise return it
/// unchanged. Whitespace inside the encoding (line wrapping) is ignored.
pub fn decode_secret(raw: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if !raw.trim_ascii_start().starts_with(BASE64_PEM_PREFIX) {
        return Ok(Zeroizing::new(raw.to_vec()));
    }

    debug!("secret is a base64 encoded PEM block");
    let encoded: Zeroizing<Vec<u8>> = Zeroizing::new(
        raw.iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect(),
    );
    Ok(Zeroizing::new(STANDARD.decode(&*encoded)?))
}

/// Write the secret to `destination` with mode `0o400`.
///
/// The content goes to a temporary file next to the destination which is
/// renamed into place once complete, so a failure never leaves a partial
/// secret at `destination`.
pub fn materialize(raw: &[u8], destination: &Path) -> Result<()> {
    let secret = decode_secret(raw)?;
    let io_err = |source| FetchError::Materialize {
        path: destination.to_path_buf(),
        source,
    };

    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(io_err)?;

    let mut file = NamedTempFile::new_in(parent).map_err(io_err)?;
    file.write_all(&secret).map_err(io_err)?;
    file.as_file().sync_all().map_err(io_err)?;
    file.as_file()
        .set_permissions(Permissions::from_mode(SECRET_FILE_MODE))
        .map_err(io_err)?;
    file.persist(destination).map_err(|e| io_err(e.error))?;

    Ok(())
}
