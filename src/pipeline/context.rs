// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-request isolation directory with scoped cleanup

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

use super::errors::PipelineError;

/// Longest accepted request id
pub const MAX_REQUEST_ID_LEN: usize = 128;

/// Check that a request id is usable as a single directory name
pub fn validate_request_id(request_id: &str) -> Result<(), PipelineError> {
    let valid = !request_id.is_empty()
        && request_id.len() <= MAX_REQUEST_ID_LEN
        && request_id != "."
        && request_id != ".."
        && request_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(PipelineError::InvalidRequestId(request_id.to_string()))
    }
}

/// Working directory owned by exactly one request
///
/// The directory is created when the context is built and removed, with
/// everything under it, when the context is dropped.
#[derive(Debug)]
pub struct RequestContext {
    isolation_dir: PathBuf,
}

impl RequestContext {
    /// Create `work_dir/<request_id>`
    ///
    /// Fails if the id is not a safe path component or the directory
    /// already exists.
    pub fn create(work_dir: &Path, request_id: &str) -> Result<Self, PipelineError> {
        validate_request_id(request_id)?;

        fs::create_dir_all(work_dir)?;

        let isolation_dir = work_dir.join(request_id);
        match fs::create_dir(&isolation_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(PipelineError::DuplicateRequest(request_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        debug!("Created isolation dir {}", isolation_dir.display());

        Ok(Self { isolation_dir })
    }

    pub fn isolation_dir(&self) -> &Path {
        &self.isolation_dir
    }

    /// Root of the per-slot crop folders
    pub fn crops_dir(&self) -> PathBuf {
        self.isolation_dir.join("crops")
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        let start = Instant::now();
        match fs::remove_dir_all(&self.isolation_dir) {
            Ok(()) => debug!(
                "Cleanup of {} took {}ms",
                self.isolation_dir.display(),
                start.elapsed().as_millis()
            ),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Cleanup of {} failed: {}",
                self.isolation_dir.display(),
                e
            ),
        }
    }
}
