//! Output placement: next to caller files, or in a throwaway temp location

use super::{StagedFile, StagingPool};
use crate::error::Result;
use std::path::{Path, PathBuf};

/// Where one output artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDecision {
    pub path: PathBuf,
    /// `true`: caller-visible, never deleted. `false`: temp, bytes must be
    /// captured into the response before cleanup.
    pub persisted: bool,
}

/// First free name for `base_name` in `dir`: `name.ext`, `name_1.ext`, ...
///
/// The existence check is advisory; concurrent requests may still race.
pub fn unique_path(dir: &Path, base_name: &str) -> PathBuf {
    let candidate = dir.join(base_name);
    if !candidate.exists() {
        return candidate;
    }

    let base = Path::new(base_name);
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| base_name.to_string());
    let ext = base.extension().map(|e| e.to_string_lossy().into_owned());

    let mut counter = 1u32;
    loop {
        let name = match &ext {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        let candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Placement decided once per request and applied to every output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// At least one input came from the caller's filesystem.
    Persisted { dir: PathBuf },
    /// All inputs were inline payloads; outputs go to a staged temp dir.
    Temporary { dir: PathBuf },
}

impl Placement {
    /// Persist beside the first caller-owned input, else stage a temp dir.
    pub fn decide(pool: &mut StagingPool, inputs: &[StagedFile]) -> Result<Self> {
        if let Some(caller) = inputs.iter().find(|f| !f.is_owned()) {
            return Ok(Placement::Persisted {
                dir: caller.directory(),
            });
        }
        Ok(Placement::Temporary {
            dir: pool.temp_dir()?,
        })
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, Placement::Persisted { .. })
    }

    /// Output under `base_name` in the placement directory.
    pub fn output(&self, base_name: &str) -> OutputDecision {
        match self {
            Placement::Persisted { dir } => {
                let path = unique_path(dir, base_name);
                tracing::info!(path = %path.display(), "output persisted beside caller input");
                OutputDecision {
                    path,
                    persisted: true,
                }
            }
            Placement::Temporary { dir } => OutputDecision {
                path: unique_path(dir, base_name),
                persisted: false,
            },
        }
    }

    /// Output for a per-input artifact: beside that input when persisted.
    pub fn output_beside(&self, input: &StagedFile, base_name: &str) -> OutputDecision {
        match self {
            Placement::Persisted { .. } if !input.is_owned() => {
                Placement::Persisted {
                    dir: input.directory(),
                }
                .output(base_name)
            }
            _ => self.output(base_name),
        }
    }
}

/// Write `bytes` to the decided path, removing any partial file on failure.
pub fn write_output(decision: &OutputDecision, bytes: &[u8]) -> Result<()> {
    if let Err(e) = std::fs::write(&decision.path, bytes) {
        let _ = std::fs::remove_file(&decision.path);
        return Err(e.into());
    }
    Ok(())
}
