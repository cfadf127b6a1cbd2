//! Input resolution: base64 payload or local path to a staged file

use super::{StagedFile, StagingPool};
use crate::error::{Error, Result};
use base64::Engine;
use std::path::PathBuf;

/// Strip surrounding whitespace and quote characters from a path argument.
pub fn clean_path_argument(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

/// Decode a base64 payload, tolerating a `data:...;base64,` prefix and
/// transports that wrap long lines.
pub fn decode_base64_payload(payload: &str) -> Result<Vec<u8>> {
    let body = match payload.split_once(',') {
        Some((_, rest)) => rest,
        None => payload,
    };
    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, '\n' | '\r' | ' '))
        .collect();

    let engine = base64::engine::general_purpose::STANDARD;
    let data = engine.decode(cleaned.as_bytes())?;

    if data.is_empty() {
        return Err(Error::input("Decoded base64 payload is empty"));
    }
    Ok(data)
}

fn resolve_path(pool: &mut StagingPool, raw: &str) -> Result<StagedFile> {
    let cleaned = clean_path_argument(raw);
    if cleaned.is_empty() {
        return Err(Error::input("Empty file path"));
    }
    let path = PathBuf::from(&cleaned);
    if !path.exists() {
        return Err(Error::not_found(cleaned));
    }
    Ok(pool.track(path, false))
}

fn resolve_data(pool: &mut StagingPool, data: &str, suffix: &str) -> Result<StagedFile> {
    let bytes = decode_base64_payload(data)?;
    let path = pool.temp_file(suffix)?;
    std::fs::write(&path, &bytes)?;

    let written = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    if written == 0 {
        pool.release(&path);
        return Err(Error::input(format!(
            "Failed to stage decoded payload at {}",
            path.display()
        )));
    }
    Ok(StagedFile::owned(path))
}

/// Materialize one input. A path wins over data when both are given.
pub fn resolve_input(
    pool: &mut StagingPool,
    data: Option<&str>,
    path: Option<&str>,
    suffix: &str,
) -> Result<StagedFile> {
    match (path, data) {
        (Some(p), _) if !p.trim().is_empty() => resolve_path(pool, p),
        (_, Some(d)) if !d.trim().is_empty() => resolve_data(pool, d, suffix),
        _ => Err(Error::input(
            "Either base64 data or a local file path must be provided",
        )),
    }
}

/// Materialize a list of inputs. Local paths win when non-empty.
///
/// If any element fails, every file this call already staged is removed
/// before the error is returned.
pub fn resolve_many(
    pool: &mut StagingPool,
    data: Option<&[String]>,
    paths: Option<&[String]>,
    suffix: &str,
) -> Result<Vec<StagedFile>> {
    let use_paths = paths.map(|p| !p.is_empty()).unwrap_or(false);
    let items: &[String] = if use_paths {
        paths.unwrap_or_default()
    } else {
        data.unwrap_or_default()
    };
    if items.is_empty() {
        return Err(Error::input(
            "Either base64 data or local file paths must be provided",
        ));
    }

    let mut resolved: Vec<StagedFile> = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let outcome = if use_paths {
            resolve_path(pool, item)
        } else {
            resolve_data(pool, item, suffix)
        };
        match outcome {
            Ok(staged) => resolved.push(staged),
            Err(e) => {
                for staged in resolved.iter().filter(|s| s.is_owned()) {
                    pool.release(staged.path());
                }
                return Err(match e {
                    Error::Input { .. } | Error::Base64Decode(_) => {
                        Error::input(format!("Input #{}: {}", i + 1, e.client_message()))
                    }
                    other => other,
                });
            }
        }
    }
    Ok(resolved)
}

/// Number of items a list argument carries, using the same precedence as
/// [`resolve_many`]. Used to gate batches before anything is staged.
pub fn batch_len(data: Option<&[String]>, paths: Option<&[String]>) -> usize {
    match paths {
        Some(p) if !p.is_empty() => p.len(),
        _ => data.map(|d| d.len()).unwrap_or(0),
    }
}
