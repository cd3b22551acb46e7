// src/task/workdir.rs

//! Per-task temporary working directories.

use crate::ip::Ip;
use crate::template::modifier::basename;
use crate::types::Params;

/// Prefix of every task workdir.
pub const WORKDIR_PREFIX: &str = "_scipipe_tmp";

/// Longest allowed directory name (common filesystem limit).
pub const MAX_WORKDIR_NAME: usize = 255;

/// Hex characters of the blake3 digest kept when a name is clamped.
const HASH_CHARS: usize = 32;

/// Hex characters of the digest of the full input paths.
pub const INPUT_HASH_CHARS: usize = 8;

/// Build the workdir name for a task.
///
/// The name encodes the process name, the basenames of all inputs and all
/// `k=v` parameter pairs. Tasks with inputs also get a short digest of the
/// full input paths, since basenames alone collide across directories.
/// Names longer than [`MAX_WORKDIR_NAME`] keep a prefix and end in a hash of
/// the full name.
pub fn workdir_name<'a>(
    process: &str,
    inputs: impl IntoIterator<Item = &'a Ip>,
    params: &Params,
) -> String {
    let mut parts = vec![WORKDIR_PREFIX.to_string(), process.to_string()];
    let mut hasher = blake3::Hasher::new();
    let mut has_inputs = false;

    for file in inputs.into_iter().flat_map(|ip| match ip {
        Ip::File(file) => vec![&**file],
        Ip::SubStream(s) => s.ips().iter().map(|f| &**f).collect(),
    }) {
        parts.push(basename(file.path()).to_string());
        hasher.update(file.path().as_bytes());
        hasher.update(&[0]);
        has_inputs = true;
    }
    for (k, v) in params {
        parts.push(format!("{k}={v}"));
    }
    if has_inputs {
        let digest = hasher.finalize().to_hex();
        parts.push(digest.as_str()[..INPUT_HASH_CHARS].to_string());
    }

    clamp(&sanitize(&parts.join(".")))
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '=') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn clamp(name: &str) -> String {
    if name.len() <= MAX_WORKDIR_NAME {
        return name.to_string();
    }
    let digest = blake3::hash(name.as_bytes()).to_hex();
    let keep = MAX_WORKDIR_NAME - HASH_CHARS - 1;
    // sanitize() leaves ASCII only, so byte slicing is on char boundaries.
    format!("{}.{}", &name[..keep], &digest.as_str()[..HASH_CHARS])
}
