#![allow(dead_code)]

use std::fs;
use std::path::Path;

pub use scipipe_test_utils::builders;
pub use scipipe_test_utils::{RecordingBackend, init_tracing, path_in, with_timeout};

/// Write `content` to `dir/name` and return the absolute path.
pub fn write_file(dir: &Path, name: &str, content: &str) -> String {
    let path = path_in(dir, name);
    fs::write(&path, content).expect("write test input");
    path
}

/// File contents with surrounding whitespace removed; empty if unreadable.
pub fn read_trimmed(path: &str) -> String {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

pub fn exists(path: &str) -> bool {
    Path::new(path).exists()
}

/// Task workdirs of `process` still present in the current directory.
pub fn leftover_workdirs(process: &str) -> Vec<String> {
    let prefix = format!("_scipipe_tmp.{process}.");
    let exact = format!("_scipipe_tmp.{process}");
    fs::read_dir(".")
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|n| n == &exact || n.starts_with(&prefix))
                .collect()
        })
        .unwrap_or_default()
}
