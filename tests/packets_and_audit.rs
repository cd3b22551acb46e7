// tests/packets_and_audit.rs

use std::error::Error;
use std::fs;
use std::sync::Arc;

use chrono::{Duration, Utc};

use scipipe::errors::SciPipeError;
use scipipe::ip::paths::{relative_to_workdir, validate_path};
use scipipe::ip::{AuditInfo, FileIp, Ip};
use scipipe::types::Params;

mod common;
use crate::common::{path_in, write_file};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn sibling_paths_follow_suffix_conventions() -> TestResult {
    let ip = FileIp::new("out/result.txt")?;
    assert_eq!(ip.temp_path(), "out/result.txt.tmp");
    assert_eq!(ip.fifo_path(), "out/result.txt.fifo");
    assert_eq!(ip.audit_path(), "out/result.txt.audit.json");
    assert_eq!(ip.read_path(), "out/result.txt");

    let streaming = FileIp::new_streaming("out/result.txt")?;
    assert!(streaming.is_streaming());
    assert_eq!(streaming.read_path(), "out/result.txt.fifo");
    Ok(())
}

#[test]
fn invalid_paths_are_rejected() {
    for bad in ["", "with space.txt", "tab\there", "\\\\server\\share\\x"] {
        let err = validate_path(bad).unwrap_err();
        assert!(matches!(err, SciPipeError::InvalidPath { .. }), "{bad:?}");
        assert!(FileIp::new(bad).is_err());
    }
}

#[test]
fn relative_paths_get_one_parent_prefix() {
    assert_eq!(relative_to_workdir("data/x.txt"), "../data/x.txt");
    assert_eq!(relative_to_workdir("/abs/x.txt"), "/abs/x.txt");
}

#[test]
fn atomize_renames_temp_and_is_idempotent() -> TestResult {
    let dir = tempfile::tempdir()?;
    let ip = FileIp::new(path_in(dir.path(), "final.txt"))?;

    fs::write(ip.temp_path(), "payload")?;
    assert!(ip.temp_exists());
    assert!(!ip.exists());

    ip.atomize()?;
    assert!(ip.exists());
    assert!(!ip.temp_exists());
    assert_eq!(fs::read_to_string(ip.path())?, "payload");

    ip.atomize()?;
    assert!(ip.exists());
    Ok(())
}

#[test]
fn parent_dirs_are_created_for_outputs() -> TestResult {
    let dir = tempfile::tempdir()?;
    let ip = FileIp::new(path_in(dir.path(), "a/b/c.txt"))?;
    ip.ensure_parent_dir()?;
    assert!(dir.path().join("a/b").is_dir());
    Ok(())
}

#[test]
fn audit_json_uses_pascal_case_keys() -> TestResult {
    let mut params = Params::new();
    params.insert("k".into(), "3".into());

    let mut upstream = AuditInfo::started("hello", "echo hi > ../hello.txt.tmp", &Params::new());
    upstream.finish(upstream.start_time + Duration::milliseconds(5));

    let mut audit = AuditInfo::started("world", "cat ../hello.txt > ../world.txt.tmp", &params);
    audit.tags.insert("sample".into(), "s1".into());
    audit.upstream_audit_infos.insert("in".into(), upstream);
    audit.finish(audit.start_time + Duration::milliseconds(10));
    assert_eq!(audit.exec_time_ns, 10_000_000);

    let json = audit.to_json_pretty()?;
    for key in [
        "\"ProcessName\"",
        "\"Command\"",
        "\"Params\"",
        "\"Tags\"",
        "\"StartTime\"",
        "\"EndTime\"",
        "\"ExecTimeNS\"",
        "\"Host\"",
        "\"UpstreamAuditInfos\"",
    ] {
        assert!(json.contains(key), "missing {key} in {json}");
    }

    let back = AuditInfo::from_json(&json)?;
    assert_eq!(back, audit);
    assert_eq!(back.upstream_audit_infos["in"].process_name, "hello");
    Ok(())
}

#[test]
fn audit_info_is_loaded_lazily_from_disk() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "existing.txt", "data");

    let mut audit = AuditInfo::started("producer", "make existing.txt", &Params::new());
    audit.finish(Utc::now());
    audit.write_to(format!("{path}.audit.json"))?;

    let ip = FileIp::new(path.clone())?;
    let loaded = ip.audit_info().ok_or("audit info not loaded")?;
    assert_eq!(loaded.process_name, "producer");

    let plain = FileIp::new(path_in(dir.path(), "no_audit.txt"))?;
    assert!(plain.audit_info().is_none());
    Ok(())
}

#[test]
fn substream_audit_infos_are_indexed() -> TestResult {
    let a = Arc::new(FileIp::new("/d/a.txt")?);
    let b = Arc::new(FileIp::new("/d/b.txt")?);
    a.set_audit_info(AuditInfo::started("pa", "x", &Params::new()));
    b.set_audit_info(AuditInfo::started("pb", "y", &Params::new()));
    b.set_tag("lane", "L2");

    let ip = Ip::SubStream(scipipe::ip::SubStream::new(vec![a, b]));
    let keys: Vec<String> = ip.audit_infos("parts").into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["parts[0]", "parts[1]"]);
    assert_eq!(ip.tag("lane").as_deref(), Some("L2"));
    assert_eq!(ip.path(), "");
    Ok(())
}
