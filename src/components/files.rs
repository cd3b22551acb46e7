// src/components/files.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use globset::{Glob, GlobMatcher};
use tracing::{debug, info};

use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};
use crate::ip::paths::validate_path;
use crate::ip::Ip;
use crate::port::{InPort, OutPort, PortCloser};
use crate::process::{ProcessFuture, RunContext, WorkflowProcess};

/// Name of the out-port of the file sources.
pub const OUT_PORT: &str = "out";

/// Emits one packet per configured path on `out`.
#[derive(Debug)]
pub struct FileSource {
    name: String,
    out: OutPort,
    paths: Vec<String>,
}

impl FileSource {
    pub fn new(name: impl Into<String>, paths: Vec<String>) -> Result<Self> {
        for path in &paths {
            validate_path(path)?;
        }
        let name = name.into();
        Ok(Self {
            out: OutPort::new(name.clone(), OUT_PORT),
            name,
            paths,
        })
    }

    pub fn out(&self) -> &OutPort {
        &self.out
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

impl WorkflowProcess for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn in_ports(&self) -> Vec<InPort> {
        Vec::new()
    }

    fn out_ports(&self) -> Vec<OutPort> {
        vec![self.out.clone()]
    }

    fn run(self: Arc<Self>, _ctx: RunContext) -> ProcessFuture {
        Box::pin(async move {
            let _closer = PortCloser::new(vec![self.out.clone()], Vec::new());
            send_paths(&self.name, &self.out, &self.paths).await
        })
    }
}

/// Emits every file under `root` whose relative path matches a glob, in
/// sorted order.
#[derive(Debug)]
pub struct FileGlobber {
    name: String,
    out: OutPort,
    root: PathBuf,
    pattern: String,
    matcher: GlobMatcher,
    fs: Arc<dyn FileSystem>,
}

impl FileGlobber {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, pattern: &str) -> Result<Self> {
        Self::with_fs(name, root, pattern, Arc::new(RealFileSystem))
    }

    pub fn with_fs(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        pattern: &str,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let matcher = Glob::new(pattern)
            .with_context(|| format!("invalid glob pattern: {pattern}"))?
            .compile_matcher();
        let name = name.into();
        Ok(Self {
            out: OutPort::new(name.clone(), OUT_PORT),
            name,
            root: root.into(),
            pattern: pattern.to_string(),
            matcher,
            fs,
        })
    }

    pub fn out(&self) -> &OutPort {
        &self.out
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Paths of all matching files, sorted.
    pub fn matching_files(&self) -> Result<Vec<String>> {
        let mut files = collect_matching_files(self.fs.as_ref(), &self.root, &self.matcher)?
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        files.sort();
        Ok(files)
    }
}

impl WorkflowProcess for FileGlobber {
    fn name(&self) -> &str {
        &self.name
    }

    fn in_ports(&self) -> Vec<InPort> {
        Vec::new()
    }

    fn out_ports(&self) -> Vec<OutPort> {
        vec![self.out.clone()]
    }

    fn run(self: Arc<Self>, _ctx: RunContext) -> ProcessFuture {
        Box::pin(async move {
            let _closer = PortCloser::new(vec![self.out.clone()], Vec::new());
            let files = self.matching_files()?;
            info!(
                process = %self.name,
                pattern = %self.pattern,
                root = %self.root.display(),
                count = files.len(),
                "globbed input files"
            );
            send_paths(&self.name, &self.out, &files).await
        })
    }
}

async fn send_paths(process: &str, out: &OutPort, paths: &[String]) -> Result<()> {
    for path in paths {
        debug!(process = %process, path = %path, "sending file");
        out.send(Ip::file(path.clone())?).await?;
    }
    Ok(())
}

/// Walk `root` and collect files whose path relative to `root` matches.
fn collect_matching_files(
    fs: &dyn FileSystem,
    root: &Path,
    matcher: &GlobMatcher,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(root) {
                    let rel = rel.to_string_lossy().replace('\\', "/");
                    if matcher.is_match(&rel) {
                        files.push(path);
                    }
                }
            }
        }
    }

    Ok(files)
}
