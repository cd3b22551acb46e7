#![allow(dead_code)]

use std::collections::BTreeMap;

use scipipe::config::model::{
    ConfigFile, FilesConfig, ParamsConfig, ProcessConfig, RawConfigFile, WorkflowSection,
};
use scipipe::errors::Result;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            config: RawConfigFile {
                workflow: WorkflowSection {
                    name: name.to_string(),
                    max_concurrent_tasks: 4,
                    ..WorkflowSection::default()
                },
                params: BTreeMap::new(),
                files: BTreeMap::new(),
                process: BTreeMap::new(),
            },
        }
    }

    pub fn max_concurrent_tasks(mut self, n: usize) -> Self {
        self.config.workflow.max_concurrent_tasks = n;
        self
    }

    pub fn driver(mut self, name: &str) -> Self {
        self.config.workflow.driver = Some(name.to_string());
        self
    }

    pub fn sink(mut self, addr: &str) -> Self {
        self.config.workflow.sink.push(addr.to_string());
        self
    }

    pub fn with_process(mut self, name: &str, process: ProcessConfig) -> Self {
        self.config.process.insert(name.to_string(), process);
        self
    }

    pub fn with_params(mut self, name: &str, values: &[(&str, &[&str])], combine: bool) -> Self {
        let values = values
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect();
        self.config
            .params
            .insert(name.to_string(), ParamsConfig { values, combine });
        self
    }

    pub fn with_files(mut self, name: &str, paths: &[&str]) -> Self {
        self.config.files.insert(
            name.to_string(),
            FilesConfig {
                paths: paths.iter().map(|p| p.to_string()).collect(),
                glob: None,
                root: None,
            },
        );
        self
    }

    pub fn with_glob(mut self, name: &str, root: &str, glob: &str) -> Self {
        self.config.files.insert(
            name.to_string(),
            FilesConfig {
                paths: Vec::new(),
                glob: Some(glob.to_string()),
                root: Some(root.to_string()),
            },
        );
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Builder for `ProcessConfig`.
pub struct ProcessConfigBuilder {
    process: ProcessConfig,
}

impl ProcessConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            process: ProcessConfig {
                cmd: cmd.to_string(),
                out: BTreeMap::new(),
                inputs: BTreeMap::new(),
                params: BTreeMap::new(),
                stream: Vec::new(),
                prepend: None,
                cores: 1,
            },
        }
    }

    pub fn out(mut self, port: &str, pattern: &str) -> Self {
        self.process.out.insert(port.to_string(), pattern.to_string());
        self
    }

    pub fn input(mut self, port: &str, source: &str) -> Self {
        self.process
            .inputs
            .entry(port.to_string())
            .or_default()
            .push(source.to_string());
        self
    }

    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.process.params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn stream(mut self, port: &str) -> Self {
        self.process.stream.push(port.to_string());
        self
    }

    pub fn prepend(mut self, prepend: &str) -> Self {
        self.process.prepend = Some(prepend.to_string());
        self
    }

    pub fn cores(mut self, cores: usize) -> Self {
        self.process.cores = cores;
        self
    }

    pub fn build(self) -> ProcessConfig {
        self.process
    }
}
