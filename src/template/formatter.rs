// src/template/formatter.rs

//! Output path formatters.

use std::fmt;
use std::sync::Arc;

use super::{CommandTemplate, PlaceholderKind};
use crate::errors::{Result, SciPipeError};
use crate::ip::Ip;
use crate::task::TaskInputs;

/// Closure computing an output path from a task's inputs.
pub type CustomFormatter = Arc<dyn Fn(&TaskInputs) -> Result<String> + Send + Sync>;

/// Decides the final path of an out-port for each task.
#[derive(Clone)]
pub enum PathFormatter {
    /// Always the same path.
    Static(String),
    /// Path of the packet on `in_port` plus `suffix`.
    Extend { in_port: String, suffix: String },
    /// Path of the packet on `in_port` with the first `old` replaced by `new`.
    Replace {
        in_port: String,
        old: String,
        new: String,
    },
    /// Placeholder pattern such as `{i:in|%.txt}.out.txt`.
    Template(CommandTemplate),
    /// Arbitrary closure over inputs and parameters.
    Custom(CustomFormatter),
}

impl fmt::Debug for PathFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathFormatter::Static(p) => f.debug_tuple("Static").field(p).finish(),
            PathFormatter::Extend { in_port, suffix } => f
                .debug_struct("Extend")
                .field("in_port", in_port)
                .field("suffix", suffix)
                .finish(),
            PathFormatter::Replace { in_port, old, new } => f
                .debug_struct("Replace")
                .field("in_port", in_port)
                .field("old", old)
                .field("new", new)
                .finish(),
            PathFormatter::Template(t) => f.debug_tuple("Template").field(&t.raw()).finish(),
            PathFormatter::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl PathFormatter {
    pub fn fixed(path: impl Into<String>) -> Self {
        PathFormatter::Static(path.into())
    }

    pub fn extend(in_port: impl Into<String>, suffix: impl Into<String>) -> Self {
        PathFormatter::Extend {
            in_port: in_port.into(),
            suffix: suffix.into(),
        }
    }

    pub fn replace(
        in_port: impl Into<String>,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Self {
        PathFormatter::Replace {
            in_port: in_port.into(),
            old: old.into(),
            new: new.into(),
        }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&TaskInputs) -> Result<String> + Send + Sync + 'static,
    {
        PathFormatter::Custom(Arc::new(f))
    }

    /// A placeholder pattern; `{o:...}` / `{os:...}` are not allowed in it.
    pub fn template(pattern: impl Into<String>) -> Result<Self> {
        let template = CommandTemplate::parse(pattern)?;
        if let Some(ph) = template.placeholders().iter().find(|ph| ph.kind.is_output()) {
            return Err(template.placeholder_error(ph, "output placeholders cannot be used in a path pattern"));
        }
        Ok(PathFormatter::Template(template))
    }

    /// A pattern with placeholders becomes a template, anything else a
    /// static path.
    pub fn parse(pattern: &str) -> Result<Self> {
        let template = Self::template(pattern)?;
        match &template {
            PathFormatter::Template(t) if t.placeholders().is_empty() => Ok(Self::fixed(pattern)),
            _ => Ok(template),
        }
    }

    /// In-ports this formatter reads, where that is statically known.
    pub fn referenced_in_ports(&self) -> Vec<String> {
        match self {
            PathFormatter::Extend { in_port, .. } | PathFormatter::Replace { in_port, .. } => {
                vec![in_port.clone()]
            }
            PathFormatter::Template(t) => {
                t.names_of(&[PlaceholderKind::In, PlaceholderKind::InStream])
            }
            PathFormatter::Static(_) | PathFormatter::Custom(_) => Vec::new(),
        }
    }

    /// Compute the final output path for a task.
    pub fn format(&self, inputs: &TaskInputs) -> Result<String> {
        match self {
            PathFormatter::Static(path) => Ok(path.clone()),
            PathFormatter::Extend { in_port, suffix } => {
                Ok(format!("{}{suffix}", required_in_path(inputs, in_port)?))
            }
            PathFormatter::Replace { in_port, old, new } => {
                Ok(required_in_path(inputs, in_port)?.replacen(old.as_str(), new, 1))
            }
            PathFormatter::Custom(f) => f(inputs),
            PathFormatter::Template(template) => template.expand(|ph| match ph.kind {
                PlaceholderKind::In | PlaceholderKind::InStream => match inputs.in_ip(&ph.name) {
                    Some(Ip::File(ip)) => Ok(vec![ip.path().to_string()]),
                    Some(Ip::SubStream(s)) => {
                        Ok(s.ips().iter().map(|ip| ip.path().to_string()).collect())
                    }
                    None => Err(template.placeholder_error(ph, "no input on this port")),
                },
                PlaceholderKind::Param => inputs
                    .param(&ph.name)
                    .map(|v| vec![v.to_string()])
                    .ok_or_else(|| template.placeholder_error(ph, "no value for parameter")),
                PlaceholderKind::Tag => inputs
                    .tag(&ph.name)
                    .map(|v| vec![v])
                    .map_err(|reason| template.placeholder_error(ph, reason)),
                PlaceholderKind::Out | PlaceholderKind::OutStream => Err(template
                    .placeholder_error(ph, "output placeholders cannot be used in a path pattern")),
            }),
        }
    }
}

fn required_in_path<'a>(inputs: &'a TaskInputs, port: &str) -> Result<&'a str> {
    inputs.in_path(port).ok_or_else(|| SciPipeError::MissingInput {
        process: inputs.process.clone(),
        port: port.to_string(),
    })
}
