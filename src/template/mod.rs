// src/template/mod.rs

//! Command-template language.
//!
//! A command template is a shell command with placeholders of the form
//! `{TYPE:NAME}` or `{TYPE:NAME|MODIFIER|...}`:
//!
//! ```text
//! cat {i:in} | grep {p:pattern} > {o:out}
//! echo {i:files:r: } > {o:list}
//! ```
//!
//! - [`placeholder`] parses placeholders with the regex
//!   `\{(o|os|i|is|p|t):([^{}]+)\}`.
//! - [`modifier`] implements `s/FIND/REPLACE/`, `%SUFFIX`, `basename` and
//!   `dirname`.
//! - [`formatter`] turns task inputs into output paths.

pub mod formatter;
pub mod modifier;
pub mod placeholder;

pub use formatter::PathFormatter;
pub use modifier::Modifier;
pub use placeholder::{Placeholder, PlaceholderKind};

use crate::errors::{Result, SciPipeError};
use crate::types::Params;

/// A parsed command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    raw: String,
    placeholders: Vec<Placeholder>,
}

impl CommandTemplate {
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let placeholders = placeholder::parse_placeholders(&raw).map_err(|(placeholder, reason)| {
            SciPipeError::Placeholder {
                placeholder,
                command: raw.clone(),
                reason,
            }
        })?;
        Ok(Self { raw, placeholders })
    }

    /// Parse a template, inlining `{p:NAME}` placeholders that have a static
    /// value in `params` (modifiers are applied to the value).
    pub fn parse_with_params(raw: impl Into<String>, params: &Params) -> Result<Self> {
        let template = Self::parse(raw)?;
        if params.is_empty() {
            return Ok(template);
        }

        let inlined = template.expand(|ph| match ph.kind {
            PlaceholderKind::Param if params.contains_key(&ph.name) => {
                Ok(vec![params[&ph.name].clone()])
            }
            _ => Ok(vec![ph.raw.clone()]),
        })?;
        Self::parse(inlined)
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    /// Names referenced by placeholders of the given kinds, first occurrence
    /// order, without duplicates.
    pub fn names_of(&self, kinds: &[PlaceholderKind]) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for ph in &self.placeholders {
            if kinds.contains(&ph.kind) && !names.contains(&ph.name) {
                names.push(ph.name.clone());
            }
        }
        names
    }

    /// Substitute every placeholder.
    ///
    /// `resolve` returns the raw values for a placeholder; modifiers are
    /// applied to each value. Several values are only allowed for reducing
    /// placeholders (`{i:NAME:r:SEP}`), whose values are joined with `SEP`.
    ///
    /// Placeholders left untouched by the caller (returned as `ph.raw`) are
    /// copied verbatim and not modified.
    pub fn expand<F>(&self, mut resolve: F) -> Result<String>
    where
        F: FnMut(&Placeholder) -> Result<Vec<String>>,
    {
        let mut out = String::with_capacity(self.raw.len());
        let mut last = 0;

        for ph in &self.placeholders {
            out.push_str(&self.raw[last..ph.start]);
            last = ph.end;

            let values = resolve(ph)?;
            if values.len() == 1 && values[0] == ph.raw {
                out.push_str(&ph.raw);
                continue;
            }

            let values: Vec<String> = values
                .iter()
                .map(|v| modifier::apply_all(&ph.modifiers, v))
                .collect();

            match (&ph.reduce_sep, values.len()) {
                (Some(sep), _) => out.push_str(&values.join(sep)),
                (None, 1) => out.push_str(&values[0]),
                (None, n) => {
                    return Err(self.placeholder_error(
                        ph,
                        format!("expected exactly one value, got {n} (use {{i:NAME:r:SEP}} for sub-streams)"),
                    ));
                }
            }
        }

        out.push_str(&self.raw[last..]);
        Ok(out)
    }

    /// Error naming a placeholder of this template.
    pub fn placeholder_error(&self, ph: &Placeholder, reason: impl Into<String>) -> SciPipeError {
        SciPipeError::Placeholder {
            placeholder: ph.raw.clone(),
            command: self.raw.clone(),
            reason: reason.into(),
        }
    }
}
