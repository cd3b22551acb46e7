// src/template/placeholder.rs

use std::sync::LazyLock;

use regex::Regex;

use super::modifier::Modifier;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(o|os|i|is|p|t):([^{}]+)\}").expect("placeholder regex is valid")
});

/// Marker separating an in-port name from its reduce separator.
const REDUCE_MARKER: &str = ":r:";

/// What a placeholder refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    /// `{i:NAME}`: input path (FIFO path if the producer streams).
    In,
    /// `{is:NAME}`: input FIFO path.
    InStream,
    /// `{o:NAME}`: output temp path.
    Out,
    /// `{os:NAME}`: output FIFO path; marks the port streaming.
    OutStream,
    /// `{p:NAME}`: parameter value.
    Param,
    /// `{t:NAME}`: tag value of an input packet.
    Tag,
}

impl PlaceholderKind {
    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "i" => Some(PlaceholderKind::In),
            "is" => Some(PlaceholderKind::InStream),
            "o" => Some(PlaceholderKind::Out),
            "os" => Some(PlaceholderKind::OutStream),
            "p" => Some(PlaceholderKind::Param),
            "t" => Some(PlaceholderKind::Tag),
            _ => None,
        }
    }

    pub fn is_input(self) -> bool {
        matches!(self, PlaceholderKind::In | PlaceholderKind::InStream)
    }

    pub fn is_output(self) -> bool {
        matches!(self, PlaceholderKind::Out | PlaceholderKind::OutStream)
    }
}

/// One parsed `{TYPE:NAME|MOD...}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// The placeholder text as written, braces included.
    pub raw: String,
    pub kind: PlaceholderKind,
    /// Port, parameter or tag name.
    pub name: String,
    /// Separator for `{i:NAME:r:SEP}` sub-stream reduction.
    pub reduce_sep: Option<String>,
    pub modifiers: Vec<Modifier>,
    /// Byte range of `raw` in the template.
    pub start: usize,
    pub end: usize,
}

/// Find and parse every placeholder in `template`, in order of appearance.
///
/// Errors carry the offending placeholder text and a reason.
pub fn parse_placeholders(template: &str) -> Result<Vec<Placeholder>, (String, String)> {
    let mut found = Vec::new();

    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let (Some(whole), Some(prefix), Some(body)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let raw = whole.as_str().to_string();
        let fail = |reason: String| (raw.clone(), reason);

        let kind = PlaceholderKind::from_prefix(prefix.as_str())
            .ok_or_else(|| fail(format!("unknown placeholder type '{}'", prefix.as_str())))?;

        let mut parts = body.as_str().split('|');
        let head = parts.next().unwrap_or_default();

        let (name, reduce_sep) = match head.split_once(REDUCE_MARKER) {
            Some((name, sep)) => (name, Some(sep.to_string())),
            None => (head, None),
        };
        if name.is_empty() {
            return Err(fail("empty name".to_string()));
        }
        if reduce_sep.is_some() && kind != PlaceholderKind::In {
            return Err(fail("reduce separator is only allowed on 'i' placeholders".to_string()));
        }

        let modifiers = parts
            .map(Modifier::parse)
            .collect::<Result<Vec<_>, _>>()
            .map_err(fail)?;

        found.push(Placeholder {
            raw: raw.clone(),
            kind,
            name: name.to_string(),
            reduce_sep,
            modifiers,
            start: whole.start(),
            end: whole.end(),
        });
    }

    Ok(found)
}
