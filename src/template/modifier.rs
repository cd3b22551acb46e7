// src/template/modifier.rs

//! Placeholder modifiers (`|basename`, `|%.txt`, `|s/a/b/`, ...).

/// One modifier applied to a resolved placeholder value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modifier {
    /// `s/FIND/REPLACE/`: replace the first occurrence of `find`.
    Replace { find: String, replace: String },
    /// `%SUFFIX`: strip a trailing suffix, repeated until the value no
    /// longer ends with it.
    TrimSuffix(String),
    /// `basename`: keep the last path component.
    Basename,
    /// `dirname`: keep everything before the last path component.
    Dirname,
}

impl Modifier {
    /// Parse the text between two `|` separators.
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "basename" => return Ok(Modifier::Basename),
            "dirname" => return Ok(Modifier::Dirname),
            _ => {}
        }

        if let Some(suffix) = raw.strip_prefix('%') {
            if suffix.is_empty() {
                return Err("empty suffix in '%' modifier".to_string());
            }
            return Ok(Modifier::TrimSuffix(suffix.to_string()));
        }

        if let Some(body) = raw.strip_prefix("s/") {
            let body = body.strip_suffix('/').unwrap_or(body);
            let (find, replace) = body
                .split_once('/')
                .ok_or_else(|| format!("malformed replace modifier '{raw}' (expected s/FIND/REPLACE/)"))?;
            if find.is_empty() {
                return Err(format!("empty search string in modifier '{raw}'"));
            }
            return Ok(Modifier::Replace {
                find: find.to_string(),
                replace: replace.to_string(),
            });
        }

        Err(format!("unknown modifier '{raw}'"))
    }

    pub fn apply(&self, value: &str) -> String {
        match self {
            Modifier::Replace { find, replace } => value.replacen(find.as_str(), replace, 1),
            Modifier::TrimSuffix(suffix) => {
                let mut trimmed = value;
                while let Some(rest) = trimmed.strip_suffix(suffix.as_str()) {
                    trimmed = rest;
                }
                trimmed.to_string()
            }
            Modifier::Basename => basename(value).to_string(),
            Modifier::Dirname => dirname(value).to_string(),
        }
    }
}

/// Apply modifiers left to right.
pub fn apply_all(modifiers: &[Modifier], value: &str) -> String {
    modifiers
        .iter()
        .fold(value.to_string(), |acc, m| m.apply(&acc))
}

/// Last component of a slash-separated path; never contains a `/`.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Directory part of a slash-separated path (`.` when there is none).
pub fn dirname(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some(("", _)) => "/",
        Some((dir, _)) => dir,
        None if path.starts_with('/') => "/",
        None => ".",
    }
}
