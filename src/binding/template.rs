//! Path templates with placeholders and conditional segments.

use super::BindingError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Invalid regex for path placeholder")
});

static CONDITIONAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[([A-Za-z_][A-Za-z0-9_]*)(?::([^\[\]/]+))?\]$")
        .expect("Invalid regex for conditional segment")
});

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    Var(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Always present; may interpolate placeholders.
    Fixed(Vec<Part>),
    /// Present only when `flag` is truthy; renders as `literal` or the flag name.
    Conditional { flag: String, literal: Option<String> },
}

/// Parsed path template.
///
/// Segments are split on `/` once. A segment that is exactly `[flag]` or `[flag:literal]` is
/// conditional: dropped together with its separator when the flag is false, so the rendered path
/// never contains `//` or a dangling `/` introduced by the omission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
    placeholders: Vec<String>,
    flags: Vec<String>,
}

impl PathTemplate {
    /// Parse and validate a template.
    pub fn parse(raw: &str) -> Result<Self, BindingError> {
        if raw.is_empty() {
            return Err(BindingError::EmptyPath);
        }
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(BindingError::MissingLeadingSlash(raw.to_string()));
        };

        let mut segments = Vec::new();
        let mut placeholders = Vec::new();
        let mut flags = Vec::new();

        for segment in rest.split('/') {
            if let Some(caps) = CONDITIONAL.captures(segment) {
                let flag = caps[1].to_string();
                if !flags.contains(&flag) {
                    flags.push(flag.clone());
                }
                segments.push(Segment::Conditional {
                    flag,
                    literal: caps.get(2).map(|m| m.as_str().to_string()),
                });
                continue;
            }
            if segment.contains('[') || segment.contains(']') {
                return Err(BindingError::MalformedSegment(segment.to_string()));
            }

            let mut parts = Vec::new();
            let mut last = 0;
            for caps in PLACEHOLDER.captures_iter(segment) {
                let whole = caps.get(0).expect("capture group 0 always matches");
                if whole.start() > last {
                    parts.push(Part::Text(segment[last..whole.start()].to_string()));
                }
                let name = caps[1].to_string();
                if !placeholders.contains(&name) {
                    placeholders.push(name.clone());
                }
                parts.push(Part::Var(name));
                last = whole.end();
            }
            if last < segment.len() {
                parts.push(Part::Text(segment[last..].to_string()));
            }
            segments.push(Segment::Fixed(parts));
        }

        Ok(Self { raw: raw.to_string(), segments, placeholders, flags })
    }

    /// Template as declared.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// `{name}` placeholders in order of first appearance.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// `[flag]` names in order of first appearance.
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// True if `name` is a placeholder or a flag.
    pub fn mentions(&self, name: &str) -> bool {
        self.placeholders.iter().any(|p| p == name) || self.flags.iter().any(|f| f == name)
    }

    /// Render with placeholder values and flag states. Missing flags count as false.
    pub fn render(
        &self,
        values: &HashMap<&str, String>,
        flags: &HashMap<&str, bool>,
    ) -> Result<String, BindingError> {
        let mut kept: Vec<String> = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match segment {
                Segment::Fixed(parts) => {
                    let mut rendered = String::new();
                    for part in parts {
                        match part {
                            Part::Text(text) => rendered.push_str(text),
                            Part::Var(name) => match values.get(name.as_str()) {
                                Some(value) => rendered.push_str(value),
                                None => {
                                    return Err(BindingError::MissingPathArgument(name.clone()))
                                }
                            },
                        }
                    }
                    kept.push(rendered);
                }
                Segment::Conditional { flag, literal } => {
                    if flags.get(flag.as_str()).copied().unwrap_or(false) {
                        kept.push(literal.clone().unwrap_or_else(|| flag.clone()));
                    }
                }
            }
        }
        Ok(format!("/{}", kept.join("/")))
    }
}
