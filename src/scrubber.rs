//! PII Scrubber
//!
//! Replaces personally identifiable information in free text before it leaves
//! the process. Every string returned to a caller that may contain
//! application-originated data (log lines, command output, job exceptions,
//! error messages) passes through [`PiiScrubber::scrub`].
//!
//! Patterns are applied in a fixed order. The built-in set is:
//!
//! | name             | placeholder        |
//! |------------------|--------------------|
//! | `email`          | `[EMAIL]`          |
//! | `ipv4`, `ipv6`   | `[IP]`             |
//! | `phone`          | `[PHONE]`          |
//! | `credit_card`    | `[CARD]`           |
//! | `ssn`            | `[SSN]`            |
//! | `api_key`        | `[API_KEY]`        |
//! | `bearer_token`   | `Bearer [TOKEN]`   |
//! | `password_field` | key kept, value `[REDACTED]` |
//! | `jwt`            | `[JWT]`            |
//!
//! Custom patterns from configuration are merged by name: a custom pattern
//! named like a built-in one replaces it in place, anything else is appended.
//! Custom patterns use the generic replacement unless their name has a
//! dedicated placeholder.

use regex::{Regex, RegexBuilder};
use std::borrow::Cow;

use crate::config::ScrubberConfig;

/// Built-in patterns in application order
const DEFAULT_PATTERNS: &[(&str, &str)] = &[
    ("email", r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"),
    (
        "ipv4",
        r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b",
    ),
    ("ipv6", r"\b(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}\b"),
    (
        "phone",
        r"\b(?:\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}\b",
    ),
    (
        "credit_card",
        r"\b(?:4[0-9]{12}(?:[0-9]{3})?|5[1-5][0-9]{14}|3[47][0-9]{13}|6(?:011|5[0-9]{2})[0-9]{12})\b",
    ),
    ("ssn", r"\b[0-9]{3}-[0-9]{2}-[0-9]{4}\b"),
    (
        "api_key",
        r#"(?i)\b(?:api[_-]?key|apikey|api[_-]?secret)["']?\s*[:=]\s*["']?([a-zA-Z0-9_-]{20,})["']?"#,
    ),
    (
        "bearer_token",
        r"(?i)Bearer\s+[a-zA-Z0-9_-]+\.?[a-zA-Z0-9_-]*\.?[a-zA-Z0-9_-]*",
    ),
    (
        "password_field",
        r#"(?i)((?:password|passwd|pwd|secret|token)["']?\s*[:=]\s*["']?)[^"'&\s]+"#,
    ),
    ("jwt", r"(?i)eyJ[a-zA-Z0-9_-]*\.eyJ[a-zA-Z0-9_-]*\.[a-zA-Z0-9_-]*"),
];

/// Errors raised while building a scrubber
#[derive(Debug, thiserror::Error)]
pub enum ScrubberError {
    #[error("Invalid scrub pattern '{name}': {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unsupported flag '{flag}' in scrub pattern '{name}'")]
    UnsupportedFlag { name: String, flag: char },
}

/// A compiled, named scrub rule
#[derive(Debug, Clone)]
struct ScrubRule {
    name: String,
    pattern: Regex,
    replacement: String,
}

/// Scrubs PII from text using an ordered list of regex rules
#[derive(Debug, Clone)]
pub struct PiiScrubber {
    rules: Vec<ScrubRule>,
    enabled: bool,
}

impl PiiScrubber {
    /// Build a scrubber from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScrubberError`] if any custom pattern fails to compile.
    pub fn new(config: &ScrubberConfig) -> Result<Self, ScrubberError> {
        let mut rules = Vec::with_capacity(DEFAULT_PATTERNS.len() + config.patterns.len());

        for (name, regex) in DEFAULT_PATTERNS {
            rules.push(compile_rule(name, regex, &config.replacement)?);
        }

        for custom in &config.patterns {
            let rule = compile_rule(&custom.name, &custom.regex, &config.replacement)?;
            match rules.iter_mut().find(|r| r.name == custom.name) {
                Some(existing) => *existing = rule,
                None => rules.push(rule),
            }
        }

        Ok(Self {
            rules,
            enabled: config.enabled,
        })
    }

    /// Scrubber with the built-in patterns and the default replacement
    pub fn with_defaults() -> Result<Self, ScrubberError> {
        Self::new(&ScrubberConfig::default())
    }

    /// Scrubber that returns every input unchanged
    pub fn disabled() -> Self {
        Self {
            rules: Vec::new(),
            enabled: false,
        }
    }

    /// Whether scrubbing is applied
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Names of the active rules, in application order
    pub fn pattern_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name.as_str()).collect()
    }

    /// Apply every rule in order. Returns the input unchanged when disabled.
    pub fn scrub(&self, text: &str) -> String {
        if !self.enabled || text.is_empty() {
            return text.to_string();
        }

        let mut result = Cow::Borrowed(text);
        for rule in &self.rules {
            if let Cow::Owned(replaced) = rule
                .pattern
                .replace_all(&result, rule.replacement.as_str())
            {
                result = Cow::Owned(replaced);
            }
        }
        result.into_owned()
    }

    /// Scrub each line independently, preserving order and count
    pub fn scrub_lines<S: AsRef<str>>(&self, lines: &[S]) -> Vec<String> {
        lines.iter().map(|line| self.scrub(line.as_ref())).collect()
    }
}

/// Placeholder for a pattern name
fn replacement_for(name: &str, generic: &str) -> String {
    match name {
        "email" => "[EMAIL]",
        "ipv4" | "ipv6" => "[IP]",
        "phone" => "[PHONE]",
        "credit_card" => "[CARD]",
        "ssn" => "[SSN]",
        "api_key" => "[API_KEY]",
        "bearer_token" => "Bearer [TOKEN]",
        "jwt" => "[JWT]",
        "uuid" => "[UUID]",
        // Keep the captured key and separator
        "password_field" => return format!("${{1}}{}", escape_replacement(generic)),
        _ => return escape_replacement(generic),
    }
    .to_string()
}

fn escape_replacement(text: &str) -> String {
    text.replace('$', "$$")
}

fn compile_rule(name: &str, regex: &str, generic: &str) -> Result<ScrubRule, ScrubberError> {
    let (body, flags) = split_delimited(regex);

    let mut builder = RegexBuilder::new(body);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            'u' => builder.unicode(true),
            other => {
                return Err(ScrubberError::UnsupportedFlag {
                    name: name.to_string(),
                    flag: other,
                })
            }
        };
    }

    let pattern = builder
        .build()
        .map_err(|source| ScrubberError::InvalidPattern {
            name: name.to_string(),
            source,
        })?;

    Ok(ScrubRule {
        name: name.to_string(),
        pattern,
        replacement: replacement_for(name, generic),
    })
}

/// Split `/body/flags` into its parts; anything else is a bare pattern.
fn split_delimited(regex: &str) -> (&str, &str) {
    if let Some(rest) = regex.strip_prefix('/') {
        if let Some(end) = rest.rfind('/') {
            let flags = &rest[end + 1..];
            if flags.chars().all(|c| c.is_ascii_alphabetic()) {
                return (&rest[..end], flags);
            }
        }
    }
    (regex, "")
}
