//! Finding types produced by the detector.

use serde::{Deserialize, Serialize};

/// Severity level assigned to a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

/// Recognized vulnerability categories.
///
/// A single category today; severity and score are fixed per kind so that a
/// future category can carry its own values without touching the detector
/// loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// SQL query built by interpolating a variable into the query string.
    InjectableQuery,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InjectableQuery => "SQL Injection",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::InjectableQuery => Severity::Critical,
        }
    }

    /// CVSS-like severity proxy for the category.
    pub fn score(&self) -> f32 {
        match self {
            Self::InjectableQuery => 9.8,
        }
    }
}

/// One detected issue instance.
///
/// Created by [`crate::detect`] for a single source text, consumed by the
/// advisory, validation, and publishing stages. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    /// 1-based source line the pattern matched on.
    pub line: u32,
    /// The offending line's text, trimmed.
    pub snippet: String,
    /// Which sub-pattern fired.
    pub rationale: String,
    pub severity: Severity,
    pub score: f32,
}
