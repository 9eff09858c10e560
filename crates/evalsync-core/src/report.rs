//! Display records for service diagnostics
//!
//! Pure transforms from the wire [`Diagnostic`] to what a presentation
//! layer shows. No state, no side effects.

use crate::models::{Diagnostic, Severity};

/// Display severity of a diagnostic record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
}

impl From<Severity> for Level {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Error => Self::Error,
            Severity::Warning => Self::Warning,
        }
    }
}

/// A severity-tagged record ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRecord {
    pub level: Level,
    pub heading: String,
    pub body: Option<String>,
}

/// Maps one diagnostic to its display record. An empty detail string
/// normalizes to no body.
pub fn display_record(diagnostic: &Diagnostic) -> DisplayRecord {
    DisplayRecord {
        level: diagnostic.severity.into(),
        heading: diagnostic.summary.clone(),
        body: diagnostic
            .detail
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(str::to_string),
    }
}

/// Slice helper over [`display_record`], preserving order.
pub fn display_records(diagnostics: &[Diagnostic]) -> Vec<DisplayRecord> {
    diagnostics.iter().map(display_record).collect()
}
