//! Post-translation quality gate

use serde::{Deserialize, Serialize};

/// Outcome of a quality check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub needs_review: bool,
    /// Human-readable explanations, one per concern
    pub reasons: Vec<String>,
}

impl QualityVerdict {
    pub fn accept() -> Self {
        Self::default()
    }

    pub fn flag(reasons: Vec<String>) -> Self {
        Self {
            needs_review: true,
            reasons,
        }
    }
}

/// Pluggable heuristic run on every finished translation. A flagged unit is
/// committed with `need:review`.
pub trait QualityCheck: Send + Sync {
    fn review(&self, source: &str, translated: &str) -> QualityVerdict;
}

/// Never flags anything
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl QualityCheck for AcceptAll {
    fn review(&self, _source: &str, _translated: &str) -> QualityVerdict {
        QualityVerdict::accept()
    }
}

impl<F> QualityCheck for F
where
    F: Fn(&str, &str) -> QualityVerdict + Send + Sync,
{
    fn review(&self, source: &str, translated: &str) -> QualityVerdict {
        self(source, translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_all() {
        assert!(!AcceptAll.review("Hello", "Hola").needs_review);
    }

    #[test]
    fn test_closure_check() {
        let check = |source: &str, translated: &str| {
            if translated.len() < source.len() / 2 {
                QualityVerdict::flag(vec!["translation much shorter than source".into()])
            } else {
                QualityVerdict::accept()
            }
        };
        let verdict = check.review("A reasonably long sentence.", "Sí.");
        assert!(verdict.needs_review);
        assert_eq!(verdict.reasons.len(), 1);
        assert!(!check.review("Hello", "Hola").needs_review);
    }
}
