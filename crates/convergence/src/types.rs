//! Core types shared across the convergence engine.

/// Result of converging one resource.
///
/// The updated flag is part of the returned value rather than a hidden
/// mutable field, so the notification layer and property tests can see
/// it without re-inspecting provider internals. It is monotonic within
/// a pass: merging can only turn it on, never off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Whether any real mutation was performed
    pub updated: bool,
}

impl Outcome {
    /// No mutation was performed.
    pub const UNCHANGED: Self = Self { updated: false };
    /// At least one real mutation was performed.
    pub const UPDATED: Self = Self { updated: true };

    /// Combine with the outcome of a later sub-step.
    pub fn merge(self, other: Self) -> Self {
        Self {
            updated: self.updated || other.updated,
        }
    }
}

/// Summary of one convergence pass over the whole catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Resources converged
    pub total: usize,
    /// Resources that performed at least one mutation
    pub updated: usize,
    /// Resources already in their declared state
    pub unchanged: usize,
}

impl PassSummary {
    /// Record one resource's outcome.
    pub fn record(&mut self, outcome: Outcome) {
        self.total += 1;
        if outcome.updated {
            self.updated += 1;
        } else {
            self.unchanged += 1;
        }
    }

    /// Whether any resource changed during the pass.
    pub fn any_updates(&self) -> bool {
        self.updated > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_monotonic() {
        let outcome = Outcome::UPDATED.merge(Outcome::UNCHANGED);
        assert!(outcome.updated);
        assert!(Outcome::UNCHANGED.merge(Outcome::UPDATED).updated);
        assert!(!Outcome::UNCHANGED.merge(Outcome::UNCHANGED).updated);
    }

    #[test]
    fn summary_counts_outcomes() {
        let mut summary = PassSummary::default();
        summary.record(Outcome::UPDATED);
        summary.record(Outcome::UNCHANGED);
        summary.record(Outcome::UNCHANGED);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.unchanged, 2);
        assert!(summary.any_updates());
    }
}
