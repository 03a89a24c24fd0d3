//! Provider contract: the executable logic binding a resource type to
//! concrete state inspection and mutation.
//!
//! Every provider probes live state (`load_current_resource` on the
//! concrete type), compares it to the declared state, and dispatches to
//! exactly one action implementation. Side effects are the only
//! externally observable contract; an action returns nothing beyond
//! the [`Outcome`] updated flag and typed failures.

use std::sync::Arc;

use crate::error::Result;
use crate::exec::CommandRunner;
use crate::resource::ResourceSpec;
use crate::types::{Outcome, PassSummary};

pub mod file;
pub mod git;

pub use file::FileProvider;
pub use git::GitProvider;

/// One resource type's probe/compare/act capability set.
pub trait Provider {
    /// The declared resource name.
    fn id(&self) -> String;

    /// Resource type category ("file", "git").
    fn resource_type(&self) -> &'static str;

    /// Probe current state, compare, and run the declared action.
    ///
    /// Idempotent: repeated calls converge to the same state. Returns
    /// `updated == true` iff a real mutation was performed.
    fn converge(&mut self) -> Result<Outcome>;
}

/// Bind a declared resource to its provider.
pub fn provider_for(spec: ResourceSpec, runner: Arc<dyn CommandRunner>) -> Box<dyn Provider> {
    match spec {
        ResourceSpec::File(resource) => Box::new(FileProvider::new(resource)),
        ResourceSpec::Git(resource) => Box::new(GitProvider::new(resource, runner)),
    }
}

/// Run one convergence pass: every provider, strictly sequentially, in
/// catalog order. The first failure aborts the pass; skip-and-continue
/// policy belongs to an outer notification layer, not here.
pub fn run_pass(providers: &mut [Box<dyn Provider>]) -> Result<PassSummary> {
    let mut summary = PassSummary::default();
    for provider in providers.iter_mut() {
        log::debug!("converging {} '{}'", provider.resource_type(), provider.id());
        let outcome = provider.converge()?;
        if outcome.updated {
            log::info!("{} '{}' updated", provider.resource_type(), provider.id());
        } else {
            log::debug!(
                "{} '{}' already in declared state",
                provider.resource_type(),
                provider.id()
            );
        }
        summary.record(outcome);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct ScriptedProvider {
        name: &'static str,
        outcome: Option<Outcome>,
    }

    impl Provider for ScriptedProvider {
        fn id(&self) -> String {
            self.name.to_string()
        }

        fn resource_type(&self) -> &'static str {
            "scripted"
        }

        fn converge(&mut self) -> Result<Outcome> {
            self.outcome.ok_or(Error::Privilege {
                operation: "converge",
                path: "/nowhere".into(),
            })
        }
    }

    #[test]
    fn pass_runs_every_provider_in_order() {
        let mut providers: Vec<Box<dyn Provider>> = vec![
            Box::new(ScriptedProvider {
                name: "a",
                outcome: Some(Outcome::UPDATED),
            }),
            Box::new(ScriptedProvider {
                name: "b",
                outcome: Some(Outcome::UNCHANGED),
            }),
        ];
        let summary = run_pass(&mut providers).unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.unchanged, 1);
    }

    #[test]
    fn first_failure_aborts_the_pass() {
        let mut providers: Vec<Box<dyn Provider>> = vec![
            Box::new(ScriptedProvider {
                name: "boom",
                outcome: None,
            }),
            Box::new(ScriptedProvider {
                name: "never-reached",
                outcome: Some(Outcome::UPDATED),
            }),
        ];
        assert!(run_pass(&mut providers).is_err());
    }
}
