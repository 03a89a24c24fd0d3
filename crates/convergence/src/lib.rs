//! # Convergence
//!
//! A resource/provider convergence engine: declare the desired state
//! of a host, probe its live state, and apply the minimal set of
//! actions to make reality match the declaration, idempotently.
//!
//! ## Core Concepts
//!
//! - **Resource**: a declarative desired-state record ([`resource::FileResource`],
//!   [`resource::GitResource`]) with a name, an action, and attributes
//! - **Provider**: binds a resource type to concrete probe and
//!   mutation logic ([`provider::Provider`])
//! - **Outcome**: whether a convergence performed any real mutation,
//!   surfaced to drive downstream notification chains
//! - **Runner**: the once-or-perpetual daemon loop with splay and
//!   interval scheduling ([`runner::ConvergenceRunner`])
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use convergence::{
//!     provider_for, run_pass, FileAction, FileResource, ResourceSpec, ShellRunner,
//! };
//!
//! let catalog = vec![ResourceSpec::File(FileResource {
//!     name: "motd".into(),
//!     path: "/etc/motd".into(),
//!     action: FileAction::Touch,
//!     backup: 5,
//!     owner: None,
//!     group: None,
//!     mode: None,
//! })];
//!
//! let runner = Arc::new(ShellRunner);
//! let mut providers: Vec<_> = catalog
//!     .into_iter()
//!     .map(|spec| provider_for(spec, runner.clone()))
//!     .collect();
//! let summary = run_pass(&mut providers)?;
//! println!("{} of {} resources updated", summary.updated, summary.total);
//! # Ok::<(), convergence::Error>(())
//! ```
//!
//! ## Seams
//!
//! All shelling out goes through [`exec::CommandRunner`], so providers
//! are testable against a mock and the shell-out can be replaced with
//! an in-process library per platform. The daemon loop waits through
//! [`runner::Sleeper`], so tests simulate elapsed time and forced
//! cancellation without real sleeps.

pub mod backup;
pub mod error;
pub mod exec;
pub mod provider;
pub mod resource;
pub mod runner;
pub mod types;

// Re-export main types at crate root
pub use error::{Error, Result};
pub use exec::{CommandResult, CommandRunner, CommandSpec, ShellRunner};
pub use provider::{FileProvider, GitProvider, Provider, provider_for, run_pass};
pub use resource::{FileAction, FileResource, GitAction, GitResource, Ident, ResourceSpec};
pub use runner::{ConvergenceRunner, RunnerConfig, Sleeper, StopToken};
pub use types::{Outcome, PassSummary};
