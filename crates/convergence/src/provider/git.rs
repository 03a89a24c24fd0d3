//! Git repository-deployment provider.
//!
//! Probes the currently deployed revision, resolves symbolic revision
//! expressions against the remote's reference listing, and either
//! clones fresh or fetch-and-resets an existing checkout. All mutating
//! actions report `updated == true` unconditionally: without an extra
//! diff the provider cannot cheaply tell "fetched but nothing changed"
//! from "changed", so it is conservative.

use std::fs;
use std::io::ErrorKind;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::exec::{CommandRunner, CommandSpec};
use crate::resource::{GitAction, GitResource};
use crate::types::Outcome;

/// The implicit default remote alias. As a revision expression it is
/// ambiguous and always rejected.
const DEFAULT_REMOTE: &str = "origin";

/// Local branch created when checking out a resolved revision.
const DEPLOY_BRANCH: &str = "deploy";

/// Whether `expr` is already a concrete revision identifier
/// (full-length lowercase hex), needing no remote resolution.
pub fn is_commit_id(expr: &str) -> bool {
    expr.len() == 40
        && expr
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Parse `git ls-remote` output: one `<hex>\t<refname>` pair per line.
pub fn parse_ref_listing(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(id, name)| (id.to_string(), name.trim().to_string()))
        .collect()
}

/// Converges a [`GitResource`] against the destination directory.
pub struct GitProvider {
    resource: GitResource,
    runner: Arc<dyn CommandRunner>,
}

impl GitProvider {
    pub fn new(resource: GitResource, runner: Arc<dyn CommandRunner>) -> Self {
        Self { resource, runner }
    }

    /// Build a git command carrying the resource's user and SSH
    /// wrapper, without a working directory.
    fn git(&self, args: &[&str]) -> CommandSpec {
        let mut spec = CommandSpec::new("git", args);
        if let Some(wrapper) = &self.resource.ssh_wrapper {
            spec = spec.env("GIT_SSH", wrapper);
        }
        if let Some(user) = &self.resource.user {
            spec = spec.user(user);
        }
        spec
    }

    /// A git command run inside the destination checkout.
    fn git_in_dest(&self, args: &[&str]) -> CommandSpec {
        self.git(args).cwd(&self.resource.destination)
    }

    /// The revision currently deployed at the destination, or `None`
    /// when there is no checkout. A destination without a repository
    /// metadata directory, or one `git` refuses to read (nonzero
    /// exit), is "no current revision", not an error.
    pub fn find_current_revision(&self) -> Result<Option<String>> {
        if !self.resource.destination.join(".git").exists() {
            return Ok(None);
        }
        let result = self
            .runner
            .run(&self.git_in_dest(&["rev-parse", "HEAD"]))?;
        if result.success() {
            Ok(Some(result.stdout.trim().to_string()))
        } else {
            log::debug!(
                "git rev-parse failed in {}: {}",
                self.resource.destination.display(),
                result.stderr.trim()
            );
            Ok(None)
        }
    }

    /// Resolve the declared revision expression to a concrete id.
    ///
    /// Concrete ids pass through without a remote query. The empty
    /// expression denotes the remote's default branch tip and resolves
    /// through the reference literally named `HEAD`. The default
    /// remote alias is rejected as ambiguous. Anything else matches
    /// the first remote reference whose name ends with the expression.
    pub fn resolve_revision(&self) -> Result<String> {
        let expr = self.resource.revision.trim();

        if is_commit_id(expr) {
            return Ok(expr.to_string());
        }
        if expr == DEFAULT_REMOTE {
            return Err(Error::AmbiguousRevision(expr.to_string()));
        }

        let refs = self.remote_refs(expr)?;
        let found = if expr.is_empty() {
            refs.iter().find(|(_, name)| name == "HEAD")
        } else {
            refs.iter().find(|(_, name)| name.ends_with(expr))
        };

        found
            .map(|(id, _)| id.clone())
            .ok_or_else(|| Error::UnresolvableRevision {
                revision: expr.to_string(),
                repository: self.resource.repository.clone(),
            })
    }

    /// List the remote's references, optionally filtered by pattern.
    fn remote_refs(&self, pattern: &str) -> Result<Vec<(String, String)>> {
        let mut args = vec!["ls-remote", self.resource.repository.as_str()];
        if !pattern.is_empty() {
            args.push(pattern);
        }
        let result = self.runner.run_checked(&self.git(&args))?;
        Ok(parse_ref_listing(&result.stdout))
    }

    /// Clone the repository into the destination.
    fn clone_repo(&self) -> Result<()> {
        log::info!(
            "cloning {} into {}",
            self.resource.repository,
            self.resource.destination.display()
        );

        let depth = self.resource.depth.map(|d| d.to_string());
        let mut args = vec!["clone"];
        if let Some(depth) = &depth {
            args.push("--depth");
            args.push(depth);
        }
        if self.resource.remote != DEFAULT_REMOTE {
            args.push("-o");
            args.push(&self.resource.remote);
        }
        args.push(&self.resource.repository);
        let destination = self.resource.destination.to_string_lossy();
        args.push(&destination);

        self.runner.run_checked(&self.git(&args))?;
        Ok(())
    }

    /// Create and check out the deploy branch at the resolved revision.
    fn checkout(&self, revision: &str) -> Result<()> {
        self.runner
            .run_checked(&self.git_in_dest(&["checkout", "-b", DEPLOY_BRANCH, revision]))?;
        Ok(())
    }

    /// Initialize and update submodules, when declared.
    fn enable_submodules(&self) -> Result<()> {
        if !self.resource.enable_submodules {
            return Ok(());
        }
        self.runner
            .run_checked(&self.git_in_dest(&["submodule", "init"]))?;
        self.runner
            .run_checked(&self.git_in_dest(&["submodule", "update"]))?;
        Ok(())
    }

    /// Fetch from the configured remote and hard-reset the working
    /// tree to the resolved revision. A non-default remote is
    /// registered (URL and fetch refspec) before fetching.
    fn fetch_and_reset(&self, revision: &str) -> Result<()> {
        let remote = &self.resource.remote;
        if remote != DEFAULT_REMOTE {
            self.runner.run_checked(&self.git_in_dest(&[
                "config",
                &format!("remote.{remote}.url"),
                &self.resource.repository,
            ]))?;
            self.runner.run_checked(&self.git_in_dest(&[
                "config",
                &format!("remote.{remote}.fetch"),
                &format!("+refs/heads/*:refs/remotes/{remote}/*"),
            ]))?;
        }
        self.runner
            .run_checked(&self.git_in_dest(&["fetch", remote, "--tags"]))?;
        self.runner
            .run_checked(&self.git_in_dest(&["reset", "--hard", revision]))?;
        Ok(())
    }

    /// A destination that does not exist, or contains no entries
    /// besides the self/parent pseudo-entries, gets a fresh checkout
    /// instead of an incremental sync.
    fn destination_missing_or_empty(&self) -> Result<bool> {
        let destination = &self.resource.destination;
        let mut entries = match fs::read_dir(destination) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => {
                return Err(Error::Probe {
                    path: destination.clone(),
                    source: e,
                });
            }
        };
        Ok(entries.next().is_none())
    }

    /// Full deployment: clone, branch checkout, optional submodules.
    pub fn action_checkout(&self) -> Result<Outcome> {
        let revision = self.resolve_revision()?;
        self.clone_repo()?;
        self.checkout(&revision)?;
        self.enable_submodules()?;
        Ok(Outcome::UPDATED)
    }

    /// Incremental sync, falling back to a full checkout when the
    /// destination is missing or empty.
    pub fn action_sync(&self) -> Result<Outcome> {
        if self.destination_missing_or_empty()? {
            return self.action_checkout();
        }

        let current = self.find_current_revision()?;
        let revision = self.resolve_revision()?;
        log::info!(
            "syncing {} from {:?} to {}",
            self.resource.destination.display(),
            current.as_deref().unwrap_or("no checkout"),
            revision
        );
        self.fetch_and_reset(&revision)?;
        Ok(Outcome::UPDATED)
    }

    /// Checkout, then strip the repository metadata so the
    /// destination is a plain file tree with no history.
    pub fn action_export(&self) -> Result<Outcome> {
        let outcome = self.action_checkout()?;
        let git_dir = self.resource.destination.join(".git");
        log::info!("removing {} for export", git_dir.display());
        fs::remove_dir_all(&git_dir)
            .map_err(|e| Error::io(format!("removing {}", git_dir.display()), e))?;
        Ok(outcome)
    }
}

impl super::Provider for GitProvider {
    fn id(&self) -> String {
        self.resource.name.clone()
    }

    fn resource_type(&self) -> &'static str {
        "git"
    }

    fn converge(&mut self) -> Result<Outcome> {
        match self.resource.action {
            GitAction::Sync => self.action_sync(),
            GitAction::Checkout => self.action_checkout(),
            GitAction::Export => self.action_export(),
        }
    }
}
