//! Declared desired-state records.
//!
//! A resource is a declarative description of one managed unit. It
//! carries a name, an action selector, and type-specific attributes.
//! Resources are built from the catalog at the start of a convergence
//! pass and discarded at its end; nothing persists across passes beyond
//! what the providers re-derive from live state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A declared resource of any supported type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceSpec {
    /// A file and its filesystem attributes
    File(FileResource),
    /// A git repository deployment
    Git(GitResource),
}

impl ResourceSpec {
    /// The declared name of the resource.
    pub fn name(&self) -> &str {
        match self {
            Self::File(r) => &r.name,
            Self::Git(r) => &r.name,
        }
    }
}

/// Owner or group selector: numeric id or symbolic name.
///
/// A numeric string ("501") normalizes to its integer form, so all
/// three spellings of the same identity compare equal after
/// resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ident {
    /// Numeric id
    Id(u32),
    /// Symbolic name, resolved against the system user/group database
    Name(String),
}

impl Ident {
    /// Resolve to a uid.
    pub fn uid(&self) -> Result<u32> {
        match self {
            Self::Id(id) => Ok(*id),
            Self::Name(name) => {
                if let Ok(id) = name.parse::<u32>() {
                    return Ok(id);
                }
                nix::unistd::User::from_name(name)
                    .map_err(|errno| {
                        Error::io(format!("looking up user '{name}'"), errno.into())
                    })?
                    .map(|user| user.uid.as_raw())
                    .ok_or_else(|| Error::UnknownIdent {
                        kind: "user",
                        name: name.clone(),
                    })
            }
        }
    }

    /// Resolve to a gid.
    pub fn gid(&self) -> Result<u32> {
        match self {
            Self::Id(id) => Ok(*id),
            Self::Name(name) => {
                if let Ok(id) = name.parse::<u32>() {
                    return Ok(id);
                }
                nix::unistd::Group::from_name(name)
                    .map_err(|errno| {
                        Error::io(format!("looking up group '{name}'"), errno.into())
                    })?
                    .map(|group| group.gid.as_raw())
                    .ok_or_else(|| Error::UnknownIdent {
                        kind: "group",
                        name: name.clone(),
                    })
            }
        }
    }
}

/// Action selector for file resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    /// Ensure the file exists with the declared attributes
    #[default]
    Create,
    /// Create only when absent; an existing file is left untouched
    CreateIfMissing,
    /// Back up (unless a symlink) and remove the file
    Delete,
    /// Update access/modification times, creating the file first if absent
    Touch,
}

/// A managed file and its filesystem attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResource {
    /// Unique resource name
    pub name: String,
    /// Path of the managed file
    pub path: PathBuf,
    /// What to do with it
    #[serde(default)]
    pub action: FileAction,
    /// How many rotated backups to retain; 0 disables backups
    #[serde(default = "default_backup_count")]
    pub backup: u32,
    /// Desired owner; unmanaged when absent
    #[serde(default)]
    pub owner: Option<Ident>,
    /// Desired group; unmanaged when absent
    #[serde(default)]
    pub group: Option<Ident>,
    /// Desired permission mode, declared as an octal string ("0755")
    #[serde(default, with = "octal_mode")]
    pub mode: Option<u32>,
}

fn default_backup_count() -> u32 {
    5
}

/// Action selector for git deployment resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitAction {
    /// Fetch and hard-reset an existing checkout, cloning when absent
    #[default]
    Sync,
    /// Fresh clone plus branch checkout
    Checkout,
    /// Checkout, then strip the repository metadata directory
    Export,
}

/// A git repository deployed to a destination directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitResource {
    /// Unique resource name
    pub name: String,
    /// Repository URL to clone/fetch from
    pub repository: String,
    /// Directory the checkout lives in
    pub destination: PathBuf,
    /// Revision expression: 40-char commit id, branch/tag name, or
    /// empty for the remote's default branch tip
    #[serde(default)]
    pub revision: String,
    /// Remote alias; "origin" is the implicit default
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Shallow-clone depth; full history when absent
    #[serde(default)]
    pub depth: Option<u32>,
    /// Initialize and update submodules after checkout
    #[serde(default)]
    pub enable_submodules: bool,
    /// Script exported as GIT_SSH for all git commands
    #[serde(default)]
    pub ssh_wrapper: Option<String>,
    /// User to run git as (name or numeric id)
    #[serde(default)]
    pub user: Option<String>,
    /// What to do with it
    #[serde(default)]
    pub action: GitAction,
}

fn default_remote() -> String {
    "origin".to_string()
}

/// Serde helper: permission modes as octal strings.
mod octal_mode {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(mode: &Option<u32>, ser: S) -> Result<S::Ok, S::Error> {
        match mode {
            Some(m) => ser.serialize_some(&format!("{m:04o}")),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<u32>, D::Error> {
        let raw: Option<String> = Option::deserialize(de)?;
        raw.map(|s| {
            u32::from_str_radix(&s, 8)
                .map_err(|_| serde::de::Error::custom(format!("invalid octal mode '{s}'")))
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_numeric_string_normalizes_to_id() {
        assert_eq!(Ident::Name("501".to_string()).uid().unwrap(), 501);
        assert_eq!(Ident::Id(501).uid().unwrap(), 501);
        assert_eq!(Ident::Name("501".to_string()).gid().unwrap(), 501);
    }

    #[test]
    fn ident_unknown_name_fails() {
        let err = Ident::Name("converge-no-such-user".to_string())
            .uid()
            .unwrap_err();
        assert!(matches!(err, Error::UnknownIdent { kind: "user", .. }));
    }

    #[test]
    fn ident_resolves_root() {
        assert_eq!(Ident::Name("root".to_string()).uid().unwrap(), 0);
        assert_eq!(Ident::Name("root".to_string()).gid().unwrap(), 0);
    }

    #[test]
    fn file_resource_parses_with_defaults() {
        let resource: FileResource = toml::from_str(
            r#"
            name = "motd"
            path = "/etc/motd"
            "#,
        )
        .unwrap();
        assert_eq!(resource.action, FileAction::Create);
        assert_eq!(resource.backup, 5);
        assert!(resource.owner.is_none());
        assert!(resource.mode.is_none());
    }

    #[test]
    fn file_resource_parses_octal_mode_and_idents() {
        let resource: FileResource = toml::from_str(
            r#"
            name = "app config"
            path = "/opt/app/config.yml"
            action = "create"
            backup = 2
            owner = "deploy"
            group = 20
            mode = "0644"
            "#,
        )
        .unwrap();
        assert_eq!(resource.mode, Some(0o644));
        assert_eq!(resource.owner, Some(Ident::Name("deploy".to_string())));
        assert_eq!(resource.group, Some(Ident::Id(20)));
    }

    #[test]
    fn git_resource_parses_with_defaults() {
        let resource: GitResource = toml::from_str(
            r#"
            name = "web app"
            repository = "git://example.com/app.git"
            destination = "/srv/app"
            "#,
        )
        .unwrap();
        assert_eq!(resource.action, GitAction::Sync);
        assert_eq!(resource.remote, "origin");
        assert_eq!(resource.revision, "");
        assert!(resource.depth.is_none());
        assert!(!resource.enable_submodules);
    }

    #[test]
    fn tagged_catalog_entry_roundtrips() {
        let spec: ResourceSpec = toml::from_str(
            r#"
            type = "git"
            name = "web app"
            repository = "git://example.com/app.git"
            destination = "/srv/app"
            revision = "v1.0"
            action = "export"
            "#,
        )
        .unwrap();
        assert_eq!(spec.name(), "web app");
        match spec {
            ResourceSpec::Git(git) => assert_eq!(git.action, GitAction::Export),
            ResourceSpec::File(_) => panic!("parsed as wrong resource type"),
        }
    }
}
