//! File-attributes provider.
//!
//! Probes existence, owner, group, permission mode, and a content
//! checksum, then converges whichever attributes the resource
//! declares. Attributes that cannot be observed (file absent) stay
//! `None` and differ from any declared value.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::{MetadataExt, PermissionsExt};

use filetime::FileTime;
use nix::errno::Errno;
use nix::unistd::{Gid, Uid, chown};

use crate::backup;
use crate::error::{Error, Result};
use crate::resource::{FileAction, FileResource};
use crate::types::Outcome;

/// Mode bits that are managed (permission + setuid/setgid/sticky).
const MODE_MASK: u32 = 0o7777;

/// As-observed state of a managed file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentFile {
    /// Whether anything exists at the path
    pub exists: bool,
    /// Whether the path is a symbolic link
    pub symlink: bool,
    /// Observed owner uid
    pub owner: Option<u32>,
    /// Observed group gid
    pub group: Option<u32>,
    /// Observed permission bits
    pub mode: Option<u32>,
    /// Content checksum, only for readable regular files
    pub checksum: Option<String>,
}

/// Converges a [`FileResource`] against the live filesystem.
#[derive(Debug)]
pub struct FileProvider {
    resource: FileResource,
}

impl FileProvider {
    pub fn new(resource: FileResource) -> Self {
        Self { resource }
    }

    /// Probe the live state of the managed path. Never mutates.
    ///
    /// Absence is a valid current state, not an error; any other
    /// failure to inspect the path is a probe error.
    pub fn load_current_resource(&self) -> Result<CurrentFile> {
        let path = &self.resource.path;
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CurrentFile::default()),
            Err(e) => {
                return Err(Error::Probe {
                    path: path.clone(),
                    source: e,
                });
            }
        };

        let checksum = if meta.is_file() {
            let contents = fs::read(path).map_err(|e| Error::Probe {
                path: path.clone(),
                source: e,
            })?;
            Some(blake3::hash(&contents).to_hex().to_string())
        } else {
            None
        };

        Ok(CurrentFile {
            exists: true,
            symlink: meta.file_type().is_symlink(),
            owner: Some(meta.uid()),
            group: Some(meta.gid()),
            mode: Some(meta.mode() & MODE_MASK),
            checksum,
        })
    }

    /// The declared owner's uid when it differs from the observed
    /// one, after resolving symbolic and numeric-string forms.
    /// `None` means no change is needed: the owner is undeclared or
    /// already matches. An unknown current owner never matches a
    /// declared one.
    pub fn owner_drift(&self, current: &CurrentFile) -> Result<Option<u32>> {
        match &self.resource.owner {
            None => Ok(None),
            Some(ident) => {
                let uid = ident.uid()?;
                Ok((current.owner != Some(uid)).then_some(uid))
            }
        }
    }

    /// Group counterpart of [`Self::owner_drift`].
    pub fn group_drift(&self, current: &CurrentFile) -> Result<Option<u32>> {
        match &self.resource.group {
            None => Ok(None),
            Some(ident) => {
                let gid = ident.gid()?;
                Ok((current.group != Some(gid)).then_some(gid))
            }
        }
    }

    /// The declared mode when the observed permission bits differ.
    pub fn mode_drift(&self, current: &CurrentFile) -> Option<u32> {
        let mode = self.resource.mode? & MODE_MASK;
        (current.mode != Some(mode)).then_some(mode)
    }

    fn set_owner(&self, uid: u32) -> Result<()> {
        let path = &self.resource.path;
        log::info!("setting owner of {} to {uid}", path.display());
        chown(path.as_path(), Some(Uid::from_raw(uid)), None).map_err(|errno| match errno {
            Errno::EPERM => Error::Privilege {
                operation: "change owner of",
                path: path.clone(),
            },
            other => Error::io(format!("changing owner of {}", path.display()), other.into()),
        })
    }

    fn set_group(&self, gid: u32) -> Result<()> {
        let path = &self.resource.path;
        log::info!("setting group of {} to {gid}", path.display());
        chown(path.as_path(), None, Some(Gid::from_raw(gid))).map_err(|errno| match errno {
            Errno::EPERM => Error::Privilege {
                operation: "change group of",
                path: path.clone(),
            },
            other => Error::io(format!("changing group of {}", path.display()), other.into()),
        })
    }

    fn set_mode(&self, mode: u32) -> Result<()> {
        let path = &self.resource.path;
        log::info!("setting mode of {} to {:04o}", path.display(), mode);
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| Error::io(format!("changing mode of {}", path.display()), e))
    }

    /// Converge owner, group, and mode to their declared values.
    fn converge_attributes(&self, current: &CurrentFile) -> Result<Outcome> {
        let mut outcome = Outcome::UNCHANGED;

        if let Some(uid) = self.owner_drift(current)? {
            self.set_owner(uid)?;
            outcome = outcome.merge(Outcome::UPDATED);
        }
        if let Some(gid) = self.group_drift(current)? {
            self.set_group(gid)?;
            outcome = outcome.merge(Outcome::UPDATED);
        }
        if let Some(mode) = self.mode_drift(current) {
            self.set_mode(mode)?;
            outcome = outcome.merge(Outcome::UPDATED);
        }
        Ok(outcome)
    }

    /// Ensure the file exists, then converge its attributes.
    pub fn action_create(&self) -> Result<Outcome> {
        let path = &self.resource.path;
        let mut current = self.load_current_resource()?;
        let mut outcome = Outcome::UNCHANGED;

        if !current.exists {
            log::info!("creating {}", path.display());
            fs::File::create(path)
                .map_err(|e| Error::io(format!("creating {}", path.display()), e))?;
            outcome = outcome.merge(Outcome::UPDATED);
            current = self.load_current_resource()?;
        }

        Ok(outcome.merge(self.converge_attributes(&current)?))
    }

    /// Create only when the current resource indicates absence.
    pub fn action_create_if_missing(&self) -> Result<Outcome> {
        if self.load_current_resource()?.exists {
            Ok(Outcome::UNCHANGED)
        } else {
            self.action_create()
        }
    }

    /// Back up and remove the file. Deleting a nonexistent file is a
    /// silent no-op. Symbolic links are never backed up: copying a
    /// link would resolve and duplicate its target.
    pub fn action_delete(&self) -> Result<Outcome> {
        let path = &self.resource.path;
        let current = self.load_current_resource()?;
        if !current.exists {
            log::debug!("{} already absent, nothing to delete", path.display());
            return Ok(Outcome::UNCHANGED);
        }

        if !current.symlink {
            backup::backup(path, self.resource.backup)?;
        }
        log::info!("deleting {}", path.display());
        fs::remove_file(path).map_err(|e| Error::io(format!("deleting {}", path.display()), e))?;
        Ok(Outcome::UPDATED)
    }

    /// Update atime/mtime to now, creating the file first if absent.
    pub fn action_touch(&self) -> Result<Outcome> {
        let path = &self.resource.path;
        let outcome = self.action_create()?;

        let now = FileTime::now();
        filetime::set_file_times(path, now, now)
            .map_err(|e| Error::io(format!("touching {}", path.display()), e))?;
        log::info!("touched {}", path.display());
        Ok(outcome.merge(Outcome::UPDATED))
    }
}

impl super::Provider for FileProvider {
    fn id(&self) -> String {
        self.resource.name.clone()
    }

    fn resource_type(&self) -> &'static str {
        "file"
    }

    fn converge(&mut self) -> Result<Outcome> {
        match self.resource.action {
            FileAction::Create => self.action_create(),
            FileAction::CreateIfMissing => self.action_create_if_missing(),
            FileAction::Delete => self.action_delete(),
            FileAction::Touch => self.action_touch(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Ident;
    use std::os::unix::fs::symlink;
    use std::path::Path;

    fn resource(path: &Path, action: FileAction) -> FileResource {
        FileResource {
            name: "test file".to_string(),
            path: path.to_path_buf(),
            action,
            backup: 5,
            owner: None,
            group: None,
            mode: None,
        }
    }

    #[test]
    fn probe_of_absent_file_is_blank_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileProvider::new(resource(&dir.path().join("missing"), FileAction::Create));
        let current = provider.load_current_resource().unwrap();
        assert!(!current.exists);
        assert_eq!(current.owner, None);
        assert_eq!(current.group, None);
        assert_eq!(current.mode, None);
        assert_eq!(current.checksum, None);
    }

    #[test]
    fn probe_reads_attributes_and_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seattle.txt");
        fs::write(&path, "rainy").unwrap();

        let provider = FileProvider::new(resource(&path, FileAction::Create));
        let current = provider.load_current_resource().unwrap();
        assert!(current.exists);
        assert!(!current.symlink);
        assert!(current.owner.is_some());
        assert!(current.group.is_some());
        assert!(current.mode.is_some());
        assert_eq!(
            current.checksum.as_deref(),
            Some(blake3::hash(b"rainy").to_hex().as_str())
        );
    }

    #[test]
    fn unknown_current_owner_drifts_from_any_declared_value() {
        let dir = tempfile::tempdir().unwrap();
        let mut res = resource(&dir.path().join("missing"), FileAction::Create);
        res.owner = Some(Ident::Id(501));
        let provider = FileProvider::new(res);
        let current = provider.load_current_resource().unwrap();
        assert_eq!(provider.owner_drift(&current).unwrap(), Some(501));
    }

    #[test]
    fn numeric_string_owner_shows_no_drift_against_integer_form() {
        let current = CurrentFile {
            exists: true,
            owner: Some(501),
            group: Some(501),
            ..CurrentFile::default()
        };

        let dir = tempfile::tempdir().unwrap();
        let mut res = resource(&dir.path().join("f"), FileAction::Create);
        res.owner = Some(Ident::Name("501".to_string()));
        res.group = Some(Ident::Id(501));
        let provider = FileProvider::new(res);
        assert_eq!(provider.owner_drift(&current).unwrap(), None);
        assert_eq!(provider.group_drift(&current).unwrap(), None);

        // Drift reports the resolved uid so the repair needs no
        // second resolution.
        let mismatched = CurrentFile {
            owner: Some(777),
            ..current.clone()
        };
        assert_eq!(provider.owner_drift(&mismatched).unwrap(), Some(501));
    }

    #[test]
    fn undeclared_mode_never_drifts() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileProvider::new(resource(&dir.path().join("f"), FileAction::Create));
        let current = CurrentFile {
            exists: true,
            mode: Some(0o600),
            ..CurrentFile::default()
        };
        assert_eq!(provider.mode_drift(&current), None);
    }

    #[test]
    fn create_makes_file_and_sets_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monkeyfoo");
        let mut res = resource(&path, FileAction::Create);
        res.mode = Some(0o755);

        let outcome = FileProvider::new(res).action_create().unwrap();
        assert!(outcome.updated);
        let meta = fs::metadata(&path).unwrap();
        assert_eq!(meta.mode() & MODE_MASK, 0o755);
    }

    #[test]
    fn create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stable");
        let mut res = resource(&path, FileAction::Create);
        res.mode = Some(0o644);
        let provider = FileProvider::new(res);

        assert!(provider.action_create().unwrap().updated);
        // Second run converges to the same state with no mutation.
        assert!(!provider.action_create().unwrap().updated);
    }

    #[test]
    fn create_if_missing_leaves_existing_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("existing");
        fs::write(&path, "keep me").unwrap();
        let mut res = resource(&path, FileAction::CreateIfMissing);
        res.mode = Some(0o600);

        let outcome = FileProvider::new(res).action_create_if_missing().unwrap();
        assert!(!outcome.updated);
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me");
    }

    #[test]
    fn delete_of_nonexistent_file_is_a_quiet_noop() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileProvider::new(resource(&dir.path().join("ghost"), FileAction::Delete));
        let outcome = provider.action_delete().unwrap();
        assert!(!outcome.updated);
    }

    #[test]
    fn delete_backs_up_regular_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detroit.txt");
        fs::write(&path, "so long").unwrap();
        let mut res = resource(&path, FileAction::Delete);
        res.backup = 1;

        let outcome = FileProvider::new(res).action_delete().unwrap();
        assert!(outcome.updated);
        assert!(!path.exists());
        assert_eq!(backup::backups_for(&path).unwrap().len(), 1);
    }

    #[test]
    fn delete_never_backs_up_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        fs::write(&target, "pointed at").unwrap();
        let link = dir.path().join("link");
        symlink(&target, &link).unwrap();

        let mut res = resource(&link, FileAction::Delete);
        res.backup = 5;
        let outcome = FileProvider::new(res).action_delete().unwrap();
        assert!(outcome.updated);
        assert!(!link.exists());
        assert!(target.exists());
        assert!(backup::backups_for(&link).unwrap().is_empty());
    }

    #[test]
    fn delete_with_backups_disabled_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-backup");
        fs::write(&path, "gone").unwrap();
        let mut res = resource(&path, FileAction::Delete);
        res.backup = 0;

        FileProvider::new(res).action_delete().unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn ownership_change_without_privilege_fails_loudly() {
        if nix::unistd::geteuid().is_root() {
            // EPERM cannot be observed when running as root
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rooted");
        fs::write(&path, "").unwrap();
        let mut res = resource(&path, FileAction::Create);
        res.owner = Some(Ident::Id(0));

        let err = FileProvider::new(res).action_create().unwrap_err();
        assert!(matches!(err, Error::Privilege { .. }));
    }

    #[test]
    fn touch_creates_missing_file_and_reports_updated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("touched");
        let provider = FileProvider::new(resource(&path, FileAction::Touch));

        let outcome = provider.action_touch().unwrap();
        assert!(outcome.updated);
        assert!(path.exists());
    }

    #[test]
    fn touch_updates_timestamps_of_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old");
        fs::write(&path, "aged").unwrap();
        let ancient = FileTime::from_unix_time(1_215_255_153, 0);
        filetime::set_file_times(&path, ancient, ancient).unwrap();

        FileProvider::new(resource(&path, FileAction::Touch))
            .action_touch()
            .unwrap();

        let mtime = FileTime::from_last_modification_time(&fs::metadata(&path).unwrap());
        assert!(mtime.unix_seconds() > ancient.unix_seconds());
    }
}
