// crates/tessera-node/src/directory.rs
//
// FsSlotDirectory: active-validator discovery through a shared directory
// of per-validator per-slot marker files.
//
// Each participating validator drops a `<uid>.slot_<n>` marker when it
// enters slot n; listing the directory answers "who else is active in
// this slot". The directory is typically a shared mount in co-located
// deployments. When it is unavailable the coordinator degrades to
// time-only phase math and quorum detection falls back to the score
// exchange's own submission count.

use std::fs;
use std::path::{Path, PathBuf};

use tessera_core::{ActiveValidatorDirectory, TesseraError};

/// Filesystem-backed ActiveValidatorDirectory.
pub struct FsSlotDirectory {
    dir: PathBuf,
}

impl FsSlotDirectory {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn marker_suffix(slot: u64) -> String {
        format!(".slot_{}", slot)
    }

    /// Remove markers for slots older than `before_slot`.
    pub fn prune(&self, before_slot: u64) {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(idx) = name.rfind(".slot_") else { continue };
            if let Ok(slot) = name[idx + 6..].parse::<u64>() {
                if slot < before_slot {
                    let _ = fs::remove_file(entry.path());
                }
            }
        }
    }
}

impl ActiveValidatorDirectory for FsSlotDirectory {
    fn register(&self, validator_uid: &str, slot: u64) -> Result<(), TesseraError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| TesseraError::InvalidState(format!("coordination dir: {}", e)))?;
        let marker = self
            .dir
            .join(format!("{}{}", validator_uid, Self::marker_suffix(slot)));
        fs::write(&marker, b"")
            .map_err(|e| TesseraError::InvalidState(format!("slot marker: {}", e)))?;
        Ok(())
    }

    fn list_active_validators(&self, slot: u64) -> Result<Vec<String>, TesseraError> {
        let suffix = Self::marker_suffix(slot);
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| TesseraError::NotFound(format!("coordination dir: {}", e)))?;

        let mut uids = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| TesseraError::InvalidState(format!("coordination dir: {}", e)))?;
            let name = entry.file_name();
            if let Some(name) = name.to_str() {
                if let Some(uid) = name.strip_suffix(&suffix) {
                    uids.push(uid.to_string());
                }
            }
        }
        uids.sort();
        Ok(uids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tessera_test_{}_{}", label, Uuid::now_v7()))
    }

    #[test]
    fn test_register_and_list() {
        let dir = FsSlotDirectory::new(temp_dir("register"));
        dir.register("v1", 42).unwrap();
        dir.register("v2", 42).unwrap();
        dir.register("v3", 43).unwrap();

        let active = dir.list_active_validators(42).unwrap();
        assert_eq!(active, vec!["v1".to_string(), "v2".to_string()]);
        assert_eq!(dir.list_active_validators(43).unwrap(), vec!["v3"]);
    }

    #[test]
    fn test_register_is_idempotent() {
        let dir = FsSlotDirectory::new(temp_dir("idempotent"));
        dir.register("v1", 7).unwrap();
        dir.register("v1", 7).unwrap();
        assert_eq!(dir.list_active_validators(7).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_dir_is_an_error_not_a_panic() {
        let dir = FsSlotDirectory::new(temp_dir("missing"));
        // Never registered, directory never created.
        assert!(dir.list_active_validators(1).is_err());
    }

    #[test]
    fn test_prune_removes_old_markers() {
        let dir = FsSlotDirectory::new(temp_dir("prune"));
        dir.register("v1", 10).unwrap();
        dir.register("v1", 11).unwrap();
        dir.register("v1", 12).unwrap();

        dir.prune(12);
        assert!(dir.list_active_validators(10).unwrap().is_empty());
        assert!(dir.list_active_validators(11).unwrap().is_empty());
        assert_eq!(dir.list_active_validators(12).unwrap(), vec!["v1"]);
    }
}
