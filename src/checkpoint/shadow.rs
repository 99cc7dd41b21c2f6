// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Shadow repository - hidden per-task version control
//!
//! Each task gets one bare repository under the server's storage
//! directory whose working tree is pointed at the user's workspace.
//! Snapshots commit the full workspace state there without ever touching
//! the user's own `.git` (git skips `.git` path components when staging
//! and checking out, so the user's repository metadata is never read,
//! written, or deleted).

use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{IndexAddOption, Oid, Repository, RepositoryInitOptions, Signature};

use crate::error::{Result, SidecarError};

const WORKSPACE_CONFIG_KEY: &str = "checkpoint.workspace";

/// A bare repository mirroring one workspace for one task
pub struct ShadowRepository {
    repo: Repository,
    workspace: PathBuf,
}

impl ShadowRepository {
    /// Open the shadow repository for `task_id` under `storage_root`,
    /// creating it on first use.
    ///
    /// The repository is bound to the workspace it was created against;
    /// opening it with a different workspace fails fast.
    pub fn open_or_create(
        storage_root: &Path,
        task_id: &str,
        workspace: &Path,
    ) -> Result<Self> {
        let repo_path = storage_root.join(task_id);

        let repo = if repo_path.join("HEAD").exists() {
            Repository::open_bare(&repo_path)?
        } else {
            std::fs::create_dir_all(&repo_path)?;
            let mut opts = RepositoryInitOptions::new();
            opts.bare(true);
            let repo = Repository::init_opts(&repo_path, &opts)?;
            repo.config()?
                .set_str(WORKSPACE_CONFIG_KEY, &workspace.to_string_lossy())?;
            repo
        };

        let bound = repo
            .config()?
            .get_string(WORKSPACE_CONFIG_KEY)
            .map_err(|_| {
                SidecarError::checkpoint(task_id, "shadow repository has no workspace binding")
            })?;
        if Path::new(&bound) != workspace {
            return Err(SidecarError::checkpoint(
                task_id,
                format!(
                    "shadow repository is bound to '{}', not '{}'",
                    bound,
                    workspace.display()
                ),
            ));
        }

        repo.set_workdir(workspace, false)?;

        Ok(Self {
            repo,
            workspace: workspace.to_path_buf(),
        })
    }

    /// Commit the full current workspace state and return the snapshot id.
    ///
    /// Stages additions, modifications, and deletions; each call appends
    /// a new commit and never rewrites prior ones.
    pub fn snapshot(&self, message: &str) -> Result<String> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = Signature::now("sidecar", "sidecar@localhost")?;

        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        Ok(oid.to_string())
    }

    /// Reset the workspace to exactly the state recorded at `snapshot_id`.
    ///
    /// Files created since the snapshot are removed; the shadow
    /// repository's own history is left untouched so later snapshots
    /// remain restorable.
    pub fn restore(&self, snapshot_id: &str) -> Result<()> {
        let oid = Oid::from_str(snapshot_id)?;
        let commit = self.repo.find_commit(oid)?;

        let mut opts = CheckoutBuilder::new();
        opts.force().remove_untracked(true);
        self.repo
            .checkout_tree(commit.as_object(), Some(&mut opts))?;

        // Realign the index with what was just checked out, so the next
        // snapshot diffs against the restored state
        let mut index = self.repo.index()?;
        index.read_tree(&commit.tree()?)?;
        index.write()?;

        Ok(())
    }

    /// The workspace this repository is bound to
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TempDir) {
        let storage = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        (storage, workspace)
    }

    #[test]
    fn test_create_and_snapshot() {
        let (storage, workspace) = setup();
        std::fs::write(workspace.path().join("main.rs"), "fn main() {}").unwrap();

        let shadow =
            ShadowRepository::open_or_create(storage.path(), "task-1", workspace.path()).unwrap();
        let id = shadow.snapshot("initial").unwrap();

        assert_eq!(id.len(), 40);
        assert!(storage.path().join("task-1").join("HEAD").exists());
    }

    #[test]
    fn test_snapshot_restore_roundtrip() {
        let (storage, workspace) = setup();
        let file = workspace.path().join("a.txt");
        std::fs::write(&file, "before").unwrap();

        let shadow =
            ShadowRepository::open_or_create(storage.path(), "t", workspace.path()).unwrap();
        let id = shadow.snapshot("m").unwrap();

        std::fs::write(&file, "after").unwrap();
        std::fs::write(workspace.path().join("new.txt"), "junk").unwrap();

        shadow.restore(&id).unwrap();

        assert_eq!(std::fs::read_to_string(&file).unwrap(), "before");
        assert!(!workspace.path().join("new.txt").exists());
    }

    #[test]
    fn test_restore_recovers_deleted_file() {
        let (storage, workspace) = setup();
        let file = workspace.path().join("keep.txt");
        std::fs::write(&file, "contents").unwrap();

        let shadow =
            ShadowRepository::open_or_create(storage.path(), "t", workspace.path()).unwrap();
        let id = shadow.snapshot("m").unwrap();

        std::fs::remove_file(&file).unwrap();
        shadow.restore(&id).unwrap();

        assert_eq!(std::fs::read_to_string(&file).unwrap(), "contents");
    }

    #[test]
    fn test_sequential_snapshots_distinct_ids() {
        let (storage, workspace) = setup();
        std::fs::write(workspace.path().join("f"), "v1").unwrap();

        let shadow =
            ShadowRepository::open_or_create(storage.path(), "t", workspace.path()).unwrap();
        let first = shadow.snapshot("one").unwrap();

        std::fs::write(workspace.path().join("f"), "v2").unwrap();
        let second = shadow.snapshot("two").unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_restore_earlier_keeps_later_snapshot() {
        let (storage, workspace) = setup();
        let file = workspace.path().join("f");
        std::fs::write(&file, "v1").unwrap();

        let shadow =
            ShadowRepository::open_or_create(storage.path(), "t", workspace.path()).unwrap();
        let first = shadow.snapshot("one").unwrap();

        std::fs::write(&file, "v2").unwrap();
        let second = shadow.snapshot("two").unwrap();

        shadow.restore(&first).unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "v1");

        // The later snapshot is still there and restorable
        shadow.restore(&second).unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "v2");
    }

    #[test]
    fn test_reopen_reuses_repository() {
        let (storage, workspace) = setup();
        std::fs::write(workspace.path().join("f"), "v1").unwrap();

        let first = {
            let shadow =
                ShadowRepository::open_or_create(storage.path(), "t", workspace.path()).unwrap();
            shadow.snapshot("one").unwrap()
        };

        std::fs::write(workspace.path().join("f"), "v2").unwrap();
        let shadow =
            ShadowRepository::open_or_create(storage.path(), "t", workspace.path()).unwrap();
        let second = shadow.snapshot("two").unwrap();

        assert_ne!(first, second);
        shadow.restore(&first).unwrap();
        assert_eq!(
            std::fs::read_to_string(workspace.path().join("f")).unwrap(),
            "v1"
        );
    }

    #[test]
    fn test_workspace_binding_mismatch_fails() {
        let (storage, workspace) = setup();
        let other = TempDir::new().unwrap();

        ShadowRepository::open_or_create(storage.path(), "t", workspace.path()).unwrap();
        let result = ShadowRepository::open_or_create(storage.path(), "t", other.path());

        assert!(result.is_err());
    }

    #[test]
    fn test_user_git_dir_left_alone() {
        let (storage, workspace) = setup();
        let user_git = workspace.path().join(".git");
        std::fs::create_dir(&user_git).unwrap();
        std::fs::write(user_git.join("config"), "[core]").unwrap();
        std::fs::write(workspace.path().join("f"), "v1").unwrap();

        let shadow =
            ShadowRepository::open_or_create(storage.path(), "t", workspace.path()).unwrap();
        let id = shadow.snapshot("m").unwrap();

        std::fs::write(user_git.join("config"), "[core]\nbare = false").unwrap();
        shadow.restore(&id).unwrap();

        // The user's repository metadata is never captured or reverted
        assert_eq!(
            std::fs::read_to_string(user_git.join("config")).unwrap(),
            "[core]\nbare = false"
        );
    }

    #[test]
    fn test_restore_unknown_snapshot_fails() {
        let (storage, workspace) = setup();
        std::fs::write(workspace.path().join("f"), "v").unwrap();

        let shadow =
            ShadowRepository::open_or_create(storage.path(), "t", workspace.path()).unwrap();
        shadow.snapshot("m").unwrap();

        let missing = "0123456789abcdef0123456789abcdef01234567";
        assert!(shadow.restore(missing).is_err());
        assert!(shadow.restore("not-an-oid").is_err());
    }

    #[test]
    fn test_snapshot_captures_subdirectories() {
        let (storage, workspace) = setup();
        let nested = workspace.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("mod.rs"), "pub fn f() {}").unwrap();

        let shadow =
            ShadowRepository::open_or_create(storage.path(), "t", workspace.path()).unwrap();
        let id = shadow.snapshot("m").unwrap();

        std::fs::remove_dir_all(workspace.path().join("src")).unwrap();
        shadow.restore(&id).unwrap();

        assert_eq!(
            std::fs::read_to_string(nested.join("mod.rs")).unwrap(),
            "pub fn f() {}"
        );
    }
}
