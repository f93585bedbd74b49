//! Git operations backing the uncommitted and diff review modes

use std::path::{Path, PathBuf};

use git2::{DiffFormat, DiffOptions, Repository, Status, StatusOptions};

use crate::{Error, Result};

/// A git repository wrapper providing the operations reviews need
pub struct GitRepo {
    repo: Repository,
    root: PathBuf,
}

impl std::fmt::Debug for GitRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepo")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl GitRepo {
    /// Open a git repository, searching upward from the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let repo = Repository::discover(path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                Error::Config(format!(
                    "Not a git repository: {}. The --uncommitted and --diff modes need one.",
                    path.display()
                ))
            } else {
                Error::Git(e)
            }
        })?;

        let root = repo
            .workdir()
            .ok_or_else(|| Error::Config("Bare repositories are not supported".to_string()))?
            .to_path_buf();

        Ok(Self { repo, root })
    }

    /// Get the repository root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check if the given path is inside a git repository
    pub fn is_git_repo(path: impl AsRef<Path>) -> bool {
        Repository::discover(path.as_ref()).is_ok()
    }

    /// Paths with uncommitted changes, relative to the repository root.
    ///
    /// Covers staged and unstaged modifications plus untracked files;
    /// ignored files and deletions are skipped.
    pub fn uncommitted_files(&self) -> Result<Vec<PathBuf>> {
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let interesting = Status::WT_NEW
            | Status::WT_MODIFIED
            | Status::WT_RENAMED
            | Status::INDEX_NEW
            | Status::INDEX_MODIFIED
            | Status::INDEX_RENAMED;

        let statuses = self.repo.statuses(Some(&mut options))?;
        let mut files = Vec::new();
        for entry in statuses.iter() {
            if entry.status().intersects(interesting) {
                if let Some(path) = entry.path() {
                    files.push(PathBuf::from(path));
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// Unified diff between `base_ref` and the working tree.
    ///
    /// When `path` is given the diff is limited to that file. The returned
    /// text is the patch as `git diff <base_ref>` would print it.
    pub fn diff_text(&self, base_ref: &str, path: Option<&Path>) -> Result<String> {
        let object = self.repo.revparse_single(base_ref).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                Error::NotFound(format!("Unknown git reference: {}", base_ref))
            } else {
                Error::Git(e)
            }
        })?;
        let tree = object.peel_to_tree()?;

        let mut options = DiffOptions::new();
        options.include_untracked(true);
        if let Some(path) = path {
            options.pathspec(path);
        }

        let diff = self
            .repo
            .diff_tree_to_workdir_with_index(Some(&tree), Some(&mut options))?;

        let mut text = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            match line.origin() {
                '+' | '-' | ' ' => text.push(line.origin()),
                _ => {}
            }
            text.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "test").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }
        repo
    }

    fn commit_all(repo: &Repository, message: &str) {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let signature = repo.signature().unwrap();
        let parent = repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .unwrap();
    }

    #[test]
    fn test_uncommitted_files_lists_new_and_modified() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());

        std::fs::write(dir.path().join("tracked.rs"), "fn main() {}\n").unwrap();
        commit_all(&repo, "initial");

        std::fs::write(dir.path().join("tracked.rs"), "fn main() { todo!() }\n").unwrap();
        std::fs::write(dir.path().join("fresh.rs"), "struct S;\n").unwrap();

        let git = GitRepo::open(dir.path()).unwrap();
        let files = git.uncommitted_files().unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("fresh.rs"), PathBuf::from("tracked.rs")]
        );
    }

    #[test]
    fn test_uncommitted_files_empty_when_clean() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        std::fs::write(dir.path().join("a.rs"), "fn a() {}\n").unwrap();
        commit_all(&repo, "initial");

        let git = GitRepo::open(dir.path()).unwrap();
        assert!(git.uncommitted_files().unwrap().is_empty());
    }

    #[test]
    fn test_diff_text_shows_changes() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        std::fs::write(dir.path().join("a.rs"), "fn a() {}\n").unwrap();
        commit_all(&repo, "initial");

        std::fs::write(dir.path().join("a.rs"), "fn a() { run() }\n").unwrap();

        let git = GitRepo::open(dir.path()).unwrap();
        let diff = git.diff_text("HEAD", Some(Path::new("a.rs"))).unwrap();
        assert!(diff.contains("-fn a() {}"));
        assert!(diff.contains("+fn a() { run() }"));
    }

    #[test]
    fn test_diff_text_unknown_ref() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        std::fs::write(dir.path().join("a.rs"), "fn a() {}\n").unwrap();
        commit_all(&repo, "initial");

        let git = GitRepo::open(dir.path()).unwrap();
        let err = git.diff_text("no-such-ref", None).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_open_non_git_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = GitRepo::open(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
