//! Git operations for the publish step
//!
//! Worktree, branch, stage, commit, and push, all run against an isolated
//! worktree so the caller's checkout is never touched.

use crate::util::run_command_with_timeout;
use anyhow::{anyhow, Context, Result};
use git2::Repository;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, warn};

/// Directory under the system temp dir holding worktrees
const WORKTREE_ROOT_DIR: &str = "kunth-worktrees";

/// Version-control capability used by the publisher.
///
/// Every method either completes or returns an error; callers stop at the
/// first error.
pub trait VersionControl: Send + Sync {
    /// Create a detached worktree at `worktree` checked out at `base_ref`
    fn add_worktree(&self, repo: &Path, worktree: &Path, base_ref: &str) -> Result<()>;
    /// Create (or reset) `branch` at the worktree's HEAD and check it out
    fn create_branch(&self, worktree: &Path, branch: &str) -> Result<()>;
    /// Stage one file, given relative to the worktree root
    fn stage_file(&self, worktree: &Path, relative: &Path) -> Result<()>;
    fn commit(&self, worktree: &Path, message: &str) -> Result<()>;
    fn push(&self, worktree: &Path, remote: &str, branch: &str) -> Result<()>;
    fn remove_worktree(&self, repo: &Path, worktree: &Path) -> Result<()>;
}

/// [`VersionControl`] backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    timeout: Duration,
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn run(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let label = format!("git {}", args.join(" "));
        debug!(dir = %dir.display(), "{}", label);
        let mut cmd = Command::new("git");
        cmd.current_dir(dir).args(args);
        for (k, v) in env_overrides() {
            cmd.env(k, v);
        }
        let output = run_command_with_timeout(&mut cmd, &label, self.timeout)?;

        if output.timed_out {
            return Err(anyhow!(
                "{} timed out after {}s in '{}'",
                label,
                self.timeout.as_secs(),
                dir.display()
            ));
        }

        if output.success() {
            return Ok(output.stdout);
        }

        Err(anyhow!(
            "{} failed:\nstdout:\n{}\nstderr:\n{}",
            label,
            output.stdout.trim(),
            output.stderr.trim()
        ))
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

impl VersionControl for GitCli {
    fn add_worktree(&self, repo: &Path, worktree: &Path, base_ref: &str) -> Result<()> {
        let worktree_arg = worktree.to_string_lossy();
        self.run(
            repo,
            &["worktree", "add", "--detach", &worktree_arg, base_ref],
        )
        .with_context(|| {
            format!(
                "Failed to create worktree '{}' at '{}'",
                worktree.display(),
                base_ref
            )
        })?;
        Ok(())
    }

    fn create_branch(&self, worktree: &Path, branch: &str) -> Result<()> {
        self.run(worktree, &["checkout", "-B", branch])
            .with_context(|| format!("Failed to create branch '{}'", branch))?;
        Ok(())
    }

    fn stage_file(&self, worktree: &Path, relative: &Path) -> Result<()> {
        let path_arg = relative.to_string_lossy();
        self.run(worktree, &["add", "--", &path_arg])
            .with_context(|| format!("Failed to stage '{}'", relative.display()))?;
        Ok(())
    }

    fn commit(&self, worktree: &Path, message: &str) -> Result<()> {
        self.run(worktree, &["commit", "-m", message])
            .context("Failed to commit staged changes")?;
        Ok(())
    }

    fn push(&self, worktree: &Path, remote: &str, branch: &str) -> Result<()> {
        self.run(worktree, &["push", remote, branch])
            .with_context(|| format!("Failed to push '{}' to '{}'", branch, remote))?;
        Ok(())
    }

    fn remove_worktree(&self, repo: &Path, worktree: &Path) -> Result<()> {
        let worktree_arg = worktree.to_string_lossy();
        self.run(repo, &["worktree", "remove", "--force", &worktree_arg])
            .with_context(|| format!("Failed to remove worktree '{}'", worktree.display()))?;
        Ok(())
    }
}

/// Environment for every git child: never block on an interactive prompt
pub fn env_overrides() -> Vec<(String, String)> {
    vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())]
}

/// Where a repository lives on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocation {
    /// Root of the working tree
    pub workdir: PathBuf,
    /// Git directory shared by all worktrees
    pub common_dir: PathBuf,
}

/// Find the repository containing `path`.
pub fn discover_repository(path: &Path) -> Result<RepoLocation> {
    let repo = Repository::discover(path).with_context(|| {
        format!("Failed to open repository from path '{}'", path.display())
    })?;
    let workdir = repo
        .workdir()
        .ok_or_else(|| anyhow!("Repository at '{}' is bare", path.display()))?
        .canonicalize()
        .context("Failed to resolve repository root")?;
    let common_dir = shared_git_dir(&repo)
        .canonicalize()
        .context("Failed to resolve git directory")?;
    Ok(RepoLocation {
        workdir,
        common_dir,
    })
}

/// Git directory shared by the main checkout and all linked worktrees.
///
/// A linked worktree's own git dir is `<common>/worktrees/<name>`.
fn shared_git_dir(repo: &Repository) -> PathBuf {
    let git_dir = repo.path();
    if repo.is_worktree() {
        if let Some(common) = git_dir.parent().and_then(Path::parent) {
            return common.to_path_buf();
        }
    }
    git_dir.to_path_buf()
}

/// Path of `file` relative to the repository root `workdir`.
pub fn relative_to_repo(workdir: &Path, file: &Path) -> Result<PathBuf> {
    let file = file
        .canonicalize()
        .with_context(|| format!("Failed to resolve '{}'", file.display()))?;
    file.strip_prefix(workdir)
        .map(Path::to_path_buf)
        .map_err(|_| {
            anyhow!(
                "'{}' is not inside repository '{}'",
                file.display(),
                workdir.display()
            )
        })
}

/// Whether `name` is acceptable as a local branch name
pub fn is_valid_branch_name(name: &str) -> bool {
    git2::Branch::name_is_valid(name).unwrap_or(false)
}

/// Fresh, unique location for a worktree under the system temp dir
pub fn new_worktree_path() -> PathBuf {
    std::env::temp_dir()
        .join(WORKTREE_ROOT_DIR)
        .join(uuid::Uuid::new_v4().simple().to_string())
}

/// Owns a worktree for the duration of a publish.
///
/// The worktree is removed when the guard is finished or dropped, whichever
/// comes first, so every exit path cleans up.
pub struct WorktreeGuard<'a> {
    vcs: &'a dyn VersionControl,
    repo: PathBuf,
    path: PathBuf,
    registered: bool,
    released: bool,
}

impl<'a> WorktreeGuard<'a> {
    /// Add the worktree. On failure any partially created directory is removed.
    pub fn create(
        vcs: &'a dyn VersionControl,
        repo: &Path,
        path: PathBuf,
        base_ref: &str,
    ) -> Result<Self> {
        let mut guard = Self {
            vcs,
            repo: repo.to_path_buf(),
            path,
            registered: false,
            released: false,
        };
        if let Some(parent) = guard.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create worktree root '{}'", parent.display())
            })?;
        }
        vcs.add_worktree(&guard.repo, &guard.path, base_ref)?;
        guard.registered = true;
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the worktree now and report any failure
    pub fn finish(mut self) -> Result<()> {
        self.released = true;
        self.cleanup()
    }

    fn cleanup(&mut self) -> Result<()> {
        let removed = if self.registered {
            self.vcs.remove_worktree(&self.repo, &self.path)
        } else {
            Ok(())
        };

        if self.path.exists() {
            std::fs::remove_dir_all(&self.path).with_context(|| {
                format!("Failed to delete worktree directory '{}'", self.path.display())
            })?;
        }

        removed
    }
}

impl Drop for WorktreeGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = self.cleanup() {
            warn!(
                worktree = %self.path.display(),
                "failed to clean up worktree: {:#}",
                err
            );
        }
    }
}
