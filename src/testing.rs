//! Fakes for the model backend and version control used across unit tests

use crate::git_ops::VersionControl;
use crate::suggest::llm::CompletionBackend;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use tempfile::TempDir;

/// Replies with pre-recorded answers, in order, and remembers every prompt.
pub(crate) struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub(crate) fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<S, S>>,
        S: Into<String>,
    {
        Self::from_results(
            replies
                .into_iter()
                .map(|r| r.map(Into::into).map_err(Into::into))
                .collect(),
        )
    }

    pub(crate) fn from_results(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(err)) => Err(anyhow!(err)),
            None => Err(anyhow!("no scripted reply left")),
        }
    }
}

/// Records each version-control call; optionally fails one named step.
///
/// Worktrees are real directories so the publisher can write into them.
pub(crate) struct RecordingVcs {
    calls: Mutex<Vec<String>>,
    staged: Mutex<Vec<String>>,
    worktrees: Mutex<Vec<PathBuf>>,
    fail_on: Option<&'static str>,
}

impl RecordingVcs {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            staged: Mutex::new(Vec::new()),
            worktrees: Mutex::new(Vec::new()),
            fail_on: None,
        }
    }

    pub(crate) fn failing_on(step: &'static str) -> Self {
        Self {
            fail_on: Some(step),
            ..Self::new()
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// File contents as they were when staged
    pub(crate) fn staged_content(&self) -> Vec<String> {
        self.staged.lock().unwrap().clone()
    }

    /// Worktree directories that still exist on disk
    pub(crate) fn worktrees_left(&self) -> Vec<PathBuf> {
        self.worktrees
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.exists())
            .cloned()
            .collect()
    }

    fn record(&self, step: &'static str, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail_on == Some(step) {
            return Err(anyhow!("{} failed (scripted)", step));
        }
        Ok(())
    }
}

impl VersionControl for RecordingVcs {
    fn add_worktree(&self, _repo: &Path, worktree: &Path, base_ref: &str) -> Result<()> {
        self.record("add_worktree", format!("add_worktree {}", base_ref))?;
        std::fs::create_dir_all(worktree)?;
        self.worktrees.lock().unwrap().push(worktree.to_path_buf());
        Ok(())
    }

    fn create_branch(&self, _worktree: &Path, branch: &str) -> Result<()> {
        self.record("create_branch", format!("create_branch {}", branch))
    }

    fn stage_file(&self, worktree: &Path, relative: &Path) -> Result<()> {
        self.record("stage_file", format!("stage_file {}", relative.display()))?;
        let content = std::fs::read_to_string(worktree.join(relative))?;
        self.staged.lock().unwrap().push(content);
        Ok(())
    }

    fn commit(&self, _worktree: &Path, message: &str) -> Result<()> {
        self.record("commit", format!("commit {}", message))
    }

    fn push(&self, _worktree: &Path, remote: &str, branch: &str) -> Result<()> {
        self.record("push", format!("push {} {}", remote, branch))
    }

    fn remove_worktree(&self, _repo: &Path, worktree: &Path) -> Result<()> {
        self.record("remove_worktree", "remove_worktree".to_string())?;
        if worktree.exists() {
            std::fs::remove_dir_all(worktree)?;
        }
        Ok(())
    }
}

/// Run git in `dir` for test setup, panicking with its stderr on failure.
pub(crate) fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// A clone with a bare `origin`; `main` holds `app/main.py` and is pushed,
/// so `origin/main` exists. Returns (root, clone, origin).
pub(crate) fn clone_with_bare_origin() -> (TempDir, PathBuf, PathBuf) {
    let root = tempfile::tempdir().unwrap();
    let base = root.path().canonicalize().unwrap();
    let origin = base.join("origin.git");
    let clone = base.join("clone");
    std::fs::create_dir_all(&origin).unwrap();
    std::fs::create_dir_all(clone.join("app")).unwrap();

    git(&origin, &["init", "--bare", "-b", "main"]);
    git(&clone, &["init", "-b", "main"]);
    git(&clone, &["config", "user.name", "Kunth Test"]);
    git(&clone, &["config", "user.email", "kunth@test.local"]);
    git(&clone, &["config", "commit.gpgsign", "false"]);
    std::fs::write(clone.join("app/main.py"), "print('hi')\n").unwrap();
    git(&clone, &["add", "."]);
    git(&clone, &["commit", "-m", "init"]);
    git(&clone, &["remote", "add", "origin", &origin.to_string_lossy()]);
    git(&clone, &["push", "origin", "main"]);

    (root, clone, origin)
}
