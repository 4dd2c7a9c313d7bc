//! Apply the chosen suggestion and ship it as a branch
//!
//! The rewrite is committed from a throwaway worktree and pushed; opening the
//! pull request is left to a human.

use crate::git_ops::{
    discover_repository, new_worktree_path, relative_to_repo, VersionControl, WorktreeGuard,
};
use crate::suggest::llm::fix::normalize_generated_content;
use crate::suggest::llm::Applier;
use crate::suggest::{select_eligible, sort_by_priority, SelectionPolicy, Suggestion};
use crate::workflow::{PublishProgress, PublishStage};
use anyhow::{bail, Context, Result};
use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_BRANCH: &str = "kunth-code-improvements";
pub const DEFAULT_COMMIT_MESSAGE: &str = "Apply code improvements based on suggestions";
pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_BASE_REF: &str = "origin/main";

const LOCK_FILE: &str = "kunth-publish.lock";

/// Everything about a publish that is fixed per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSettings {
    pub selection: SelectionPolicy,
    pub branch: String,
    pub commit_message: String,
    pub remote: String,
    pub base_ref: String,
    /// Write replies that had no code fence instead of refusing them
    pub accept_unstructured_reply: bool,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            selection: SelectionPolicy::default(),
            branch: DEFAULT_BRANCH.to_string(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            remote: DEFAULT_REMOTE.to_string(),
            base_ref: DEFAULT_BASE_REF.to_string(),
            accept_unstructured_reply: false,
        }
    }
}

/// How a publish run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// No suggestion was at or below the threshold
    NothingEligible,
    /// The rewrite matched the original file, so there was nothing to commit
    Unchanged { applied: Vec<Suggestion> },
    /// The branch was pushed
    Published {
        branch: String,
        applied: Vec<Suggestion>,
    },
}

impl PublishOutcome {
    /// Message for the person running the tool
    pub fn notice(&self) -> String {
        match self {
            PublishOutcome::NothingEligible => {
                "No suggestion met the priority threshold; nothing was changed.".to_string()
            }
            PublishOutcome::Unchanged { .. } => {
                "Applying the suggestion left the file unchanged; nothing was pushed.".to_string()
            }
            PublishOutcome::Published { branch, .. } => format!(
                "Changes pushed to branch '{}'. Please create a pull request manually.",
                branch
            ),
        }
    }
}

/// Exclusive per-repository lock; the branch name is fixed, so two runs
/// would collide.
pub struct PublishLock {
    file: fs::File,
}

impl PublishLock {
    pub fn acquire(git_dir: &Path) -> Result<Self> {
        let lock_path = git_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file '{}'", lock_path.display()))?;

        if let Err(err) = FileExt::try_lock_exclusive(&file) {
            if err.kind() == ErrorKind::WouldBlock
                || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
            {
                bail!(
                    "Another publish is already running for this repository (lock: {})",
                    lock_path.display()
                );
            }
            return Err(err).context("Failed to lock repository for publishing");
        }

        Ok(Self { file })
    }
}

impl Drop for PublishLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Selects, applies, and ships suggestions
pub struct Publisher {
    applier: Applier,
    vcs: Arc<dyn VersionControl>,
    repository: PathBuf,
    settings: PublishSettings,
}

impl Publisher {
    pub fn new(
        applier: Applier,
        vcs: Arc<dyn VersionControl>,
        repository: PathBuf,
        settings: PublishSettings,
    ) -> Self {
        Self {
            applier,
            vcs,
            repository,
            settings,
        }
    }

    /// Apply the eligible suggestion(s) to `file_path` and push the result.
    ///
    /// Any error names the stage the run had reached. The worktree is removed
    /// on every path.
    pub async fn publish(
        &self,
        file_path: &Path,
        suggestions: &[Suggestion],
        priority_threshold: u32,
    ) -> Result<PublishOutcome> {
        let mut progress = PublishProgress::new();
        match self
            .run(&mut progress, file_path, suggestions, priority_threshold)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                progress.fail();
                Err(err.context(format!(
                    "Publishing '{}' failed after stage '{}'",
                    file_path.display(),
                    progress.last_completed()
                )))
            }
        }
    }

    async fn run(
        &self,
        progress: &mut PublishProgress,
        file_path: &Path,
        suggestions: &[Suggestion],
        priority_threshold: u32,
    ) -> Result<PublishOutcome> {
        let location = discover_repository(&self.repository)?;
        let _lock = PublishLock::acquire(&location.common_dir)?;

        let original = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read '{}'", file_path.display()))?;
        let relative = relative_to_repo(&location.workdir, file_path)?;
        progress.advance(PublishStage::FileRead);

        let mut sorted = suggestions.to_vec();
        sort_by_priority(&mut sorted);
        let selected = select_eligible(&sorted, priority_threshold, self.settings.selection);
        if selected.is_empty() {
            info!(
                threshold = priority_threshold,
                total = suggestions.len(),
                "no suggestion at or below the priority threshold"
            );
            return Ok(PublishOutcome::NothingEligible);
        }
        info!(
            policy = self.settings.selection.label(),
            selected = selected.len(),
            "suggestions selected"
        );
        progress.advance(PublishStage::SuggestionSelected);

        let mut content = original.clone();
        for suggestion in &selected {
            info!(
                priority = suggestion.priority,
                explanation = %suggestion.explanation,
                "applying suggestion"
            );
            let extracted = self
                .applier
                .apply(&content, suggestion)
                .await
                .with_context(|| format!("Failed to apply '{}'", suggestion.explanation))?;
            if !extracted.is_fenced() && !self.settings.accept_unstructured_reply {
                bail!(
                    "The model's rewrite for '{}' contained no code block; refusing to write it into '{}' (set accept_unstructured_reply to allow)",
                    suggestion.explanation,
                    relative.display()
                );
            }
            content = extracted.into_content();
        }
        let content = normalize_generated_content(&original, content);
        if content.trim().is_empty() {
            bail!("Generated content for '{}' is empty", relative.display());
        }
        let applied: Vec<Suggestion> = selected.into_iter().cloned().collect();
        progress.advance(PublishStage::Applied);

        if content == original {
            info!("rewrite is identical to the original file");
            return Ok(PublishOutcome::Unchanged { applied });
        }

        let settings = &self.settings;
        let guard = WorktreeGuard::create(
            self.vcs.as_ref(),
            &location.workdir,
            new_worktree_path(),
            &settings.base_ref,
        )?;
        let worktree = guard.path().to_path_buf();

        self.vcs.create_branch(&worktree, &settings.branch)?;
        let target = worktree.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create '{}'", parent.display()))?;
        }
        fs::write(&target, &content)
            .with_context(|| format!("Failed to write '{}'", target.display()))?;
        self.vcs.stage_file(&worktree, &relative)?;
        progress.advance(PublishStage::Staged);

        self.vcs.commit(&worktree, &settings.commit_message)?;
        progress.advance(PublishStage::Committed);

        self.vcs
            .push(&worktree, &settings.remote, &settings.branch)?;
        progress.advance(PublishStage::Pushed);

        if let Err(err) = guard.finish() {
            warn!("branch was pushed but the worktree could not be removed: {:#}", err);
        }
        progress.advance(PublishStage::Done);

        info!(branch = %settings.branch, remote = %settings.remote, "branch pushed");
        Ok(PublishOutcome::Published {
            branch: settings.branch.clone(),
            applied,
        })
    }
}
