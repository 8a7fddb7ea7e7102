//! Commit history queries using libgit2
//!
//! Counts commits and reads commit timestamps from a working tree using the
//! git2 crate (Rust bindings to libgit2). Used by the commit-based checks.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, TimeZone};
use git2::{Commit, Oid, Repository, Sort};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Read-only view over one repository's history.
pub struct GitHistory {
    repo: Repository,
}

impl GitHistory {
    /// Open the repository rooted exactly at `path`.
    ///
    /// Unlike discovery, this never climbs into an enclosing repository, so a
    /// missing working tree can't be mistaken for its parent.
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::open(path)
            .with_context(|| format!("Failed to open git repository at {:?}", path))?;
        debug!("Opened git repository at {:?}", repo.path());
        Ok(Self { repo })
    }

    /// Number of commits reachable from any reference (`rev-list --all`).
    pub fn count_commits_all(&self) -> Result<usize> {
        let mut starts: HashSet<Oid> = HashSet::new();

        if let Ok(head) = self.repo.head() {
            if let Ok(commit) = head.peel_to_commit() {
                starts.insert(commit.id());
            }
        }

        for reference in self.repo.references().context("Failed to list references")? {
            let reference = reference.context("Failed to read reference")?;
            if let Ok(commit) = reference.peel_to_commit() {
                starts.insert(commit.id());
            }
        }

        self.count_from(starts)
    }

    /// Number of commits reachable from HEAD (`rev-list HEAD`).
    pub fn count_commits_head(&self) -> Result<usize> {
        let head = self.head_commit()?;
        self.count_from([head.id()])
    }

    /// Committer timestamp of the HEAD commit, in the committer's offset.
    pub fn last_commit_time(&self) -> Result<DateTime<FixedOffset>> {
        let head = self.head_commit()?;
        commit_time(&head).context("HEAD commit has an invalid timestamp")
    }

    /// Committer timestamps of every commit reachable from HEAD, newest first.
    pub fn commit_times(&self) -> Result<Vec<DateTime<FixedOffset>>> {
        let head = self.head_commit()?;
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(head.id())?;
        revwalk.set_sorting(Sort::TIME)?;

        let mut times = Vec::new();
        for oid in revwalk {
            let commit = self.repo.find_commit(oid?)?;
            if let Some(time) = commit_time(&commit) {
                times.push(time);
            }
        }
        Ok(times)
    }

    fn head_commit(&self) -> Result<Commit<'_>> {
        self.repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .context("Repository has no HEAD commit")
    }

    fn count_from(&self, starts: impl IntoIterator<Item = Oid>) -> Result<usize> {
        let mut revwalk = self.repo.revwalk()?;
        let mut any = false;
        for oid in starts {
            revwalk.push(oid)?;
            any = true;
        }
        if !any {
            return Ok(0);
        }

        let mut count = 0;
        for oid in revwalk {
            oid?;
            count += 1;
        }
        Ok(count)
    }
}

/// Convert a libgit2 commit time to a chrono datetime keeping its offset.
fn commit_time(commit: &Commit<'_>) -> Option<DateTime<FixedOffset>> {
    let time = commit.time();
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60)?;
    offset.timestamp_opt(time.seconds(), 0).single()
}
