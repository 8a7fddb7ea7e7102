//! Clone and update working trees
//!
//! The fetch stage only needs two operations: produce a working tree from
//! an address, or bring an existing one up to date. `GitTransport` is the
//! seam; `Git2Transport` implements it with libgit2.

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::Repository;
use std::path::Path;
use tracing::debug;

use crate::error::GraderResult;

/// Git transport operations used by `fetch`
pub trait GitTransport: Send + Sync {
    /// Clone `url` into `dest`, failing if the repository can't be reached.
    fn clone_repo(&self, url: &str, dest: &Path) -> GraderResult<()>;

    /// Fetch `origin` and fast-forward the checked-out branch.
    fn pull(&self, repo_path: &Path) -> GraderResult<()>;
}

/// libgit2-backed transport
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2Transport;

impl GitTransport for Git2Transport {
    fn clone_repo(&self, url: &str, dest: &Path) -> GraderResult<()> {
        debug!("Cloning {} into {:?}", url, dest);
        RepoBuilder::new().clone(url, dest)?;
        Ok(())
    }

    fn pull(&self, repo_path: &Path) -> GraderResult<()> {
        debug!("Pulling {:?}", repo_path);
        let repo = Repository::open(repo_path)?;

        let branch = {
            let head = repo.head()?;
            head.shorthand()
                .ok_or_else(|| git2::Error::from_str("HEAD does not name a branch"))?
                .to_string()
        };

        let mut remote = repo.find_remote("origin")?;
        remote.fetch(&[branch.as_str()], None, None)?;

        let fetch_head = repo.find_reference("FETCH_HEAD")?;
        let fetched = repo.reference_to_annotated_commit(&fetch_head)?;
        let (analysis, _) = repo.merge_analysis(&[&fetched])?;

        if analysis.is_up_to_date() {
            return Ok(());
        }
        if !analysis.is_fast_forward() {
            return Err(git2::Error::from_str("local branch has diverged from origin").into());
        }

        let refname = format!("refs/heads/{}", branch);
        let mut reference = repo.find_reference(&refname)?;
        reference.set_target(fetched.id(), "egrader: fast-forward")?;
        repo.set_head(&refname)?;
        repo.checkout_head(Some(CheckoutBuilder::default().force()))?;
        Ok(())
    }
}
