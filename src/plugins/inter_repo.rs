//! Built-in inter-repository checks

use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

use super::{parse_params, InterRepoCheck, Plugin};
use crate::error::GraderResult;
use crate::git::GitHistory;
use crate::models::Params;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BonusParams {
    bonuses: Vec<f64>,
}

/// Ranked bonus for the repositories with the most commits
pub struct MoreCommitsBonus;

impl Plugin for MoreCommitsBonus {
    fn name(&self) -> &str {
        "more_commits_bonus"
    }

    fn doc(&self) -> &str {
        "Add bonuses to repositories with more commits.\n\
         Parameters: `bonuses` (list). The repository with the most commits on HEAD gets the \
         first bonus, the next one the second, and so on; ties keep input order."
    }
}

impl InterRepoCheck for MoreCommitsBonus {
    fn validate(&self, params: &Params) -> GraderResult<()> {
        parse_params::<BonusParams>(self.name(), params).map(|_| ())
    }

    fn assess(&self, repo_paths: &[&Path], params: &Params) -> Vec<f64> {
        let bonuses = match parse_params::<BonusParams>(self.name(), params) {
            Ok(p) => p.bonuses,
            Err(e) => {
                warn!("{}", e);
                return vec![0.0; repo_paths.len()];
            }
        };

        let commits: Vec<usize> = repo_paths
            .iter()
            .map(|path| {
                GitHistory::open(path)
                    .and_then(|h| h.count_commits_head())
                    .unwrap_or_else(|e| {
                        debug!("more_commits_bonus: {:#}", e);
                        0
                    })
            })
            .collect();

        rank_bonuses(&commits, &bonuses)
    }
}

/// Give `bonuses[i]` to the i-th largest count, returned in input order.
///
/// Bonuses are padded with zeros or truncated to the number of counts.
/// The sort is stable, so equal counts keep their input order.
fn rank_bonuses(counts: &[usize], bonuses: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| counts[b].cmp(&counts[a]));

    let mut grades = vec![0.0; counts.len()];
    for (rank, idx) in order.into_iter().enumerate() {
        grades[idx] = bonuses.get(rank).copied().unwrap_or(0.0);
    }
    grades
}
