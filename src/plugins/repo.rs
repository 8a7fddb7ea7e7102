//! Built-in repository checks
//!
//! Each check grades one working tree in [0, 1]. Git failures inside a check
//! are logged and graded 0 rather than propagated.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

use super::{parse_params, Plugin, RepoCheck};
use crate::error::{GraderError, GraderResult};
use crate::git::GitHistory;
use crate::models::Params;
use crate::registry::User;

/// Parse params or log and fall back to a zero grade.
macro_rules! params_or_zero {
    ($plugin:expr, $ty:ty, $params:expr) => {
        match parse_params::<$ty>($plugin, $params) {
            Ok(p) => p,
            Err(e) => {
                warn!("{}", e);
                return 0.0;
            }
        }
    };
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MinCommitsParams {
    minimum: u64,
}

/// Minimum number of commits across all references
pub struct MinCommits;

impl Plugin for MinCommits {
    fn name(&self) -> &str {
        "min_commits"
    }

    fn doc(&self) -> &str {
        "Check if repository has a minimum number of commits.\n\
         Parameters: `minimum` (integer). Counts commits reachable from any reference."
    }
}

impl RepoCheck for MinCommits {
    fn validate(&self, params: &Params) -> GraderResult<()> {
        parse_params::<MinCommitsParams>(self.name(), params).map(|_| ())
    }

    fn assess(&self, user: &User, repo_path: &Path, params: &Params) -> f64 {
        let p = params_or_zero!(self.name(), MinCommitsParams, params);

        let count = match GitHistory::open(repo_path).and_then(|h| h.count_commits_all()) {
            Ok(count) => count,
            Err(e) => {
                warn!("min_commits: cannot read {:?} for user {}: {:#}", repo_path, user.id, e);
                return 0.0;
            }
        };
        debug!("User {} has {} commits in {:?}", user.id, count, repo_path);

        if count as u64 >= p.minimum {
            1.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DateIntervalParams {
    start_date: String,
    end_date: String,
    #[serde(default)]
    strict: Option<bool>,
}

/// Commits made within a date interval
pub struct CommitDateInterval;

impl Plugin for CommitDateInterval {
    fn name(&self) -> &str {
        "commit_date_interval"
    }

    fn doc(&self) -> &str {
        "Check if commits were performed on the specified date interval.\n\
         Parameters: `start_date`, `end_date`, optional `strict`. Without `strict` only the \
         last commit is checked. `strict: true` requires every commit inside the interval; \
         `strict: false` grades the fraction of commits inside it."
    }
}

impl RepoCheck for CommitDateInterval {
    fn validate(&self, params: &Params) -> GraderResult<()> {
        let p = parse_params::<DateIntervalParams>(self.name(), params)?;
        let utc = FixedOffset::east_opt(0).ok_or_else(|| invalid(self.name(), "bad offset"))?;
        for raw in [&p.start_date, &p.end_date] {
            if parse_datetime(raw, utc).is_none() {
                return Err(invalid(self.name(), &format!("unrecognized date {:?}", raw)));
            }
        }
        Ok(())
    }

    fn assess(&self, user: &User, repo_path: &Path, params: &Params) -> f64 {
        let p = params_or_zero!(self.name(), DateIntervalParams, params);

        let history = match GitHistory::open(repo_path) {
            Ok(h) => h,
            Err(e) => {
                warn!("commit_date_interval: {:#}", e);
                return 0.0;
            }
        };

        let times = match p.strict {
            None => history.last_commit_time().map(|t| vec![t]),
            Some(_) => history.commit_times(),
        };
        let times = match times {
            Ok(times) if !times.is_empty() => times,
            Ok(_) => return 0.0,
            Err(e) => {
                debug!("commit_date_interval: user {}: {:#}", user.id, e);
                return 0.0;
            }
        };

        let inside = times
            .iter()
            .filter(|t| within(t, &p.start_date, &p.end_date))
            .count();

        match p.strict {
            Some(false) => inside as f64 / times.len() as f64,
            _ if inside == times.len() => 1.0,
            _ => 0.0,
        }
    }
}

/// Strictly inside `(start, end)`; naive bounds adopt the commit's offset.
fn within(time: &DateTime<FixedOffset>, start: &str, end: &str) -> bool {
    let offset = *time.offset();
    match (parse_datetime(start, offset), parse_datetime(end, offset)) {
        (Some(start), Some(end)) => start < *time && *time < end,
        _ => false,
    }
}

/// Parse RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`.
pub(crate) fn parse_datetime(raw: &str, default_offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }

    let naive = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    default_offset.from_local_datetime(&naive).single()
}

fn invalid(plugin: &str, reason: &str) -> GraderError {
    GraderError::InvalidParams {
        plugin: plugin.to_string(),
        reason: reason.to_string(),
    }
}

/// Always 1 for a fetched repository
pub struct RepoExists;

impl Plugin for RepoExists {
    fn name(&self) -> &str {
        "repo_exists"
    }

    fn doc(&self) -> &str {
        "Check if a repository exists (always returns 1)."
    }
}

impl RepoCheck for RepoExists {
    fn assess(&self, _user: &User, _repo_path: &Path, _params: &Params) -> f64 {
        1.0
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilesExistParams {
    filenames: Vec<String>,
    #[serde(default)]
    strict: bool,
}

/// Files or folders present in the working tree
pub struct FilesExist;

impl Plugin for FilesExist {
    fn name(&self) -> &str {
        "files_exist"
    }

    fn doc(&self) -> &str {
        "Check if the files or folders exist.\n\
         Parameters: `filenames` (list), optional `strict`. Grades the fraction found, \
         or 0 unless all exist when `strict` is set."
    }
}

impl RepoCheck for FilesExist {
    fn validate(&self, params: &Params) -> GraderResult<()> {
        let p = parse_params::<FilesExistParams>(self.name(), params)?;
        if p.filenames.is_empty() {
            return Err(invalid(self.name(), "`filenames` must not be empty"));
        }
        Ok(())
    }

    fn assess(&self, _user: &User, repo_path: &Path, params: &Params) -> f64 {
        let p = params_or_zero!(self.name(), FilesExistParams, params);
        if p.filenames.is_empty() {
            return 0.0;
        }

        let found = p
            .filenames
            .iter()
            .filter(|f| repo_path.join(f).exists())
            .count();

        if p.strict {
            if found == p.filenames.len() {
                1.0
            } else {
                0.0
            }
        } else {
            found as f64 / p.filenames.len() as f64
        }
    }
}
