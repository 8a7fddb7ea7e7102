//! Repository registry: users, their base addresses and fetched repositories
//!
//! The registry is built from a roster by `fetch`, persisted as YAML in the
//! assessment folder, and only read afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;

use crate::config::GraderConfig;
use crate::error::{GraderError, GraderResult};
use crate::paths;

/// Kind of repository base address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlType {
    File,
    Http,
    Https,
}

/// A roster entry and the repositories fetched for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Validated base address, empty when validation failed
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub url_type: Option<UrlType>,
    /// Logical repository name → local working tree
    #[serde(default)]
    pub repos: BTreeMap<String, String>,
}

impl User {
    /// Create a user, validating the repository base address.
    ///
    /// `http`/`https` addresses must be well-formed URLs with a host. Other
    /// addresses (`file://` or plain paths) must name an existing directory.
    pub fn new(id: impl Into<String>, email: Option<String>, raw_url: &str) -> Self {
        let id = id.into();
        let (url, url_type) = match validate_base_url(raw_url) {
            Some(valid) => valid,
            None => {
                warn!("User {} has an invalid repository URL: {:?}", id, raw_url);
                (String::new(), None)
            }
        };

        Self {
            id,
            email,
            url,
            url_type,
            repos: BTreeMap::new(),
        }
    }

    pub fn has_valid_url(&self) -> bool {
        !self.url.is_empty() && self.url_type.is_some()
    }

    /// Full address of one of this user's repositories.
    pub fn repo_url(&self, repo_name: &str) -> GraderResult<String> {
        match self.url_type {
            Some(UrlType::File) if self.has_valid_url() => {
                Ok(Path::new(&self.url).join(repo_name).to_string_lossy().into_owned())
            }
            Some(UrlType::Http | UrlType::Https) if self.has_valid_url() => {
                let mut url =
                    Url::parse(&self.url).map_err(|_| GraderError::InvalidUrl(self.id.clone()))?;
                url.path_segments_mut()
                    .map_err(|_| GraderError::InvalidUrl(self.id.clone()))?
                    .pop_if_empty()
                    .push(repo_name);
                Ok(url.to_string())
            }
            _ => Err(GraderError::InvalidUrl(self.id.clone())),
        }
    }

    pub fn add_repo(&mut self, repo_name: impl Into<String>, local_path: &Path) {
        self.repos
            .insert(repo_name.into(), local_path.to_string_lossy().into_owned());
    }

    pub fn repo_path(&self, repo_name: &str) -> Option<&Path> {
        self.repos.get(repo_name).map(Path::new)
    }

    pub fn repo_count(&self) -> usize {
        self.repos.len()
    }
}

fn validate_base_url(raw: &str) -> Option<(String, Option<UrlType>)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(raw) {
        let url_type = match url.scheme() {
            "http" => Some(UrlType::Http),
            "https" => Some(UrlType::Https),
            "file" => {
                let path = url.to_file_path().ok()?;
                return path
                    .is_dir()
                    .then(|| (path.to_string_lossy().into_owned(), Some(UrlType::File)));
            }
            // Windows drive letters parse as a one-letter scheme
            scheme if scheme.len() == 1 => None,
            _ => return None,
        };
        if let Some(url_type) = url_type {
            return url.has_host().then(|| (raw.to_string(), Some(url_type)));
        }
    }

    let path = Path::new(raw);
    path.is_dir()
        .then(|| (path.to_string_lossy().into_owned(), Some(UrlType::File)))
}

/// Ordered collection of users
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    pub users: Vec<User>,
}

impl Registry {
    pub fn new(users: Vec<User>) -> Self {
        Self { users }
    }

    /// Load a persisted registry artifact.
    pub fn load(path: &Path) -> GraderResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Persist the registry, replacing any previous artifact.
    pub fn save(&self, path: &Path) -> GraderResult<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        debug!("Saved registry with {} users to {:?}", self.users.len(), path);
        Ok(())
    }

    pub fn valid_url_count(&self) -> usize {
        self.users.iter().filter(|u| u.has_valid_url()).count()
    }

    pub fn repo_count(&self) -> usize {
        self.users.iter().map(User::repo_count).sum()
    }

    /// Load a roster: CSV when the file ends in `.csv`, otherwise the
    /// whitespace format (`id email url` per line, `#` comments).
    pub fn load_roster(path: &Path, config: &GraderConfig) -> GraderResult<Self> {
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);

        let users = if is_csv {
            load_csv_roster(path, config)?
        } else {
            parse_plain_roster(path, &fs::read_to_string(path)?)?
        };
        check_unique_folders(path, &users)?;

        debug!("Loaded {} users from roster {:?}", users.len(), path);
        Ok(Self::new(users))
    }
}

fn roster_error(path: &Path, reason: impl Into<String>) -> GraderError {
    GraderError::Roster {
        path: PathBuf::from(path),
        reason: reason.into(),
    }
}

/// Reject rosters where two ids would share a working-tree folder.
fn check_unique_folders(path: &Path, users: &[User]) -> GraderResult<()> {
    let mut folders: HashMap<String, &str> = HashMap::new();
    for user in users {
        if let Some(other) = folders.insert(paths::path_component(&user.id), &user.id) {
            return Err(roster_error(
                path,
                format!(
                    "ids {:?} and {:?} map to the same repository folder",
                    other, user.id
                ),
            ));
        }
    }
    Ok(())
}

fn parse_plain_roster(path: &Path, content: &str) -> GraderResult<Vec<User>> {
    let mut users = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(roster_error(
                path,
                format!("syntax error in line {}: {:?}", idx + 1, line),
            ));
        }

        users.push(User::new(fields[0], Some(fields[1].to_string()), fields[2]));
    }

    Ok(users)
}

fn load_csv_roster(path: &Path, config: &GraderConfig) -> GraderResult<Vec<User>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| roster_error(path, e.to_string()))?;
    let headers = reader
        .headers()
        .map_err(|e| roster_error(path, e.to_string()))?
        .clone();

    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let id_col = column(config.id_column()).ok_or_else(|| {
        roster_error(
            path,
            format!("missing required `{}` column", config.id_column()),
        )
    })?;
    let base_col = column(config.repo_base_column()).ok_or_else(|| {
        roster_error(
            path,
            format!("missing required `{}` column", config.repo_base_column()),
        )
    })?;
    let email_col = column(config.email_column());

    let mut users = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| roster_error(path, e.to_string()))?;
        let id = record.get(id_col).unwrap_or("").trim();
        if id.is_empty() {
            continue;
        }
        let base = record.get(base_col).unwrap_or("");
        let email = email_col
            .and_then(|c| record.get(c))
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(String::from);
        users.push(User::new(id, email, base));
    }

    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_http_url_is_valid() {
        let user = User::new("42", None, "https://github.com/someone");
        assert!(user.has_valid_url());
        assert_eq!(user.url_type, Some(UrlType::Https));
        assert_eq!(
            user.repo_url("hw1").unwrap(),
            "https://github.com/someone/hw1"
        );
    }

    #[test]
    fn test_trailing_slash_is_not_doubled() {
        let user = User::new("42", None, "http://example.org/git/");
        assert_eq!(user.repo_url("hw1").unwrap(), "http://example.org/git/hw1");
    }

    #[test]
    fn test_local_folder_is_file_url() {
        let dir = TempDir::new().unwrap();
        let user = User::new("7", None, dir.path().to_str().unwrap());
        assert_eq!(user.url_type, Some(UrlType::File));
        assert_eq!(
            PathBuf::from(user.repo_url("hw1").unwrap()),
            dir.path().join("hw1")
        );
    }

    #[test]
    fn test_missing_folder_is_invalid() {
        let user = User::new("7", None, "/definitely/not/here/egrader");
        assert!(!user.has_valid_url());
        assert!(matches!(
            user.repo_url("hw1"),
            Err(GraderError::InvalidUrl(id)) if id == "7"
        ));
    }

    #[test]
    fn test_unknown_scheme_is_invalid() {
        assert!(!User::new("1", None, "ftp://example.org/x").has_valid_url());
        assert!(!User::new("1", None, "").has_valid_url());
    }

    #[test]
    fn test_plain_roster_skips_comments() {
        let content = "# id email url\n\n1 a@x.org https://git.example.org/a\n2 b@x.org https://git.example.org/b\n";
        let users = parse_plain_roster(Path::new("roster.txt"), content).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[1].id, "2");
        assert_eq!(users[1].email.as_deref(), Some("b@x.org"));
    }

    #[test]
    fn test_plain_roster_reports_bad_line() {
        let content = "1 a@x.org https://git.example.org/a\n2 b@x.org\n";
        let err = parse_plain_roster(Path::new("roster.txt"), content).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_roster_rejects_colliding_folders() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("students.txt");
        fs::write(
            &path,
            "a/b a@example.com https://git.example.org/a\na_b b@example.com https://git.example.org/b\n",
        )
        .unwrap();

        let err = Registry::load_roster(&path, &GraderConfig::default()).unwrap_err();
        assert!(matches!(err, GraderError::Roster { .. }));
        assert!(err.to_string().contains("same repository folder"));
    }

    #[test]
    fn test_roster_rejects_repeated_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("students.txt");
        fs::write(
            &path,
            "42 a@example.com https://git.example.org/a\n42 b@example.com https://git.example.org/b\n",
        )
        .unwrap();

        assert!(Registry::load_roster(&path, &GraderConfig::default()).is_err());
    }

    #[test]
    fn test_csv_roster_requires_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.csv");
        fs::write(&path, "id,name\n1,Ana\n").unwrap();

        let err = Registry::load_roster(&path, &GraderConfig::default()).unwrap_err();
        assert!(err.to_string().contains("repo_base"));
    }

    #[test]
    fn test_csv_roster_loads_users() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.csv");
        fs::write(
            &path,
            "id,email,repo_base\n1,a@x.org,https://git.example.org/a\n2,,https://git.example.org/b\n",
        )
        .unwrap();

        let registry = Registry::load_roster(&path, &GraderConfig::default()).unwrap();
        assert_eq!(registry.users.len(), 2);
        assert_eq!(registry.users[0].email.as_deref(), Some("a@x.org"));
        assert_eq!(registry.users[1].email, None);
        assert_eq!(registry.valid_url_count(), 2);
    }

    #[test]
    fn test_registry_yaml_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("validated_git_urls.yml");

        let mut user = User::new("42", None, "https://git.example.org/u42");
        user.add_repo("hw1", Path::new("/tmp/out/student_repos/42/hw1"));
        let registry = Registry::new(vec![user]);
        registry.save(&path).unwrap();

        let loaded = Registry::load(&path).unwrap();
        assert_eq!(loaded, registry);
        assert_eq!(loaded.repo_count(), 1);
    }
}
