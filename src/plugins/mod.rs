//! Plugin dispatch
//!
//! Every check, renderer and rules loader is a plugin identified by a
//! `(group, name)` pair. The assessment engine never knows which concrete
//! types exist: it asks a [`Catalog`] for the names the rules mention and
//! gets trait objects back.
//!
//! ```text
//!   PluginRegistry
//!   ├── repo_checks        Catalog<dyn RepoCheck>       (user, path, params) -> f64
//!   ├── inter_repo_checks  Catalog<dyn InterRepoCheck>  (paths, params) -> Vec<f64>
//!   ├── renderers          Catalog<dyn ReportRenderer>  (ctx, result, args) -> String
//!   └── loaders            Catalog<dyn RulesLoader>     (path) -> Vec<Rule>
//! ```
//!
//! The built-in table is compiled in; `register` adds more at process start.

pub mod command;
pub mod inter_repo;
pub mod repo;

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::GraderConfig;
use crate::error::{GraderError, GraderResult};
use crate::loaders;
use crate::models::{AssessmentResult, Params, Rule};
use crate::registry::User;
use crate::reporters;

/// Description used when a plugin has no documentation
pub const NO_DESCRIPTION: &str = "Unavailable";

/// Capability group a plugin belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PluginGroup {
    RepoCheck,
    InterRepoCheck,
    ReportRenderer,
    RulesLoader,
}

impl PluginGroup {
    pub const ALL: [PluginGroup; 4] = [
        PluginGroup::RepoCheck,
        PluginGroup::InterRepoCheck,
        PluginGroup::ReportRenderer,
        PluginGroup::RulesLoader,
    ];

    /// Heading used by the `plugins` listing
    pub fn title(&self) -> &'static str {
        match self {
            PluginGroup::RepoCheck => "Repository assessment plugins",
            PluginGroup::InterRepoCheck => "Inter-repository assessment plugins",
            PluginGroup::ReportRenderer => "Reporting plugins",
            PluginGroup::RulesLoader => "Rules loader plugins",
        }
    }
}

impl fmt::Display for PluginGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginGroup::RepoCheck => write!(f, "repo-check"),
            PluginGroup::InterRepoCheck => write!(f, "inter-repo-check"),
            PluginGroup::ReportRenderer => write!(f, "report-renderer"),
            PluginGroup::RulesLoader => write!(f, "rules-loader"),
        }
    }
}

/// Identity shared by every plugin
pub trait Plugin: Send + Sync {
    /// Name the plugin is resolved by
    fn name(&self) -> &str;

    /// Documentation text; the first line doubles as the description
    fn doc(&self) -> &str;

    fn describe(&self) -> String {
        first_doc_line(self.doc()).to_string()
    }
}

/// First non-blank line of a doc string, or "Unavailable".
pub fn first_doc_line(doc: &str) -> &str {
    doc.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or(NO_DESCRIPTION)
}

/// Check run against a single repository
///
/// `assess` is infallible: a check that can't complete reports 0.
pub trait RepoCheck: Plugin {
    /// Reject malformed parameters before any repository is assessed
    fn validate(&self, _params: &Params) -> GraderResult<()> {
        Ok(())
    }

    /// Grade in [0, 1]
    fn assess(&self, user: &User, repo_path: &Path, params: &Params) -> f64;
}

/// Check comparing every user's copy of the same logical repository
pub trait InterRepoCheck: Plugin {
    fn validate(&self, _params: &Params) -> GraderResult<()> {
        Ok(())
    }

    /// One grade per input path, in input order
    fn assess(&self, repo_paths: &[&Path], params: &Params) -> Vec<f64>;
}

/// What a renderer knows besides the result itself
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub assess_folder: PathBuf,
}

/// Turns an assessment result into text (or files)
pub trait ReportRenderer: Plugin {
    fn render(
        &self,
        ctx: &ReportContext,
        result: &AssessmentResult,
        args: &[String],
    ) -> GraderResult<String>;
}

/// Parses a rules file of one format
pub trait RulesLoader: Plugin {
    /// Lowercase file extensions handled by this loader
    fn extensions(&self) -> &[&'static str];

    fn load(&self, path: &Path) -> GraderResult<Vec<Rule>>;
}

/// Deserialize check parameters into a typed struct.
pub fn parse_params<P: DeserializeOwned>(plugin: &str, params: &Params) -> GraderResult<P> {
    serde_json::from_value(Value::Object(params.clone())).map_err(|e| {
        GraderError::InvalidParams {
            plugin: plugin.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Reject arguments for renderers that take none.
pub fn check_empty_args(args: &[String]) -> GraderResult<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(GraderError::CliArgs(args.join(", ")))
    }
}

/// Plugins of one group, keyed by name
pub struct Catalog<T: ?Sized> {
    group: PluginGroup,
    entries: BTreeMap<String, Arc<T>>,
}

impl<T: ?Sized + Plugin> Catalog<T> {
    pub fn new(group: PluginGroup) -> Self {
        Self {
            group,
            entries: BTreeMap::new(),
        }
    }

    /// Add a plugin, replacing any previous one with the same name
    pub fn register(&mut self, plugin: Arc<T>) {
        self.entries.insert(plugin.name().to_string(), plugin);
    }

    /// Resolve every required name at once.
    ///
    /// All-or-nothing: when anything is missing the error lists every
    /// missing name, not just the first.
    pub fn resolve_many<I, S>(&self, required: I) -> GraderResult<BTreeMap<String, Arc<T>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let required: BTreeSet<String> = required
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();

        let missing: Vec<String> = required
            .iter()
            .filter(|name| !self.entries.contains_key(*name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(GraderError::PluginLoad {
                group: self.group,
                missing,
            });
        }

        Ok(required
            .into_iter()
            .filter_map(|name| {
                let plugin = self.entries.get(&name).cloned()?;
                Some((name, plugin))
            })
            .collect())
    }

    pub fn resolve_one(&self, name: &str) -> GraderResult<Arc<T>> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| GraderError::PluginLoad {
                group: self.group,
                missing: vec![name.to_string()],
            })
    }

    /// `(name, first doc line)` for every plugin, sorted by name
    pub fn describe_all(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(name, plugin)| (name.clone(), plugin.describe()))
            .collect()
    }
}

/// All plugin groups
pub struct PluginRegistry {
    pub repo_checks: Catalog<dyn RepoCheck>,
    pub inter_repo_checks: Catalog<dyn InterRepoCheck>,
    pub renderers: Catalog<dyn ReportRenderer>,
    pub loaders: Catalog<dyn RulesLoader>,
}

impl PluginRegistry {
    /// Registry with no plugins at all
    pub fn empty() -> Self {
        Self {
            repo_checks: Catalog::new(PluginGroup::RepoCheck),
            inter_repo_checks: Catalog::new(PluginGroup::InterRepoCheck),
            renderers: Catalog::new(PluginGroup::ReportRenderer),
            loaders: Catalog::new(PluginGroup::RulesLoader),
        }
    }

    /// Built-in plugins with default settings
    pub fn builtin() -> Self {
        Self::builtin_with(&GraderConfig::default())
    }

    /// Built-in plugins, honouring config defaults (command timeout)
    pub fn builtin_with(config: &GraderConfig) -> Self {
        let mut registry = Self::empty();

        registry.repo_checks.register(Arc::new(repo::MinCommits));
        registry.repo_checks.register(Arc::new(repo::CommitDateInterval));
        registry.repo_checks.register(Arc::new(repo::RepoExists));
        registry.repo_checks.register(Arc::new(repo::FilesExist));
        registry
            .repo_checks
            .register(Arc::new(command::RunCommand::new(config.command_timeout_secs())));

        registry
            .inter_repo_checks
            .register(Arc::new(inter_repo::MoreCommitsBonus));

        registry.renderers.register(Arc::new(reporters::BasicReport));
        registry.renderers.register(Arc::new(reporters::TsvReport));
        registry.renderers.register(Arc::new(reporters::MarkdownReport));

        registry.loaders.register(Arc::new(loaders::YamlLoader));
        registry.loaders.register(Arc::new(loaders::JsonLoader));

        registry
    }

    /// `(name, description)` entries for one group
    pub fn describe(&self, group: PluginGroup) -> Vec<(String, String)> {
        match group {
            PluginGroup::RepoCheck => self.repo_checks.describe_all(),
            PluginGroup::InterRepoCheck => self.inter_repo_checks.describe_all(),
            PluginGroup::ReportRenderer => self.renderers.describe_all(),
            PluginGroup::RulesLoader => self.loaders.describe_all(),
        }
    }

    /// Pick the rules loader for a file by its extension.
    pub fn loader_for(&self, path: &Path) -> GraderResult<Arc<dyn RulesLoader>> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let name = self
            .loaders
            .entries
            .values()
            .find(|loader| loader.extensions().iter().any(|e| *e == ext))
            .map(|loader| loader.name().to_string())
            .unwrap_or(ext);

        self.loaders.resolve_one(&name)
    }
}
