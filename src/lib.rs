//! egrader - Auto-grader for Git-hosted programming exercises
//!
//! A roster of users and their repository base addresses goes through three
//! stages, each leaving an artifact in the assessment folder:
//!
//! ```text
//!  roster + rules ──fetch──▶ registry ──assess──▶ result ──report──▶ text/files
//! ```
//!
//! Checks, report renderers and rules loaders are plugins resolved by name
//! through [`plugins::PluginRegistry`]; the grade arithmetic lives in
//! [`models`] and [`engine`].

pub mod assess;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod git;
pub mod loaders;
pub mod models;
pub mod paths;
pub mod plugins;
pub mod registry;
pub mod reporters;

pub use error::{GraderError, GraderResult};
