//! Git access for the grader
//!
//! - `history`: commit counts and timestamps read by the checks
//! - `transport`: clone/pull used by the fetch stage
//!
//! # Example
//!
//! ```no_run
//! use egrader::git::GitHistory;
//! use std::path::Path;
//!
//! let history = GitHistory::open(Path::new("out_hw/student_repos/42/hw1")).unwrap();
//! println!("{} commits", history.count_commits_all().unwrap());
//! ```

pub mod history;
pub mod transport;

pub use history::GitHistory;
pub use transport::{Git2Transport, GitTransport};
