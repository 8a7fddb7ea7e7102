//! End-to-end tests driving the `egrader` binary
//!
//! Each test builds a throwaway "forge" directory holding real Git
//! repositories, points a roster at it with plain paths, and runs
//! fetch → assess → report in a temp working directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use git2::{Repository, Signature, Time};
use tempfile::TempDir;

fn egrader_bin() -> &'static str {
    env!("CARGO_BIN_EXE_egrader")
}

fn run(cwd: &Path, args: &[&str]) -> Output {
    Command::new(egrader_bin())
        .args(args)
        .current_dir(cwd)
        .env_remove("EGRADER_LOG_LEVEL")
        .env_remove("EGRADER_DEFAULT_REPORT")
        .output()
        .expect("failed to run egrader")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Create `<base>/<name>` with `n` commits an hour apart.
fn create_repo(base: &Path, name: &str, n: usize) -> PathBuf {
    let path = base.join(name);
    fs::create_dir_all(&path).unwrap();
    let repo = Repository::init(&path).unwrap();

    for i in 0..n {
        let file = format!("file{}.txt", i);
        fs::write(path.join(&file), format!("content {}", i)).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(&file)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

        let time = Time::new(1_700_000_000 + 3600 * i as i64, 0);
        let sig = Signature::new("Student", "student@example.com", &time).unwrap();
        let parents: Vec<git2::Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, &format!("commit {}", i), &tree, &parent_refs)
            .unwrap();
    }

    path
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Two students: `s1` with 5 commits in hw1, `s2` with 1 commit.
    fn new(rules: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let forge = dir.path().join("forge");
        create_repo(&forge.join("s1"), "hw1", 5);
        create_repo(&forge.join("s2"), "hw1", 1);

        fs::write(
            dir.path().join("students.txt"),
            format!(
                "# id email base\ns1 s1@example.com {}\ns2 s2@example.com {}\n",
                forge.join("s1").display(),
                forge.join("s2").display()
            ),
        )
        .unwrap();
        fs::write(dir.path().join("rules.yml"), rules).unwrap();

        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn folder(&self) -> PathBuf {
        self.path().join("out_rules")
    }

    fn run(&self, args: &[&str]) -> Output {
        run(self.path(), args)
    }
}

const MIN_COMMITS_RULES: &str = r#"
- repo: hw1
  weight: 1.0
  assessments:
    - name: min_commits
      weight: 1.0
      params:
        minimum: 3
"#;

#[test]
fn test_fetch_assess_report_scenario() {
    let ws = Workspace::new(MIN_COMMITS_RULES);

    let fetch = ws.run(&["fetch", "students.txt", "rules.yml"]);
    assert!(fetch.status.success(), "fetch failed: {}", stderr(&fetch));
    assert!(stdout(&fetch).contains("Fetched 2 repositories from 2 students"));
    assert!(ws.folder().join("validated_git_urls.yml").exists());
    assert!(ws.folder().join("student_repos/s1/hw1/.git").exists());

    let assess = ws.run(&["assess", "rules.yml"]);
    assert!(assess.status.success(), "assess failed: {}", stderr(&assess));
    assert!(stdout(&assess).contains("Performed 2 assessments for 2 students"));

    let report = ws.run(&["report", "out_rules", "tsv"]);
    assert!(report.status.success(), "report failed: {}", stderr(&report));
    assert_eq!(stdout(&report), "student_id\tgrade\ns1\t1\ns2\t0\n");
}

#[test]
fn test_fetch_stops_on_existing_folder() {
    let ws = Workspace::new(MIN_COMMITS_RULES);
    assert!(ws.run(&["fetch", "students.txt", "rules.yml"]).status.success());

    let again = ws.run(&["fetch", "students.txt", "rules.yml"]);
    assert_eq!(again.status.code(), Some(1));
    assert!(stderr(&again).contains("already exists"));

    let update = ws.run(&["fetch", "-e", "update", "students.txt", "rules.yml"]);
    assert!(update.status.success(), "update failed: {}", stderr(&update));
}

#[test]
fn test_rerun_produces_identical_result() {
    let ws = Workspace::new(MIN_COMMITS_RULES);
    assert!(ws.run(&["fetch", "students.txt", "rules.yml"]).status.success());

    assert!(ws.run(&["assess", "rules.yml"]).status.success());
    let first = fs::read(ws.folder().join("assessed_students.yml")).unwrap();

    assert!(ws.run(&["assess", "--parallel", "rules.yml"]).status.success());
    let second = fs::read(ws.folder().join("assessed_students.yml")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_missing_plugin_fails_without_artifact() {
    let ws = Workspace::new(
        "- repo: hw1\n  weight: 1.0\n  assessments:\n    - name: no_such_check\n      weight: 1.0\n",
    );
    assert!(ws.run(&["fetch", "students.txt", "rules.yml"]).status.success());

    let assess = ws.run(&["assess", "rules.yml"]);
    assert_eq!(assess.status.code(), Some(1));
    assert!(stderr(&assess).contains("Plugin(s) not found in group 'repo-check': no_such_check"));
    assert!(!ws.folder().join("assessed_students.yml").exists());
}

#[test]
fn test_assess_without_fetch_reports_missing_file() {
    let ws = Workspace::new(MIN_COMMITS_RULES);

    let assess = ws.run(&["assess", "rules.yml"]);
    assert_eq!(assess.status.code(), Some(1));
    assert!(stderr(&assess).contains("out_rules"));
}

#[test]
fn test_markdown_report_to_files() {
    let ws = Workspace::new(MIN_COMMITS_RULES);
    assert!(ws.run(&["fetch", "students.txt", "rules.yml"]).status.success());
    assert!(ws.run(&["assess", "rules.yml"]).status.success());

    let report = ws.run(&["report", "out_rules", "markdown", "-f"]);
    assert!(report.status.success(), "report failed: {}", stderr(&report));
    assert!(stdout(&report).contains("Assessment report for student s1 saved at"));

    let md = fs::read_to_string(ws.folder().join("reports_md/s1.md")).unwrap();
    assert!(md.contains("min_commits"));
}

#[test]
fn test_report_rejects_unknown_args() {
    let ws = Workspace::new(MIN_COMMITS_RULES);
    assert!(ws.run(&["fetch", "students.txt", "rules.yml"]).status.success());
    assert!(ws.run(&["assess", "rules.yml"]).status.success());

    let report = ws.run(&["report", "out_rules", "basic", "--bogus"]);
    assert_eq!(report.status.code(), Some(1));
    assert!(stderr(&report).contains("Invalid arguments"));
}

#[test]
fn test_plugins_listing() {
    let dir = TempDir::new().unwrap();
    let output = run(dir.path(), &["plugins"]);
    assert!(output.status.success());

    let text = stdout(&output);
    for name in [
        "min_commits",
        "commit_date_interval",
        "repo_exists",
        "files_exist",
        "run_command",
        "more_commits_bonus",
        "basic",
        "tsv",
        "markdown",
    ] {
        assert!(text.contains(name), "missing {} in:\n{}", name, text);
    }
}

#[test]
fn test_default_report_from_local_config() {
    let ws = Workspace::new(MIN_COMMITS_RULES);
    assert!(ws.run(&["fetch", "students.txt", "rules.yml"]).status.success());
    assert!(ws.run(&["assess", "rules.yml"]).status.success());
    fs::write(ws.path().join("egrader.toml"), "default_report = \"tsv\"\n").unwrap();

    let report = ws.run(&["report", "out_rules"]);
    assert!(report.status.success(), "report failed: {}", stderr(&report));
    assert!(stdout(&report).starts_with("student_id\tgrade\n"));
}
