//! Command-execution check
//!
//! Runs a command inside the user's working tree and grades it on exit code
//! and, optionally, on a stdout pattern.
//!
//! # Architecture
//!
//! 1. Build the command (argument list, or a shell line)
//! 2. Spawn it in its own process group, readers draining stdout/stderr on
//!    threads
//! 3. Wait for exit and for both readers against a single deadline, killing
//!    the process group once it passes
//! 4. Map the outcome to 1 or 0
//!
//! Commands run unsandboxed; the timeout is the only limit.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{parse_params, Plugin, RepoCheck};
use crate::error::{GraderError, GraderResult};
use crate::models::Params;
use crate::registry::User;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Outcome of running an external command
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Whether the process ran to completion (any exit code)
    pub completed: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub error: Option<String>,
}

impl CommandOutcome {
    pub fn finished(stdout: String, stderr: String, exit_code: i32) -> Self {
        Self {
            completed: true,
            stdout,
            stderr,
            exit_code: Some(exit_code),
            timed_out: false,
            error: None,
        }
    }

    pub fn failure(error: String) -> Self {
        Self {
            completed: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            timed_out: false,
            error: Some(error),
        }
    }

    pub fn timeout(label: &str, timeout_secs: u64) -> Self {
        Self {
            completed: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            timed_out: true,
            error: Some(format!("{} timed out after {}s", label, timeout_secs)),
        }
    }
}

/// Run a command with a timeout
///
/// One deadline covers the whole call: waiting for the process and reading
/// its output. A process that exits while a backgrounded descendant keeps
/// the pipes open still times out. On timeout the whole process group is
/// killed (Unix).
///
/// # Arguments
/// * `cmd` - Program and arguments
/// * `label` - Name used in log and error messages
/// * `timeout_secs` - Timeout in seconds (0 = no timeout)
/// * `cwd` - Working directory
/// * `env` - Additional environment variables
pub fn run_command(
    cmd: &[String],
    label: &str,
    timeout_secs: u64,
    cwd: Option<&Path>,
    env: &HashMap<String, String>,
) -> CommandOutcome {
    let Some((program, args)) = cmd.split_first() else {
        return CommandOutcome::failure("Empty command".to_string());
    };

    debug!("Running {}: {} {:?}", label, program, args);

    let mut command = Command::new(program);
    command.args(args).envs(env);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Lead a new process group so a timeout reaches descendants too
        command.process_group(0);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return CommandOutcome::failure(format!("{}: program {:?} not found", label, program));
        }
        Err(e) => return CommandOutcome::failure(format!("Failed to run {}: {}", label, e)),
    };
    let deadline = (timeout_secs > 0).then(|| Instant::now() + Duration::from_secs(timeout_secs));

    // Drain pipes concurrently so a chatty process can't block on a full pipe
    let (tx, rx) = mpsc::channel();
    let readers = [
        drain(child.stdout.take(), Stream::Stdout, &tx),
        drain(child.stderr.take(), Stream::Stderr, &tx),
    ]
    .into_iter()
    .filter(|started| *started)
    .count();
    drop(tx);

    let code = match wait_until(&mut child, deadline) {
        Ok(Some(code)) => code,
        Ok(None) => return timed_out(&mut child, label, timeout_secs),
        Err(e) => {
            kill_tree(&mut child);
            return CommandOutcome::failure(format!("Failed to wait for {}: {}", label, e));
        }
    };

    let mut stdout = String::new();
    let mut stderr = String::new();
    for _ in 0..readers {
        let received = match deadline {
            Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok((Stream::Stdout, text)) => stdout = text,
            Ok((Stream::Stderr, text)) => stderr = text,
            // Exited, but a descendant still holds the pipes open
            Err(RecvTimeoutError::Timeout) => return timed_out(&mut child, label, timeout_secs),
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    CommandOutcome::finished(stdout, stderr, code)
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Read a pipe to the end on its own thread; false if there was no pipe.
fn drain<R: Read + Send + 'static>(
    pipe: Option<R>,
    stream: Stream,
    tx: &Sender<(Stream, String)>,
) -> bool {
    let Some(mut reader) = pipe else {
        return false;
    };
    let tx = tx.clone();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        let _ = tx.send((stream, String::from_utf8_lossy(&buf).into_owned()));
    });
    true
}

/// Exit code on completion, `None` once the deadline passes.
fn wait_until(child: &mut Child, deadline: Option<Instant>) -> std::io::Result<Option<i32>> {
    let Some(deadline) = deadline else {
        return child.wait().map(|s| Some(s.code().unwrap_or(-1)));
    };

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status.code().unwrap_or(-1)));
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Ok(None);
        }
        thread::sleep(left.min(POLL_INTERVAL));
    }
}

fn timed_out(child: &mut Child, label: &str, timeout_secs: u64) -> CommandOutcome {
    kill_tree(child);
    debug!("{} timed out after {}s", label, timeout_secs);
    CommandOutcome::timeout(label, timeout_secs)
}

/// Kill the child and everything in its process group.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        // The child leads its group, so its pid is the group id
        let group = format!("-{}", child.id());
        let _ = Command::new("kill")
            .args(["-KILL", "--", group.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    let _ = child.kill();
    let _ = child.wait();
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CommandLine {
    Args(Vec<String>),
    Shell(String),
}

impl CommandLine {
    fn argv(&self) -> Vec<String> {
        match self {
            CommandLine::Args(args) => args.clone(),
            CommandLine::Shell(line) if cfg!(windows) => {
                vec!["cmd".into(), "/C".into(), line.clone()]
            }
            CommandLine::Shell(line) => vec!["sh".into(), "-c".into(), line.clone()],
        }
    }
}

fn default_exit_code() -> i32 {
    0
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RunCommandParams {
    command: CommandLine,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default = "default_exit_code")]
    exit_code: i32,
    #[serde(default)]
    stdout_pattern: Option<String>,
}

/// Run a command in the working tree
pub struct RunCommand {
    default_timeout_secs: u64,
}

impl RunCommand {
    pub fn new(default_timeout_secs: u64) -> Self {
        Self {
            default_timeout_secs,
        }
    }
}

impl Plugin for RunCommand {
    fn name(&self) -> &str {
        "run_command"
    }

    fn doc(&self) -> &str {
        "Check if a command succeeds inside the repository.\n\
         Parameters: `command` (list of arguments, or a shell line), optional `timeout_secs`, \
         `exit_code` (default 0) and `stdout_pattern` (regular expression). \
         The command runs unsandboxed with EGRADER_USER_ID and EGRADER_REPO_PATH set."
    }
}

impl RepoCheck for RunCommand {
    fn validate(&self, params: &Params) -> GraderResult<()> {
        let p = parse_params::<RunCommandParams>(self.name(), params)?;
        let invalid = |reason: String| GraderError::InvalidParams {
            plugin: self.name().to_string(),
            reason,
        };

        if p.command.argv().first().map_or(true, |prog| prog.is_empty()) {
            return Err(invalid("`command` must not be empty".to_string()));
        }
        if let Some(pattern) = &p.stdout_pattern {
            Regex::new(pattern).map_err(|e| invalid(format!("bad `stdout_pattern`: {}", e)))?;
        }
        Ok(())
    }

    fn assess(&self, user: &User, repo_path: &Path, params: &Params) -> f64 {
        let p = match parse_params::<RunCommandParams>(self.name(), params) {
            Ok(p) => p,
            Err(e) => {
                warn!("{}", e);
                return 0.0;
            }
        };

        let env = HashMap::from([
            ("EGRADER_USER_ID".to_string(), user.id.clone()),
            (
                "EGRADER_REPO_PATH".to_string(),
                repo_path.to_string_lossy().into_owned(),
            ),
        ]);
        let timeout = p.timeout_secs.unwrap_or(self.default_timeout_secs);
        let outcome = run_command(&p.command.argv(), self.name(), timeout, Some(repo_path), &env);

        if outcome.timed_out {
            warn!(
                "run_command for user {} timed out after {}s",
                user.id, timeout
            );
            return 0.0;
        }
        if !outcome.completed {
            debug!(
                "run_command for user {}: {}",
                user.id,
                outcome.error.as_deref().unwrap_or("did not complete")
            );
            return 0.0;
        }
        if outcome.exit_code != Some(p.exit_code) {
            debug!(
                "run_command for user {} exited with {:?}: {}",
                user.id,
                outcome.exit_code,
                outcome.stderr.trim()
            );
            return 0.0;
        }

        match p.stdout_pattern.as_deref().map(Regex::new) {
            None => 1.0,
            Some(Ok(re)) if re.is_match(&outcome.stdout) => 1.0,
            Some(Ok(_)) => 0.0,
            Some(Err(e)) => {
                warn!("run_command: bad stdout_pattern: {}", e);
                0.0
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn params(value: serde_json::Value) -> Params {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("params must be an object"),
        }
    }

    fn user() -> User {
        User::new("42", None, "https://git.example.org/u42")
    }

    #[test]
    fn test_run_command_captures_output() {
        let outcome = run_command(
            &["sh".into(), "-c".into(), "echo out; echo err >&2; exit 3".into()],
            "test",
            10,
            None,
            &HashMap::new(),
        );
        assert!(outcome.completed);
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stdout.trim(), "out");
        assert_eq!(outcome.stderr.trim(), "err");
    }

    #[test]
    fn test_run_command_times_out() {
        let outcome = run_command(
            &["sleep".into(), "5".into()],
            "sleeper",
            1,
            None,
            &HashMap::new(),
        );
        assert!(outcome.timed_out);
        assert!(!outcome.completed);
    }

    #[test]
    fn test_timeout_covers_backgrounded_children() {
        let start = Instant::now();
        let outcome = run_command(
            &["sh".into(), "-c".into(), "sleep 8 & echo started".into()],
            "forker",
            1,
            None,
            &HashMap::new(),
        );
        assert!(outcome.timed_out);
        assert!(!outcome.completed);
        assert!(
            start.elapsed() < Duration::from_secs(4),
            "took {:?}",
            start.elapsed()
        );
    }

    #[test]
    fn test_background_child_that_closes_pipes_completes() {
        let outcome = run_command(
            &[
                "sh".into(),
                "-c".into(),
                "sleep 2 >/dev/null 2>&1 & echo started".into(),
            ],
            "detached",
            5,
            None,
            &HashMap::new(),
        );
        assert!(outcome.completed);
        assert_eq!(outcome.stdout.trim(), "started");
    }

    #[test]
    fn test_missing_program() {
        let outcome = run_command(
            &["egrader-no-such-program".into()],
            "ghost",
            5,
            None,
            &HashMap::new(),
        );
        assert!(!outcome.completed);
        assert!(outcome.error.unwrap().contains("not found"));
    }

    #[test]
    fn test_check_runs_in_repo_with_env() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "").unwrap();

        let check = RunCommand::new(10);
        let p = params(json!({
            "command": "test -f marker && echo \"user=$EGRADER_USER_ID\"",
            "stdout_pattern": "user=42"
        }));
        assert_eq!(check.assess(&user(), dir.path(), &p), 1.0);
    }

    #[test]
    fn test_check_grades_exit_code() {
        let dir = tempdir().unwrap();
        let check = RunCommand::new(10);

        assert_eq!(check.assess(&user(), dir.path(), &params(json!({"command": ["false"]}))), 0.0);
        assert_eq!(
            check.assess(&user(), dir.path(), &params(json!({"command": ["false"], "exit_code": 1}))),
            1.0
        );
    }

    #[test]
    fn test_check_timeout_is_zero() {
        let dir = tempdir().unwrap();
        let check = RunCommand::new(10);
        let p = params(json!({"command": ["sleep", "5"], "timeout_secs": 1}));
        assert_eq!(check.assess(&user(), dir.path(), &p), 0.0);
    }

    #[test]
    fn test_check_with_lingering_child_is_zero() {
        let dir = tempdir().unwrap();
        let check = RunCommand::new(10);
        let p = params(json!({"command": "sleep 8 & echo ok", "timeout_secs": 1}));

        let start = Instant::now();
        assert_eq!(check.assess(&user(), dir.path(), &p), 0.0);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_validation() {
        let check = RunCommand::new(10);
        assert!(check.validate(&params(json!({"command": []}))).is_err());
        assert!(check
            .validate(&params(json!({"command": "true", "stdout_pattern": "("})))
            .is_err());
        assert!(check.validate(&params(json!({"command": "true"}))).is_ok());
    }
}
