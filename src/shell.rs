//! External process execution.
//! Every `bundle`, `git`, `heroku` or `rails` invocation goes through a
//! `CommandRunner`, so tests can substitute a stub for real processes.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::Result;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// How long output is still collected after a timed out process was killed.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// The command line as it would be typed in a shell, for logs and errors.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished (or killed) process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

pub trait CommandRunner {
    /// Runs the command to completion and captures its output.
    ///
    /// # Errors
    /// * `Error::IoError` if the process could not be spawned or waited on.
    ///   A non-zero exit is reported through `CommandOutput`, not as an error.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Spawns real operating system processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut stream) = stream {
            if let Err(e) = stream.read_to_end(&mut buf) {
                log::debug!("Failed to read child output: {e}");
            }
        }
        // The receiver is gone once a timed out run stopped waiting.
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Collects a drained stream. After a timeout a descendant that escaped the
/// process group may still hold the pipe open, so waiting is bounded.
fn collect(output: &Receiver<String>, timed_out: bool) -> String {
    if timed_out {
        output.recv_timeout(DRAIN_GRACE).unwrap_or_default()
    } else {
        output.recv().unwrap_or_default()
    }
}

/// Puts the child in a process group of its own. Terminal signals such as
/// Ctrl-C then reach only roll, and a timeout can kill the whole tree.
#[cfg(unix)]
fn isolate(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_command: &mut Command) {}

/// Kills the child and every process it started.
#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pgid = Pid::from_raw(child.id() as i32);
    if let Err(e) = killpg(pgid, Signal::SIGKILL) {
        log::debug!("Failed to kill process group {pgid}: {e}, killing process only");
        if let Err(e) = child.kill() {
            log::debug!("Failed to kill timed out process: {e}");
        }
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::debug!("Failed to kill timed out process: {e}");
    }
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Option<Duration>,
) -> Result<(Option<ExitStatus>, bool)> {
    let Some(timeout) = timeout else {
        return Ok((Some(child.wait()?), false));
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((Some(status), false));
        }
        if Instant::now() >= deadline {
            kill_tree(child);
            child.wait()?;
            return Ok((None, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        isolate(&mut command);
        let mut child = command.spawn()?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let (status, timed_out) = wait_with_deadline(&mut child, spec.timeout)?;
        if timed_out {
            log::debug!("'{}' exceeded its timeout and was killed", spec.display());
        }

        Ok(CommandOutput {
            exit_code: status.and_then(|s| s.code()),
            stdout: collect(&stdout, timed_out),
            stderr: collect(&stderr, timed_out),
            timed_out,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Option<Duration>) -> CommandSpec {
        CommandSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            cwd: std::env::temp_dir(),
            timeout,
        }
    }

    #[test]
    fn captures_output_and_exit_code() {
        let output = SystemRunner.run(&sh("echo out; echo err >&2; exit 3", None)).unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert!(!output.success());
    }

    #[test]
    fn kills_process_after_timeout() {
        let started = Instant::now();
        let output =
            SystemRunner.run(&sh("exec sleep 5", Some(Duration::from_millis(100)))).unwrap();
        assert!(output.timed_out);
        assert!(!output.success());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn kills_descendants_holding_output_open() {
        let started = Instant::now();
        let output = SystemRunner
            .run(&sh("echo started; sleep 5; true", Some(Duration::from_millis(200))))
            .unwrap();
        assert!(output.timed_out);
        assert_eq!(output.exit_code, None);
        assert_eq!(output.stdout, "started\n");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn display_joins_program_and_args() {
        let spec = sh("true", None);
        assert_eq!(spec.display(), "sh -c true");
    }
}
