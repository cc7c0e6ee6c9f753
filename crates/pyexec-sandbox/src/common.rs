//! Common process utilities: timeouts, spawning with captured output, deadline waits.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Result, SandboxError};

// ============================================================
// Timeouts (Single Source of Truth)
// ============================================================

/// Default script timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = pyexec_core::config::schema::DEFAULT_TIMEOUT_SECS;

/// Package installation timeout; resolution and downloads dominate, so it is
/// independent of script timeouts
pub const PACKAGE_INSTALL_TIMEOUT_SECS: u64 = 300;

/// Package listing timeout
pub const PACKAGE_LIST_TIMEOUT_SECS: u64 = 30;

/// `python --version` timeout
pub const VERSION_QUERY_TIMEOUT_SECS: u64 = 10;

/// How often a running child is polled for exit
pub const POLL_INTERVAL_MS: u64 = 20;

/// How a waited-on process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The process exited on its own before the deadline.
    Exited {
        stdout: String,
        stderr: String,
        code: i32,
    },
    /// The deadline passed; the process (group) was killed and its output discarded.
    TimedOut,
}

/// Spawn `cmd` with stdout/stderr piped and stdin closed, then wait for it
/// under `timeout`.
///
/// Stdin is closed so that scripts calling `input()` see EOF instead of reading
/// from our own stdin, which carries the MCP protocol in server mode.
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<WaitOutcome> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // Own process group so that a timeout also takes down anything the script forked.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let program = cmd.get_program().to_string_lossy().to_string();
    let mut child = cmd
        .spawn()
        .map_err(|source| SandboxError::Spawn { program, source })?;
    Ok(wait_with_timeout(&mut child, timeout)?)
}

/// Wait for child process with a wall-clock deadline.
///
/// Reads stdout/stderr in background threads while the process runs.
/// Without this, a child writing large output (>64KB pipe buffer) would block
/// on write, and we'd deadlock waiting for it to exit.
///
/// The deadline covers output collection too: a background process that
/// inherited the pipes keeps them open after the child exits, so hitting the
/// deadline there kills the group and reports a timeout. Reader threads are
/// never joined; they end once the last pipe writer is gone.
pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> io::Result<WaitOutcome> {
    let deadline = Instant::now() + timeout;
    let check_interval = Duration::from_millis(POLL_INTERVAL_MS);

    let (tx, rx) = mpsc::channel();
    let mut pending = 0;
    if let Some(stdout) = child.stdout.take() {
        spawn_reader(Stream::Stdout, stdout, tx.clone());
        pending += 1;
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_reader(Stream::Stderr, stderr, tx.clone());
        pending += 1;
    }
    drop(tx);

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                return match collect_output(&rx, pending, deadline) {
                    Some((stdout, stderr)) => Ok(WaitOutcome::Exited {
                        stdout,
                        stderr,
                        code: exit_code(status),
                    }),
                    None => {
                        tracing::debug!("Output pipes still open at deadline");
                        kill_tree(child);
                        Ok(WaitOutcome::TimedOut)
                    }
                };
            }
            Ok(None) => {}
            Err(e) => {
                kill_tree(child);
                return Err(e);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            kill_tree(child);
            return Ok(WaitOutcome::TimedOut);
        }

        thread::sleep(check_interval.min(deadline - now));
    }
}

enum Stream {
    Stdout,
    Stderr,
}

fn spawn_reader<R: Read + Send + 'static>(
    stream: Stream,
    mut reader: R,
    tx: Sender<(Stream, String)>,
) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        let _ = tx.send((stream, String::from_utf8_lossy(&buf).into_owned()));
    });
}

/// Receive `pending` reader results before `deadline`; `None` if it passes first.
fn collect_output(
    rx: &Receiver<(Stream, String)>,
    mut pending: usize,
    deadline: Instant,
) -> Option<(String, String)> {
    let mut stdout = String::new();
    let mut stderr = String::new();
    while pending > 0 {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((Stream::Stdout, s)) => stdout = s,
            Ok((Stream::Stderr, s)) => stderr = s,
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => break,
        }
        pending -= 1;
    }
    Some((stdout, stderr))
}

/// Kill the child (and on Unix its whole process group), then reap it.
///
/// Also used after the child was reaped: its pid stays the group id while any
/// group member is alive.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        if let Ok(pgid) = i32::try_from(child.id()) {
            let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Exit code of a finished process. A process killed by signal N reports -N,
/// matching how Python's `subprocess` reports it.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// Seconds for messages: `1` for whole seconds, `0.5` otherwise.
pub fn format_secs(timeout: Duration) -> String {
    let secs = timeout.as_secs_f64();
    format!("{}", secs)
}
