use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use log::warn;

use crate::error::ExecutionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Output of a finished or killed child process.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// `None` if the process was killed after timing out.
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.map(|s| s.success()).unwrap_or(false)
    }

    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        out.push_str(&self.stderr);
        out
    }
}

/// Forwards each line of `reader` until EOF. Invalid UTF-8 is replaced.
fn forward_lines<R: Read + Send + 'static>(reader: R, stream: Stream, tx: Sender<(Stream, String)>) {
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut receiver_alive = true;
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("failed to read {stream:?} of child process: {e}");
                    break;
                }
            }
            if !receiver_alive {
                continue;
            }
            if buf.last() == Some(&b'\n') {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
            }
            let line = String::from_utf8_lossy(&buf).into_owned();
            receiver_alive = tx.send((stream, line)).is_ok();
        }
    });
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().to_string()
}

/// Runs `cmd` to completion, killing it once `timeout` elapses.
///
/// Each line of output is passed to `on_line` as soon as it is read and is
/// also accumulated into the returned [`ProcessOutput`].
pub fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    mut on_line: impl FnMut(Stream, &str),
) -> Result<ProcessOutput, ExecutionError> {
    let program = program_name(&cmd);
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecutionError::Spawn { program, source })?;

    let (tx, rx) = mpsc::channel();
    if let Some(stdout) = child.stdout.take() {
        forward_lines(stdout, Stream::Stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(stderr, Stream::Stderr, tx);
    }

    let mut output = ProcessOutput::default();
    // Timeouts too large to represent as an instant never expire.
    let deadline = Instant::now().checked_add(timeout);
    loop {
        let received = match deadline {
            Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok((stream, line)) => {
                on_line(stream, &line);
                let buf = match stream {
                    Stream::Stdout => &mut output.stdout,
                    Stream::Stderr => &mut output.stderr,
                };
                buf.push_str(&line);
                buf.push('\n');
            }
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                kill(&mut child);
                output.timed_out = true;
                return Ok(output);
            }
        }
    }

    output.status = Some(child.wait()?);
    Ok(output)
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!("failed to kill process {}: {e}", child.id());
    }
    if let Err(e) = child.wait() {
        warn!("failed to reap process {}: {e}", child.id());
    }
}
