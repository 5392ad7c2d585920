//! External tool invocation with streamed output.

use crate::runner::{OutputLine, OutputStream};
use fanout_core::{Error, Result};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, timeout};
use tracing::{debug, info, warn};

/// A fully rendered command line.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Added on top of the inherited environment.
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl Invocation {
    /// Spawn the process and stream every output line to `output_tx`.
    ///
    /// A process still running after `limit` is killed and reported as
    /// [`Error::Timeout`]. A program that cannot be started is an
    /// [`Error::ToolInvocation`] without exit code.
    pub async fn execute(
        &self,
        limit: Duration,
        output_tx: mpsc::Sender<OutputLine>,
    ) -> Result<ProcessOutcome> {
        let start = Instant::now();
        info!(program = %self.program, args = ?self.args, "Starting tool");

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|e| {
            let message = match e.kind() {
                std::io::ErrorKind::NotFound => format!("program '{}' not found", self.program),
                _ => format!("failed to start '{}': {e}", self.program),
            };
            Error::ToolInvocation {
                exit_code: None,
                message,
                log_tail: String::new(),
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("child stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("child stderr not captured".to_string()))?;
        let mut stdout_handle = forward_lines(stdout, OutputStream::Stdout, output_tx.clone());
        let mut stderr_handle = forward_lines(stderr, OutputStream::Stderr, output_tx);

        let status = match timeout(limit, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!(
                    program = %self.program,
                    timeout_secs = limit.as_secs(),
                    "Tool timed out, killing process"
                );
                let _ = child.kill().await;
                // Grandchildren may still hold the pipes open.
                stdout_handle.abort();
                stderr_handle.abort();
                return Err(Error::Timeout {
                    seconds: limit.as_secs(),
                });
            }
        };

        // Background processes left behind by the tool may keep the pipes
        // open; draining them counts against the same limit.
        let remaining = limit.saturating_sub(start.elapsed());
        let drained = timeout(remaining, async {
            let _ = (&mut stdout_handle).await;
            let _ = (&mut stderr_handle).await;
        })
        .await;
        if drained.is_err() {
            warn!(
                program = %self.program,
                timeout_secs = limit.as_secs(),
                "Tool output still open at timeout"
            );
            stdout_handle.abort();
            stderr_handle.abort();
            return Err(Error::Timeout {
                seconds: limit.as_secs(),
            });
        }

        let status = status.map_err(|e| Error::ToolInvocation {
            exit_code: None,
            message: format!("failed to wait for '{}': {e}", self.program),
            log_tail: String::new(),
        })?;

        let outcome = ProcessOutcome {
            exit_code: status.code(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        debug!(exit_code = ?outcome.exit_code, duration_ms = outcome.duration_ms, "Tool exited");
        Ok(outcome)
    }
}

fn forward_lines<R>(
    reader: R,
    stream: OutputStream,
    tx: mpsc::Sender<OutputLine>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut line_number = 0u32;
        let mut forwarding = true;
        // Read to EOF even after the receiver is gone so the tool never
        // writes into a closed pipe.
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "Output stream closed");
                    break;
                }
            }
            if !forwarding {
                continue;
            }
            line_number += 1;
            let line = OutputLine {
                stream,
                content: decode_line(&buf),
                line_number,
                timestamp: chrono::Utc::now(),
            };
            if tx.send(line).await.is_err() {
                forwarding = false;
            }
        }
    })
}

/// Lossy UTF-8 without the line terminator.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
