//! External command execution with streamed output
//!
//! Each command is spawned with piped stdout/stderr. Two reader tasks forward
//! lines onto the `log-line` feed; exit and the end of both streams share one
//! timeout. Progress lines (`[i/n] Running: ...`, `Command exited with code ...`)
//! are emitted on the same feed so the operator sees one interleaved stream.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;

use geekflash_core::prelude::*;
use geekflash_core::{CommandResult, LogLine, LogStreamKind};

use crate::commands::CommandSpec;
use crate::feed::EventFeed;

/// Default bound on a single external command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs [`CommandSpec`] sequences and streams their output
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    log_feed: EventFeed<LogLine>,
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(log_feed: EventFeed<LogLine>, timeout: Duration) -> Self {
        Self { log_feed, timeout }
    }

    fn log(&self, line: LogLine) {
        self.log_feed.emit(line);
    }

    /// Run commands in order, stopping at the first non-zero exit.
    ///
    /// Returns the failing command's result, or the last command's result when
    /// every command succeeds. Spawn failures and timeouts abort the sequence
    /// with an error.
    pub async fn execute_sequence(&self, commands: &[CommandSpec]) -> Result<CommandResult> {
        let total = commands.len();
        let mut last = CommandResult::new(0, 0);

        for (index, spec) in commands.iter().enumerate() {
            if spec.delay_before_ms > 0 {
                self.log(LogLine::stdout(format!(
                    "Waiting {}ms before next command...",
                    spec.delay_before_ms
                )));
                tokio::time::sleep(Duration::from_millis(spec.delay_before_ms)).await;
            }

            self.log(LogLine::stdout(format!(
                "[{}/{}] Running: {}",
                index + 1,
                total,
                spec.display()
            )));

            last = self.execute(spec).await?;
            if !last.is_success() {
                warn!(
                    "Sequence stopped at step {}/{}: exit code {}",
                    index + 1,
                    total,
                    last.exit_code
                );
                return Ok(last);
            }
        }

        Ok(last)
    }

    /// Run a single command to completion
    pub async fn execute(&self, spec: &CommandSpec) -> Result<CommandResult> {
        let mut command = if spec.sudo {
            let mut c = Command::new("sudo");
            c.arg(&spec.program);
            c
        } else {
            Command::new(&spec.program)
        };

        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Spawning: {}", spec.display());
        let started = Instant::now();

        let mut child = command.spawn().map_err(|e| {
            let program = if spec.sudo { "sudo" } else { spec.program.as_str() };
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ToolNotFound {
                    tool: program.to_string(),
                }
            } else {
                Error::process_spawn(program, e.to_string())
            }
        })?;

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, LogStreamKind::Stdout, self.log_feed.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, LogStreamKind::Stderr, self.log_feed.clone()));
        }

        // Exit and both streams share one bound
        let outcome = tokio::time::timeout(self.timeout, async {
            let status = child.wait().await;
            for reader in readers.iter_mut() {
                let _ = reader.await;
            }
            status
        })
        .await;

        let status = match outcome {
            Ok(status) => status.map_err(|e| Error::process(format!("wait failed: {}", e)))?,
            Err(_) => {
                let secs = self.timeout.as_secs();
                warn!("{} timed out after {}s, killing", spec.program, secs);
                if let Ok(None) = child.try_wait() {
                    if let Err(e) = child.kill().await {
                        error!("Failed to kill {}: {}", spec.program, e);
                    }
                }
                for reader in &readers {
                    reader.abort();
                }
                self.log(LogLine::stderr(format!(
                    "Command timed out after {} seconds",
                    secs
                )));
                return Err(Error::CommandTimeout { secs });
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        // Killed by a signal: no exit code
        let exit_code = status.code().unwrap_or(-1);

        self.log(LogLine::stdout(format!(
            "Command exited with code {} (took {}ms)",
            exit_code, duration_ms
        )));
        info!(
            "{} exited with code {} in {}ms",
            spec.program, exit_code, duration_ms
        );

        Ok(CommandResult::new(exit_code, duration_ms))
    }
}

fn spawn_reader<R>(reader: R, stream: LogStreamKind, feed: EventFeed<LogLine>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        // Undecodable bytes must not end the loop
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    while matches!(buf.last(), Some(&(b'\n' | b'\r'))) {
                        buf.pop();
                    }
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    trace!("{}: {}", stream.as_str(), line);
                    feed.emit(LogLine::new(stream, line));
                }
                Err(e) => {
                    debug!("{} reader error: {}", stream.as_str(), e);
                    break;
                }
            }
        }
    })
}
