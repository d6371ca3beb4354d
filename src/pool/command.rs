//! Subprocess tasks: a command line per work item, output captured to logs.

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::debug;

use super::launcher::{Capture, Completion, Launcher, TaskHandle};
use crate::error::{Error, Result};

/// Launches each descriptor as an OS process.
///
/// The descriptor is split on whitespace: the first token is the program,
/// the rest are its arguments. There is no shell parsing, so arguments
/// containing spaces have to be wrapped in a script by the caller.
#[derive(Debug, Clone, Default)]
pub struct CommandLauncher;

impl CommandLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl Launcher for CommandLauncher {
    type Descriptor = String;
    type Handle = CommandHandle;

    fn launch(&self, key: &str, descriptor: String) -> Result<CommandHandle> {
        let mut argv = descriptor.split_whitespace();
        let program = argv
            .next()
            .ok_or_else(|| Error::EmptyCommand(key.to_string()))?;

        let mut child = Command::new(program)
            .args(argv)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                key: key.to_string(),
                source,
            })?;

        debug!(key, program, pid = child.id(), "process spawned");

        // Drain both pipes while the child runs so a chatty process never
        // stalls on a full pipe buffer.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        Ok(CommandHandle {
            child,
            stdout,
            stderr,
        })
    }

    fn captures_output(&self) -> bool {
        true
    }
}

/// A running subprocess and the readers collecting its output.
#[derive(Debug)]
pub struct CommandHandle {
    child: Child,
    stdout: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    stderr: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
}

impl CommandHandle {
    /// OS process id, while the process has not been waited on.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

impl TaskHandle for CommandHandle {
    fn is_finished(&mut self) -> Result<bool> {
        Ok(self.child.try_wait()?.is_some())
    }

    async fn finish(&mut self) -> Result<Completion> {
        let status = self.child.wait().await?;
        let stdout = collect(self.stdout.take()).await?;
        let stderr = collect(self.stderr.take()).await?;

        Ok(Completion {
            success: status.success(),
            exit_code: status.code(),
            error: (!status.success()).then(|| format!("process exited: {status}")),
            capture: Some(Capture { stdout, stderr }),
        })
    }

    fn terminate(&mut self) {
        // The process has normally been waited on already, in which case
        // tokio refuses the kill; either way nothing is left to do.
        if let Err(e) = self.child.start_kill() {
            debug!("kill after collection: {e}");
        }
    }
}

fn drain<R>(mut stream: R) -> JoinHandle<std::io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await?;
        Ok(buf)
    })
}

async fn collect(reader: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> Result<Vec<u8>> {
    match reader {
        Some(handle) => handle
            .await
            .map_err(|e| Error::Other(format!("output reader failed: {e}")))?
            .map_err(Error::from),
        None => Ok(Vec::new()),
    }
}
