//! The seam between the pool and whatever it runs.

use std::future::Future;

use crate::error::Result;

/// Starts tasks for a pool.
pub trait Launcher {
    /// What a work item carries for this kind of task.
    type Descriptor;
    /// Runtime handle for one started task.
    type Handle: TaskHandle;

    /// Start one task. Must not block.
    fn launch(&self, key: &str, descriptor: Self::Descriptor) -> Result<Self::Handle>;

    /// Whether finished tasks hand back a [`Capture`]. A pool whose
    /// launcher captures output needs a log directory to write it to.
    fn captures_output(&self) -> bool {
        false
    }
}

/// A started task, as seen by the pool's controller.
pub trait TaskHandle: Send {
    /// Non-blocking completion check.
    fn is_finished(&mut self) -> Result<bool>;

    /// Wait for the task to end and collect everything it produced.
    ///
    /// A poll reporting completion is always followed by this call so that
    /// buffered output is not lost.
    fn finish(&mut self) -> impl Future<Output = Result<Completion>> + Send;

    /// Release whatever is left of the task after collection.
    fn terminate(&mut self);
}

/// What a finished task left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    /// Captured streams. Only subprocesses have them.
    pub capture: Option<Capture>,
}

/// Raw stdout and stderr of a subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capture {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}
