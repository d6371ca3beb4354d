//! In-process tasks: one fixed callable, one argument per work item.
//!
//! Each admission runs the callable on its own OS thread with its own
//! single-threaded runtime. A callable that blocks only holds its own slot,
//! and a panic or error stays on that thread and only shows up in its
//! completion. The controller never runs callable code.

use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::oneshot;
use tracing::{Instrument, Span, debug};

use super::launcher::{Completion, Launcher, TaskHandle};
use crate::error::{Error, Result};

/// What a call thread reports: the callable's result, or the panic message.
type CallResult = std::result::Result<Result<()>, String>;

/// Launches `func(descriptor)` for every admitted work item.
pub struct CallLauncher<A, F> {
    func: Arc<F>,
    _args: PhantomData<fn(A)>,
}

impl<A, F> CallLauncher<A, F> {
    pub fn new(func: F) -> Self {
        Self {
            func: Arc::new(func),
            _args: PhantomData,
        }
    }
}

impl<A, F> Clone for CallLauncher<A, F> {
    fn clone(&self) -> Self {
        Self {
            func: Arc::clone(&self.func),
            _args: PhantomData,
        }
    }
}

impl<A, F, Fut> Launcher for CallLauncher<A, F>
where
    A: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>>,
{
    type Descriptor = A;
    type Handle = CallHandle;

    fn launch(&self, key: &str, descriptor: A) -> Result<CallHandle> {
        let func = Arc::clone(&self.func);
        let span = Span::current();
        let (tx, rx) = oneshot::channel();

        let thread = std::thread::Builder::new()
            .name(format!("call-{key}"))
            .spawn(move || {
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| -> Result<()> {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()?;
                    runtime.block_on(func(descriptor).instrument(span))
                }))
                .map_err(|payload| panic_message(payload.as_ref()));
                // The receiver is gone only if the pool itself was dropped.
                let _ = tx.send(result);
            })
            .map_err(|source| Error::Spawn {
                key: key.to_string(),
                source,
            })?;

        Ok(CallHandle {
            thread: Some(thread),
            result: rx,
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A call running on its own thread.
#[derive(Debug)]
pub struct CallHandle {
    thread: Option<JoinHandle<()>>,
    result: oneshot::Receiver<CallResult>,
}

impl TaskHandle for CallHandle {
    fn is_finished(&mut self) -> Result<bool> {
        Ok(self.thread.as_ref().is_none_or(JoinHandle::is_finished))
    }

    async fn finish(&mut self) -> Result<Completion> {
        let completion = match (&mut self.result).await {
            Ok(Ok(Ok(()))) => Completion {
                success: true,
                ..Completion::default()
            },
            Ok(Ok(Err(e))) => Completion {
                error: Some(e.to_string()),
                ..Completion::default()
            },
            Ok(Err(message)) => Completion {
                error: Some(format!("task panicked: {message}")),
                ..Completion::default()
            },
            Err(_) => Completion {
                error: Some("task ended without reporting".to_string()),
                ..Completion::default()
            },
        };
        Ok(completion)
    }

    fn terminate(&mut self) {
        // Threads cannot be killed. After collection the callable has
        // returned, so the thread is only unwinding its runtime; detach it.
        if let Some(thread) = self.thread.take() {
            debug!(finished = thread.is_finished(), "detaching call thread");
        }
    }
}
