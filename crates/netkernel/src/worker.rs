//! Runs a kernel on a dedicated blocking thread.
//!
//! Kernels are synchronous and must never be called concurrently. A
//! [`KernelWorker`] owns one kernel on a `spawn_blocking` thread and feeds it
//! commands in submission order, so async callers can drive it without
//! blocking the runtime.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};
use uuid::Uuid;
use crate::column::{empty_columns, BatchedColumns, FrameInfo};
use crate::error::{Error, Result};
use crate::kernel::Kernel;

enum Command {
    GeometryChange {
        frame_info: FrameInfo,
        reply: oneshot::Sender<Result<()>>,
    },
    Execute {
        inputs: BatchedColumns,
        reply: oneshot::Sender<Result<BatchedColumns>>,
    },
}

/// The eventual result of a command submitted to a [`KernelWorker`].
pub struct Pending<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(Error::Device("kernel worker stopped".into()))))
    }
}

/// Handle to a kernel running on its own thread.
///
/// Dropping the handle closes the command channel; the thread finishes the
/// commands already queued and exits, and is joined in the background.
pub struct KernelWorker {
    id: Uuid,
    sender: Option<mpsc::UnboundedSender<Command>>,
    handle: Option<JoinHandle<()>>,
}

impl KernelWorker {
    /// Move `kernel` onto a blocking thread. Every execution produces
    /// `num_outputs` output columns.
    pub fn spawn(kernel: Box<dyn Kernel>, num_outputs: usize) -> Self {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::task::spawn_blocking(move || run(id, kernel, num_outputs, receiver));
        debug!(%id, "kernel worker started");
        Self {
            id,
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn on_geometry_change(&self, frame_info: FrameInfo) -> Pending<()> {
        let (reply, receiver) = oneshot::channel();
        self.submit(Command::GeometryChange { frame_info, reply });
        Pending { receiver }
    }

    pub fn execute(&self, inputs: BatchedColumns) -> Pending<BatchedColumns> {
        let (reply, receiver) = oneshot::channel();
        self.submit(Command::Execute { inputs, reply });
        Pending { receiver }
    }

    // A command that cannot be queued drops its reply sender, which resolves
    // the matching `Pending` to an error.
    fn submit(&self, command: Command) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(command);
        }
    }

    /// Stop accepting commands and wait for the queued ones to finish.
    pub async fn shutdown(mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(id = %self.id, "kernel worker panicked: {e}");
            }
        }
    }
}

impl Drop for KernelWorker {
    fn drop(&mut self) {
        self.sender.take();
        if let (Some(handle), Ok(runtime)) = (self.handle.take(), tokio::runtime::Handle::try_current()) {
            runtime.spawn(async move {
                let _ = handle.await;
            });
        }
    }
}

fn run(id: Uuid, mut kernel: Box<dyn Kernel>, num_outputs: usize, mut receiver: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = receiver.blocking_recv() {
        match command {
            Command::GeometryChange { frame_info, reply } => {
                trace!(%id, ?frame_info, "geometry change");
                let _ = reply.send(kernel.on_geometry_change(frame_info));
            }
            Command::Execute { inputs, reply } => {
                let mut outputs = empty_columns(num_outputs);
                let result = kernel.execute(&inputs, &mut outputs).map(|_| outputs);
                if let Err(e) = &result {
                    error!(%id, "kernel execution failed: {e}");
                }
                let _ = reply.send(result);
            }
        }
    }
    debug!(%id, "kernel worker stopped");
}
