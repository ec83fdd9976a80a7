use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::graph_exec::{ExecutorError, FinalResult};

/// Control handle for a run started with
/// [`GraphExecutor::execute_streaming`](super::GraphExecutor::execute_streaming).
///
/// [`cancel`](Self::cancel) asks the run to stop: no new nodes dispatch,
/// in-flight nodes emit aborted terminal events, and the stream still closes
/// with a proper run-terminal event. [`abort`](Self::abort) tears the task
/// down without that courtesy and is a last resort.
///
/// Dropping the handle detaches it; the run keeps going in the background.
#[derive(Debug)]
pub struct RunHandle {
    cancel: CancellationToken,
    join_handle: JoinHandle<Result<FinalResult, ExecutorError>>,
}

impl RunHandle {
    pub(crate) fn new(
        cancel: CancellationToken,
        join_handle: JoinHandle<Result<FinalResult, ExecutorError>>,
    ) -> Self {
        Self {
            cancel,
            join_handle,
        }
    }

    /// Request a graceful stop. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether a stop has been requested (not necessarily observed yet).
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the run task has finished, for any reason.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Kill the run task outright. Prefer [`cancel`](Self::cancel), which
    /// lets in-flight nodes wind down and the event stream terminate.
    pub fn abort(&self) {
        self.join_handle.abort();
    }

    /// Wait for the run to finish and return its result. A cancelled run
    /// resolves to [`ExecutorError::Aborted`].
    pub async fn join(self) -> Result<FinalResult, ExecutorError> {
        self.join_handle.await?
    }
}
