use std::future::Future;

use squall_core::prelude::{InterruptedError, ShutdownHandle};

#[derive(Debug)]
pub(crate) struct Executor {
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    pub(crate) fn new(runtime: tokio::runtime::Runtime, shutdown_handle: ShutdownHandle) -> Self {
        Self {
            runtime,
            shutdown_handle,
        }
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// Shutdown does not cancel the future. Virtual users issue their requests through this so
    /// that an in-flight request can run to its response or its timeout while the run drains.
    /// Submitted futures must be bounded by their own timeouts for the same reason.
    pub(crate) fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        self.runtime.block_on(fut)
    }

    /// Run async code in place, giving up when the runner shuts down.
    ///
    /// The future is dropped if shutdown is signalled first, so only submit work that is safe to
    /// abandon, such as a sleep.
    pub(crate) fn execute_interruptible<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let mut shutdown_listener = self.shutdown_handle.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => result,
                _ = shutdown_listener.wait_for_shutdown() => {
                    Err(anyhow::anyhow!(InterruptedError::default()))
                },
            }
        })
    }
}
