use std::sync::Arc;

use tokio::sync::watch::{Receiver, Sender};

/// Owner side of the run-wide shutdown signal.
///
/// The handle can be cloned freely and raised from any thread. Listeners created with
/// [ShutdownHandle::new_listener] observe the signal as a level, so a listener created after the
/// signal was raised still sees it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<Sender<bool>>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: Arc::new(tokio::sync::watch::channel(false).0),
        }
    }

    /// Raise the shutdown signal. Safe to call more than once.
    pub fn shutdown(&self) {
        log::debug!("Shutdown signal raised");
        self.sender.send_replace(true);
    }

    pub fn new_listener(&self) -> ShutdownListener {
        ShutdownListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct ShutdownListener {
    receiver: Receiver<bool>,
}

impl ShutdownListener {
    pub(crate) fn new(receiver: Receiver<bool>) -> Self {
        Self { receiver }
    }

    /// Point in time check whether shutdown has been signalled. If this returns true then work
    /// should be stopped so that the run can shut down.
    pub fn should_shutdown(&self) -> bool {
        // A dropped sender means the run is tearing down, treat that as a shutdown.
        self.receiver.has_changed().is_err() || *self.receiver.borrow()
    }

    /// Wait for shutdown to be signalled. It is safe to race this with another future so that the
    /// shutdown signal can be used to cancel other work in progress.
    pub async fn wait_for_shutdown(&mut self) {
        loop {
            if *self.receiver.borrow_and_update() {
                return;
            }
            if self.receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct InterruptedError {
    msg: String,
}

impl Default for InterruptedError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}
