pub(crate) mod channel;
pub(crate) mod in_memory;

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use crate::RequestResult;
use channel::ChannelCollector;
use in_memory::InMemoryCollector;

pub trait ResultCollector {
    fn record(&mut self, result: &RequestResult);

    /// Called once at the end of a run, after every virtual user has stopped.
    fn finalize(&self);
}

/// Configuration for the [Recorder], which is the sink that virtual users hand their
/// [RequestResult]s to.
#[derive(Debug, Default)]
pub struct RecorderConfig {
    keep_results: bool,
    channel: Option<UnboundedSender<RequestResult>>,
}

impl RecorderConfig {
    /// Buffer every result in memory so it can be inspected with [Recorder::snapshot] after the
    /// run. Long soak runs should leave this off, the buffer grows with every request.
    pub fn enable_result_buffer(mut self) -> Self {
        self.keep_results = true;
        self
    }

    /// Forward every result into `sender` so an external consumer can aggregate them while the
    /// run is still going.
    pub fn with_channel(mut self, sender: UnboundedSender<RequestResult>) -> Self {
        self.channel = Some(sender);
        self
    }

    pub fn init(self) -> Recorder {
        let mut collectors: Vec<Box<dyn ResultCollector + Send>> = Vec::new();

        let buffer = self.keep_results.then(InMemoryCollector::default);
        if let Some(buffer) = &buffer {
            collectors.push(Box::new(buffer.clone()));
        }
        if let Some(sender) = self.channel {
            collectors.push(Box::new(ChannelCollector::new(sender)));
        }

        Recorder {
            collectors: Mutex::new(collectors),
            buffer,
            requests: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        }
    }
}

/// Fans each result out to the configured collectors. Counts are kept here so totals are
/// available even when no collector is configured.
pub struct Recorder {
    collectors: Mutex<Vec<Box<dyn ResultCollector + Send>>>,
    buffer: Option<InMemoryCollector>,
    requests: AtomicUsize,
    errors: AtomicUsize,
}

impl Recorder {
    pub fn record(&self, result: RequestResult) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if result.is_error() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }

        let mut collectors = self.collectors.lock();
        for collector in collectors.iter_mut() {
            collector.record(&result);
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Every result recorded so far, when the result buffer is enabled.
    pub fn snapshot(&self) -> Option<Vec<RequestResult>> {
        self.buffer.as_ref().map(InMemoryCollector::snapshot)
    }

    pub fn finalize(&self) {
        for collector in self.collectors.lock().iter() {
            collector.finalize();
        }
        log::info!(
            "Recorded {} requests, {} with errors",
            self.request_count(),
            self.error_count()
        );
    }
}
