use std::sync::Arc;

use parking_lot::Mutex;

use crate::report::ResultCollector;
use crate::RequestResult;

/// A very basic collector that is useful while developing scenarios and in tests. It keeps every
/// result in memory so a run can be inspected after it completes.
#[derive(Clone, Default)]
pub struct InMemoryCollector {
    results: Arc<Mutex<Vec<RequestResult>>>,
}

impl InMemoryCollector {
    pub fn snapshot(&self) -> Vec<RequestResult> {
        self.results.lock().clone()
    }
}

impl ResultCollector for InMemoryCollector {
    fn record(&mut self, result: &RequestResult) {
        self.results.lock().push(result.clone());
    }

    fn finalize(&self) {
        // no-op because the buffer is read through snapshots
    }
}
