use tokio::sync::mpsc::UnboundedSender;

use crate::report::ResultCollector;
use crate::RequestResult;

/// Forwards every result into an unbounded channel so an external consumer can aggregate them
/// while the run is still going. The channel closes when the [crate::Recorder] is dropped at the
/// end of the run.
pub struct ChannelCollector {
    sender: UnboundedSender<RequestResult>,
    warned: bool,
}

impl ChannelCollector {
    pub fn new(sender: UnboundedSender<RequestResult>) -> Self {
        Self {
            sender,
            warned: false,
        }
    }
}

impl ResultCollector for ChannelCollector {
    fn record(&mut self, result: &RequestResult) {
        if self.sender.send(result.clone()).is_err() && !self.warned {
            self.warned = true;
            log::warn!("Result channel receiver dropped, discarding further results");
        }
    }

    fn finalize(&self) {
        // no-op because the receiver side owns aggregation
    }
}
