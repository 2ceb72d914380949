mod report;

pub use report::channel::ChannelCollector;
pub use report::in_memory::InMemoryCollector;
pub use report::{Recorder, RecorderConfig, ResultCollector};

use std::time::{Duration, SystemTime};

/// The outcome of a single request issued by a virtual user.
///
/// Failed requests are data rather than faults. A result carries either a status code, when the
/// target answered at all, or a transport error, when it did not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestResult {
    /// The virtual user that issued the request.
    pub user: usize,
    /// Wall clock time at which the request was sent.
    pub started_at: SystemTime,
    /// Time from sending the request to reading the end of the response, or to the failure.
    pub elapsed: Duration,
    /// The HTTP status code, when a response came back.
    pub status: Option<u16>,
    /// The transport failure, such as a refused connection or a timeout, when no response came
    /// back.
    pub error: Option<String>,
}

impl RequestResult {
    pub fn response(user: usize, started_at: SystemTime, elapsed: Duration, status: u16) -> Self {
        Self {
            user,
            started_at,
            elapsed,
            status: Some(status),
            error: None,
        }
    }

    pub fn failure(
        user: usize,
        started_at: SystemTime,
        elapsed: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            user,
            started_at,
            elapsed,
            status: None,
            error: Some(error.into()),
        }
    }

    /// True when the target answered with a 2xx status.
    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(status) if (200..300).contains(&status))
    }

    /// True for transport failures and for non-2xx responses.
    pub fn is_error(&self) -> bool {
        !self.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_status(status: u16) -> RequestResult {
        RequestResult::response(0, SystemTime::now(), Duration::from_millis(5), status)
    }

    #[test]
    fn considers_2xx_a_success() {
        assert!(result_with_status(200).is_success());
        assert!(result_with_status(204).is_success());
    }

    #[test]
    fn considers_other_statuses_an_error() {
        assert!(result_with_status(301).is_error());
        assert!(result_with_status(404).is_error());
        assert!(result_with_status(500).is_error());
    }

    #[test]
    fn considers_transport_failures_an_error() {
        let result = RequestResult::failure(
            0,
            SystemTime::now(),
            Duration::from_millis(5),
            "connection refused",
        );

        assert!(result.is_error());
        assert_eq!(None, result.status);
    }
}
