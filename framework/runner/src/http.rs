use std::time::{Instant, SystemTime};

use anyhow::Context;

use squall_core::prelude::UserBailError;
use squall_instruments::RequestResult;

use crate::context::UserContext;
use crate::definition::{HookResult, ScenarioOptions};

pub(crate) fn build_client(options: &ScenarioOptions) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("squall/", env!("CARGO_PKG_VERSION")))
        .timeout(options.request_timeout)
        .build()
        .context("Failed to build the HTTP client")
}

/// Issue one GET against `url` and fold whatever happens into a [RequestResult].
///
/// This never fails. A request that cannot be sent, times out, or dies mid-body comes back as a
/// result carrying the error. The timeout configured on `client` bounds the whole exchange,
/// including reading the body.
pub(crate) async fn execute(client: &reqwest::Client, url: &str, user: usize) -> RequestResult {
    let started_at = SystemTime::now();
    let started = Instant::now();

    match client.get(url).send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            match response.bytes().await {
                Ok(_) => RequestResult::response(user, started_at, started.elapsed(), status),
                Err(e) => RequestResult::failure(
                    user,
                    started_at,
                    started.elapsed(),
                    format!("Failed to read response body: {e}"),
                ),
            }
        }
        Err(e) => RequestResult::failure(user, started_at, started.elapsed(), e.to_string()),
    }
}

/// The request loop body run by every virtual user: one GET, record the outcome, pace with the
/// think time, and bail once the target looks unreachable.
pub(crate) fn get_iteration(context: &mut UserContext) -> HookResult {
    let runner_context = context.runner_context().clone();
    let user = context.index();

    let result = runner_context.executor().execute_in_place(async {
        Ok(execute(runner_context.client(), runner_context.target_url(), user).await)
    })?;

    let transport_error = result.error.is_some();
    if let Some(error) = &result.error {
        log::debug!("User {user} request failed: {error}");
    }
    runner_context.recorder().record(result);

    if transport_error {
        context.consecutive_errors += 1;
        if context.consecutive_errors >= runner_context.options().max_consecutive_errors {
            log::warn!(
                "User {} cannot reach the target after {} consecutive attempts",
                user,
                context.consecutive_errors
            );
            return Err(UserBailError::default().into());
        }
    } else {
        context.consecutive_errors = 0;
    }

    if let Some(think_time) = runner_context.options().think_time {
        std::thread::sleep(think_time);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::time::Duration;

    fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}/")
    }

    fn test_client(timeout: Duration) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn reports_status_and_latency_for_a_response() {
        let url =
            serve_once("HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok");

        let result = execute(&test_client(Duration::from_secs(2)), &url, 3).await;

        assert_eq!(Some(200), result.status);
        assert_eq!(None, result.error);
        assert_eq!(3, result.user);
        assert!(result.is_success());
        assert!(result.elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn reports_a_non_2xx_response_as_data() {
        let url = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        );

        let result = execute(&test_client(Duration::from_secs(2)), &url, 0).await;

        assert_eq!(Some(503), result.status);
        assert_eq!(None, result.error);
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn reports_a_refused_connection_as_an_error_result() {
        let url = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);
            format!("http://{addr}/")
        };

        let result = execute(&test_client(Duration::from_secs(2)), &url, 0).await;

        assert_eq!(None, result.status);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn gives_up_within_the_configured_timeout() {
        // Accepted into the backlog but never answered, so the client's timeout has to fire.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());

        let result = execute(&test_client(Duration::from_millis(300)), &url, 0).await;

        assert!(result.error.is_some());
        assert!(result.elapsed >= Duration::from_millis(300));
        assert!(result.elapsed < Duration::from_secs(2));
    }
}
