use std::sync::Arc;

use url::Url;

use squall_core::prelude::{ShutdownHandle, ShutdownListener};
use squall_instruments::Recorder;

use crate::definition::ScenarioOptions;
use crate::executor::Executor;

/// State shared by the driver loop and every virtual user in a run.
pub(crate) struct RunnerContext {
    run_id: String,
    url: Url,
    client: reqwest::Client,
    executor: Arc<Executor>,
    recorder: Arc<Recorder>,
    shutdown_handle: ShutdownHandle,
    options: ScenarioOptions,
}

impl RunnerContext {
    pub(crate) fn new(
        run_id: String,
        url: Url,
        client: reqwest::Client,
        executor: Arc<Executor>,
        recorder: Arc<Recorder>,
        shutdown_handle: ShutdownHandle,
        options: ScenarioOptions,
    ) -> Self {
        Self {
            run_id,
            url,
            client,
            executor,
            recorder,
            shutdown_handle,
            options,
        }
    }

    pub(crate) fn run_id(&self) -> &str {
        &self.run_id
    }

    pub(crate) fn target_url(&self) -> &str {
        self.url.as_str()
    }

    /// The shared HTTP client. Sharing one client pools connections across all virtual users.
    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub(crate) fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    pub(crate) fn new_shutdown_listener(&self) -> ShutdownListener {
        self.shutdown_handle.new_listener()
    }

    pub(crate) fn options(&self) -> &ScenarioOptions {
        &self.options
    }
}

/// Per-user state, owned by the user's thread for the lifetime of that user.
pub(crate) struct UserContext {
    index: usize,
    runner_context: Arc<RunnerContext>,
    /// Transport errors seen since the last successful exchange with the target.
    pub(crate) consecutive_errors: u32,
}

impl UserContext {
    pub(crate) fn new(index: usize, runner_context: Arc<RunnerContext>) -> Self {
        Self {
            index,
            runner_context,
            consecutive_errors: 0,
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn runner_context(&self) -> &Arc<RunnerContext> {
        &self.runner_context
    }
}
