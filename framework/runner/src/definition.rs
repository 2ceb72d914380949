use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedSender;
use url::Url;

use squall_core::prelude::{RunPlan, Stage};
use squall_instruments::{RecorderConfig, RequestResult};

use crate::types::SquallResult;

pub(crate) type HookResult = anyhow::Result<()>;

pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub(crate) const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// The builder for a scenario definition.
///
/// This must be used at the start of a load test to describe the target and the load profile
/// to drive against it.
#[derive(Debug)]
pub struct ScenarioDefinitionBuilder {
    /// The name of the scenario, which should be unique within the test suite.
    name: String,
    url: String,
    stages: Vec<Stage>,
    start_target: usize,
    request_timeout: Duration,
    think_time: Option<Duration>,
    tick_interval: Duration,
    max_consecutive_errors: u32,
    no_progress: bool,
    keep_results: bool,
    result_channel: Option<UnboundedSender<RequestResult>>,
}

/// On-disk form of a scenario, as loaded by [ScenarioDefinitionBuilder::from_toml_file].
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioFile {
    name: Option<String>,
    url: String,
    start_target: Option<usize>,
    stages: Vec<Stage>,
}

impl ScenarioDefinitionBuilder {
    /// Create a new scenario targeting `url`.
    ///
    /// The name should be unique within the test suite. Recommended value is
    /// `env!("CARGO_PKG_NAME")`.
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            stages: Vec::new(),
            start_target: 0,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            think_time: None,
            tick_interval: DEFAULT_TICK_INTERVAL,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            no_progress: false,
            keep_results: false,
            result_channel: None,
        }
    }

    /// Initialise logging and create a new scenario. Use this variant from a scenario `main`.
    pub fn new_with_init(name: &str, url: &str) -> Self {
        env_logger::try_init().ok();
        Self::new(name, url)
    }

    /// Parse a scenario from its TOML form. Stage durations are strings such as `"3m"` or
    /// `"90s"`.
    pub fn from_toml_str(raw: &str) -> SquallResult<Self> {
        let file: ScenarioFile =
            toml::from_str(raw).context("Failed to parse scenario definition")?;

        let mut builder = Self::new(file.name.as_deref().unwrap_or("scenario"), &file.url);
        if let Some(start_target) = file.start_target {
            builder = builder.with_start_target(start_target);
        }
        Ok(builder.with_stages(file.stages))
    }

    /// Load a scenario from a TOML file. See [ScenarioDefinitionBuilder::from_toml_str].
    pub fn from_toml_file(path: impl AsRef<Path>) -> SquallResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read scenario file [{}]", path.as_ref().display()))?;
        Self::from_toml_str(&raw)
    }

    /// Append a stage that ramps to `target` concurrent users over `duration`.
    pub fn with_stage(mut self, duration: Duration, target: usize) -> Self {
        self.stages.push(Stage::new(duration, target));
        self
    }

    pub fn with_stages(mut self, stages: impl IntoIterator<Item = Stage>) -> Self {
        self.stages.extend(stages);
        self
    }

    /// Start the first ramp from `start_target` users instead of from rest.
    pub fn with_start_target(mut self, start_target: usize) -> Self {
        self.start_target = start_target;
        self
    }

    /// Bound each request, including reading the response body. Defaults to 30 seconds.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Pause each user for `think_time` between requests. Users hammer the target back to back
    /// by default.
    pub fn with_think_time(mut self, think_time: Duration) -> Self {
        self.think_time = Some(think_time);
        self
    }

    /// How often the runner compares the live user count against the plan. Defaults to one
    /// second; the pool tracks the plan with at most this much lag.
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// How many transport errors in a row a user tolerates before it bails out of the pool.
    /// Defaults to 10.
    pub fn with_max_consecutive_errors(mut self, max_consecutive_errors: u32) -> Self {
        self.max_consecutive_errors = max_consecutive_errors;
        self
    }

    /// Suppress the progress bar, for batch runs and tests.
    pub fn without_progress(mut self) -> Self {
        self.no_progress = true;
        self
    }

    /// Buffer every [RequestResult] in memory and return the buffer on the run summary. Leave
    /// this off for soak runs, the buffer grows with every request.
    pub fn with_result_buffer(mut self) -> Self {
        self.keep_results = true;
        self
    }

    /// Forward every [RequestResult] into `sender` while the run is going, so results can be
    /// aggregated or exported by the caller.
    pub fn with_result_channel(mut self, sender: UnboundedSender<RequestResult>) -> Self {
        self.result_channel = Some(sender);
        self
    }

    pub(crate) fn build(self) -> SquallResult<ScenarioDefinition> {
        let url = Url::parse(&self.url)
            .with_context(|| format!("Invalid target URL [{}]", self.url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("Target URL [{url}] must use the http or https scheme");
        }
        if self.tick_interval.is_zero() {
            anyhow::bail!("Tick interval must be greater than zero");
        }
        if self.max_consecutive_errors == 0 {
            anyhow::bail!("Max consecutive errors must be at least 1");
        }

        let plan = RunPlan::new(self.stages)
            .context("Invalid run plan")?
            .with_start_target(self.start_target);

        let mut recorder_config = RecorderConfig::default();
        if self.keep_results {
            recorder_config = recorder_config.enable_result_buffer();
        }
        if let Some(sender) = self.result_channel {
            recorder_config = recorder_config.with_channel(sender);
        }

        Ok(ScenarioDefinition {
            name: self.name,
            url,
            plan,
            options: ScenarioOptions {
                request_timeout: self.request_timeout,
                think_time: self.think_time,
                tick_interval: self.tick_interval,
                max_consecutive_errors: self.max_consecutive_errors,
            },
            no_progress: self.no_progress,
            recorder_config,
        })
    }
}

#[derive(Debug)]
pub(crate) struct ScenarioDefinition {
    pub(crate) name: String,
    pub(crate) url: Url,
    pub(crate) plan: RunPlan,
    pub(crate) options: ScenarioOptions,
    pub(crate) no_progress: bool,
    pub(crate) recorder_config: RecorderConfig,
}

/// The knobs that shape each virtual user's request loop.
#[derive(Debug, Clone)]
pub(crate) struct ScenarioOptions {
    pub(crate) request_timeout: Duration,
    pub(crate) think_time: Option<Duration>,
    pub(crate) tick_interval: Duration,
    pub(crate) max_consecutive_errors: u32,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            think_time: None,
            tick_interval: DEFAULT_TICK_INTERVAL,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }
}
