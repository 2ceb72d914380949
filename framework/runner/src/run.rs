use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;

use squall_instruments::RequestResult;

use crate::context::RunnerContext;
use crate::definition::ScenarioDefinitionBuilder;
use crate::executor::Executor;
use crate::http;
use crate::monitor::start_monitor;
use crate::pool::VirtualUserPool;
use crate::progress::start_progress;
use crate::shutdown::start_shutdown_listener;
use crate::types::SquallResult;

/// Totals for a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: String,
    pub requests: usize,
    pub errors: usize,
    pub elapsed: Duration,
    /// Every recorded result, when the result buffer was enabled on the definition.
    pub results: Option<Vec<RequestResult>>,
}

/// Drive a scenario from its first stage to its last and return the totals.
///
/// Once per tick the live user count is reconciled against the plan, so the pool tracks the
/// plan's target with at most one tick of lag. The run ends when the plan is exhausted or when
/// Ctrl-C is received; either way every user finishes its in-flight request before this
/// returns.
pub fn run(definition: ScenarioDefinitionBuilder) -> SquallResult<RunSummary> {
    let definition = definition.build()?;
    let run_id = nanoid::nanoid!();

    log::info!(
        "Running scenario [{}] with run id [{}]: {} stage(s) over {:?}, peaking at {} users",
        definition.name,
        run_id,
        definition.plan.stages().len(),
        definition.plan.total_duration(),
        definition.plan.max_target()
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime)?;
    let executor = Arc::new(Executor::new(runtime, shutdown_handle.clone()));
    let recorder = Arc::new(definition.recorder_config.init());
    let client = http::build_client(&definition.options)?;

    let runner_context = Arc::new(RunnerContext::new(
        run_id,
        definition.url,
        client,
        executor,
        recorder.clone(),
        shutdown_handle.clone(),
        definition.options,
    ));

    if !definition.no_progress {
        start_progress(definition.plan.clone(), shutdown_handle.new_listener());
    }

    // Watch for the load generator itself becoming the bottleneck, which would skew results.
    start_monitor(shutdown_handle.new_listener());

    let mut pool = VirtualUserPool::new(runner_context.clone(), http::get_iteration);
    let shutdown_listener = shutdown_handle.new_listener();
    let tick_interval = runner_context.options().tick_interval;
    let planned_runtime = definition.plan.total_duration();
    let started = Instant::now();

    loop {
        if shutdown_listener.should_shutdown() {
            log::info!("Stopping scenario [{}] early", definition.name);
            break;
        }
        let elapsed = started.elapsed();
        if elapsed >= planned_runtime {
            break;
        }

        pool.reconcile(definition.plan.target_at(elapsed));

        // Sleep one tick, waking early if shutdown is signalled.
        let slept = runner_context.executor().execute_interruptible(async {
            tokio::time::sleep(tick_interval).await;
            Ok(())
        });
        if slept.is_err() {
            break;
        }
    }

    log::info!(
        "Draining {} active and {} stopping users",
        pool.active_count(),
        pool.draining_count()
    );
    shutdown_handle.shutdown();
    pool.drain();

    recorder.finalize();

    let summary = RunSummary {
        run_id: runner_context.run_id().to_string(),
        requests: recorder.request_count(),
        errors: recorder.error_count(),
        elapsed: started.elapsed(),
        results: recorder.snapshot(),
    };
    log::info!(
        "Scenario [{}] finished in {:?}, {} users spawned over the run",
        definition.name,
        summary.elapsed,
        pool.spawned_total()
    );

    Ok(summary)
}
