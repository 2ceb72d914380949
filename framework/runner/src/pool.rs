use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Context;

use squall_core::prelude::UserBailError;

use crate::context::{RunnerContext, UserContext};
use crate::definition::HookResult;

pub(crate) type IterationFn = fn(&mut UserContext) -> HookResult;

/// Handle for one virtual user thread.
struct VirtualUser {
    index: usize,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl VirtualUser {
    fn signal_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// True once the thread has ended, whether its loop returned or panicked.
    fn is_done(&self) -> bool {
        self.handle.is_finished()
    }

    fn join(self) {
        if self.handle.join().is_err() {
            log::error!("User {} thread panicked", self.index);
        }
    }
}

/// The set of live virtual users, reconciled against the plan's target once per tick.
///
/// Only the driver loop touches the pool, so scaling decisions never race. A user signalled to
/// stop keeps running until its in-flight request completes; it is held apart from the active
/// set until its thread exits.
pub(crate) struct VirtualUserPool {
    runner_context: Arc<RunnerContext>,
    iteration: IterationFn,
    active: Vec<VirtualUser>,
    draining: Vec<VirtualUser>,
    next_index: usize,
    spawned_total: usize,
}

impl VirtualUserPool {
    pub(crate) fn new(runner_context: Arc<RunnerContext>, iteration: IterationFn) -> Self {
        Self {
            runner_context,
            iteration,
            active: Vec::new(),
            draining: Vec::new(),
            next_index: 0,
            spawned_total: 0,
        }
    }

    /// Bring the number of active users to `target`.
    ///
    /// Users that stopped on their own are reaped first, so a bailed user is replaced on the
    /// next tick for as long as the plan still calls for it. Scaling down signals the newest
    /// users to stop and lets them finish their current request. Reconciling an already met
    /// target changes nothing.
    pub(crate) fn reconcile(&mut self, target: usize) {
        self.reap();

        let active = self.active.len();
        if active < target {
            log::debug!("Scaling up from {active} to {target} users");
            for _ in active..target {
                if let Err(e) = self.spawn_user() {
                    log::error!("Unable to spawn a virtual user, retrying next tick: {e:?}");
                    break;
                }
            }
        } else if active > target {
            log::debug!("Scaling down from {active} to {target} users");
            for user in self.active.drain(target..) {
                user.signal_stop();
                self.draining.push(user);
            }
        }
    }

    /// Signal every user to stop and wait for each to finish its current request and exit.
    pub(crate) fn drain(&mut self) {
        for user in &self.active {
            user.signal_stop();
        }
        self.draining.append(&mut self.active);
        for user in self.draining.drain(..) {
            user.join();
        }
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn draining_count(&self) -> usize {
        self.draining.len()
    }

    pub(crate) fn spawned_total(&self) -> usize {
        self.spawned_total
    }

    fn reap(&mut self) {
        reap_list(&mut self.active);
        reap_list(&mut self.draining);
    }

    fn spawn_user(&mut self) -> anyhow::Result<()> {
        let index = self.next_index;
        let stop = Arc::new(AtomicBool::new(false));

        let runner_context = self.runner_context.clone();
        let iteration = self.iteration;
        let thread_stop = stop.clone();

        let handle = std::thread::Builder::new()
            .name(format!("user-{index}"))
            .spawn(move || {
                let shutdown_listener = runner_context.new_shutdown_listener();
                let mut context = UserContext::new(index, runner_context);

                loop {
                    if thread_stop.load(Ordering::Acquire) || shutdown_listener.should_shutdown() {
                        log::debug!("Stopping user {index}");
                        break;
                    }

                    match iteration(&mut context) {
                        Ok(()) => {}
                        Err(e) if e.is::<UserBailError>() => {
                            log::warn!("User {index} is bailing: {e:?}");
                            break;
                        }
                        Err(e) => {
                            log::error!("User {index} iteration failed: {e:?}");
                        }
                    }
                }
            })
            .context("Failed to spawn thread for virtual user")?;

        self.active.push(VirtualUser { index, stop, handle });
        self.next_index += 1;
        self.spawned_total += 1;

        Ok(())
    }
}

fn reap_list(list: &mut Vec<VirtualUser>) {
    if list.iter().any(VirtualUser::is_done) {
        let mut kept = Vec::with_capacity(list.len());
        for user in std::mem::take(list) {
            if user.is_done() {
                user.join();
            } else {
                kept.push(user);
            }
        }
        *list = kept;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ScenarioOptions;
    use crate::executor::Executor;
    use squall_core::prelude::ShutdownHandle;
    use squall_instruments::RecorderConfig;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use url::Url;

    fn test_pool(iteration: IterationFn) -> VirtualUserPool {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let shutdown_handle = ShutdownHandle::new();
        let executor = Arc::new(Executor::new(runtime, shutdown_handle.clone()));
        let recorder = Arc::new(RecorderConfig::default().init());
        let runner_context = Arc::new(RunnerContext::new(
            "test-run".to_string(),
            Url::parse("http://127.0.0.1:1/").unwrap(),
            reqwest::Client::new(),
            executor,
            recorder,
            shutdown_handle,
            ScenarioOptions::default(),
        ));

        VirtualUserPool::new(runner_context, iteration)
    }

    fn idle_iteration(_context: &mut UserContext) -> HookResult {
        std::thread::sleep(Duration::from_millis(5));
        Ok(())
    }

    fn wait_until_drained(pool: &mut VirtualUserPool) {
        for _ in 0..500 {
            pool.reap();
            if pool.draining_count() == 0 {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("stopping users did not exit");
    }

    #[test]
    fn scales_up_to_the_target() {
        let mut pool = test_pool(idle_iteration);

        pool.reconcile(4);

        assert_eq!(4, pool.active_count());
        pool.drain();
    }

    #[test]
    fn reconciling_an_already_met_target_changes_nothing() {
        let mut pool = test_pool(idle_iteration);

        pool.reconcile(3);
        pool.reconcile(3);
        pool.reconcile(3);

        assert_eq!(3, pool.active_count());
        assert_eq!(3, pool.spawned_total());
        pool.drain();
    }

    #[test]
    fn scales_down_by_stopping_the_newest_users() {
        let mut pool = test_pool(idle_iteration);
        pool.reconcile(5);

        pool.reconcile(2);

        assert_eq!(2, pool.active_count());
        assert_eq!(
            vec![0, 1],
            pool.active.iter().map(|user| user.index).collect::<Vec<_>>()
        );
        wait_until_drained(&mut pool);
        pool.drain();
    }

    #[test]
    fn never_runs_more_users_than_the_target() {
        let mut pool = test_pool(idle_iteration);

        for target in [0, 3, 8, 2, 6, 0, 5] {
            pool.reconcile(target);
            assert!(pool.active_count() <= target);
        }

        pool.drain();
        assert_eq!(0, pool.active_count());
        assert_eq!(0, pool.draining_count());
    }

    #[test]
    fn replaces_a_bailed_user_on_the_next_tick() {
        static BAILS: AtomicUsize = AtomicUsize::new(0);
        fn bailing_iteration(_context: &mut UserContext) -> HookResult {
            BAILS.fetch_add(1, Ordering::Relaxed);
            Err(UserBailError::default().into())
        }

        let mut pool = test_pool(bailing_iteration);
        pool.reconcile(2);

        for _ in 0..500 {
            pool.reap();
            if pool.active_count() == 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(0, pool.active_count());
        assert_eq!(2, BAILS.load(Ordering::Relaxed));

        pool.reconcile(2);

        assert_eq!(2, pool.active_count());
        assert_eq!(4, pool.spawned_total());
        pool.drain();
    }

    #[test]
    fn replaces_a_panicked_user_on_the_next_tick() {
        fn panicking_iteration(_context: &mut UserContext) -> HookResult {
            panic!("iteration blew up");
        }

        let mut pool = test_pool(panicking_iteration);
        pool.reconcile(1);

        for _ in 0..500 {
            pool.reap();
            if pool.active_count() == 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(0, pool.active_count());

        pool.reconcile(1);

        assert_eq!(1, pool.active_count());
        assert_eq!(2, pool.spawned_total());
        pool.drain();
    }

    #[test]
    fn an_iteration_error_does_not_stop_a_user() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        fn failing_iteration(_context: &mut UserContext) -> HookResult {
            CALLS.fetch_add(1, Ordering::Relaxed);
            std::thread::sleep(Duration::from_millis(1));
            Err(anyhow::anyhow!("transient failure"))
        }

        let mut pool = test_pool(failing_iteration);
        pool.reconcile(1);

        for _ in 0..500 {
            if CALLS.load(Ordering::Relaxed) >= 3 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        assert!(CALLS.load(Ordering::Relaxed) >= 3);
        pool.reap();
        assert_eq!(1, pool.active_count());
        pool.drain();
    }
}
