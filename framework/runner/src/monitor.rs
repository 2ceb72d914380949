use std::time::Duration;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use squall_core::prelude::ShutdownListener;

const CHECK_INTERVAL: Duration = Duration::from_secs(5);
const CPU_WARN_THRESHOLD: f32 = 80.0;

/// Monitor the resource usage of the squall process and report high usage.
///
/// This won't stop the run. It just warns that the load generator itself is close to saturating
/// the CPU, in which case latency measurements are likely to be skewed.
pub(crate) fn start_monitor(shutdown_listener: ShutdownListener) {
    std::thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || {
            let this_process_pid = Pid::from_u32(std::process::id());
            let mut sys = System::new();

            sys.refresh_cpu_all();
            let cpu_count = sys.cpus().len().max(1);

            loop {
                if shutdown_listener.should_shutdown() {
                    break;
                }

                sys.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[this_process_pid]),
                    true,
                    ProcessRefreshKind::nothing().with_cpu(),
                );

                if let Some(process) = sys.process(this_process_pid) {
                    let usage = process.cpu_usage() / cpu_count as f32;
                    if usage > CPU_WARN_THRESHOLD {
                        log::warn!(
                            "Squall is using {:.0}% of the CPU across {} cores, latency measurements may be skewed",
                            usage,
                            cpu_count
                        );
                    }
                }

                std::thread::sleep(CHECK_INTERVAL);
            }
        })
        .expect("Failed to start monitor thread");
}
