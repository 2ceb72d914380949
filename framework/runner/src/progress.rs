use std::cmp::min;
use std::fmt::Write;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressState, ProgressStyle};

use squall_core::prelude::{RunPlan, ShutdownListener};

/// Displays a progress bar while the run is going, showing how far through the plan it is and
/// the user count the plan currently calls for.
pub(crate) fn start_progress(plan: RunPlan, shutdown_listener: ShutdownListener) {
    std::thread::Builder::new().name("progress".to_string()).spawn(move || {
        let start_time = Instant::now();
        let planned_runtime = plan.total_duration();
        let pb = ProgressBar::new(planned_runtime.as_secs());
        pb.set_style(ProgressStyle::with_template("{spinner:.green} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {planned_runtime}] {msg}")
            .expect("Failed to set progress style")
            .with_key("planned_runtime", {
                let hours = planned_runtime.as_secs() / 3600;
                let minutes = (planned_runtime.as_secs() % 3600) / 60;
                let seconds = planned_runtime.as_secs() % 60;
                move |_state: &ProgressState, w: &mut dyn Write| write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds).expect("Could not write planned_runtime")
            })
            .progress_chars("#>-"));

        loop {
            if shutdown_listener.should_shutdown() {
                log::trace!("Progress thread shutting down");
                pb.finish_and_clear();
                break;
            }

            let elapsed = start_time.elapsed();
            pb.set_position(min(elapsed.as_secs(), planned_runtime.as_secs()));
            pb.set_message(format!("target {} users", plan.target_at(elapsed)));
            std::thread::sleep(Duration::from_secs(1));
        }
    }).expect("Failed to start progress thread");
}
