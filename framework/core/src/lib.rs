mod bail;
mod plan;
mod shutdown;

pub mod prelude {
    pub use crate::bail::UserBailError;
    pub use crate::plan::{parse_duration, PlanError, RunPlan, Stage};
    pub use crate::shutdown::{InterruptedError, ShutdownHandle, ShutdownListener};
}
