mod context;
mod definition;
mod executor;
mod http;
mod monitor;
mod pool;
mod progress;
mod run;
mod shutdown;
mod types;

pub mod prelude {
    pub use crate::definition::ScenarioDefinitionBuilder;
    pub use crate::run::{run, RunSummary};
    pub use crate::types::SquallResult;

    /// Re-export of the `squall_core` prelude so that a scenario can depend on this crate alone.
    pub use squall_core::prelude::*;

    /// Re-export of the result type so that consumers of a result channel do not need a direct
    /// dependency on `squall_instruments`.
    pub use squall_instruments::RequestResult;
}
