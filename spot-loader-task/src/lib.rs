pub mod batch;
pub mod clock;
pub mod cursor_resolver;
pub mod loader;
pub mod materialize;
pub mod pass_outcome;
pub mod polling;
pub mod request_budget;

pub use batch::PassBatch;
pub use clock::Clock;
pub use cursor_resolver::{WorkItem, WorkList};
pub use loader::{LoaderConfig, SpotLoader};
pub use pass_outcome::PassOutcome;
pub use polling::{PollingController, PollingMode};
pub use request_budget::RequestBudget;
