pub mod list_controller;
pub mod poller;
pub mod selection;

pub use list_controller::ListController;
pub use poller::{JobOutcome, JobPoller};
pub use selection::{SelectionAffordance, SelectionTracker};
