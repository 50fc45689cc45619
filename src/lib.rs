pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod terminal;
pub mod view;

pub use api::{ApiClient, InvoiceGateway};
pub use config::AppConfig;
pub use error::AppError;
pub use service::{JobOutcome, JobPoller, ListController, SelectionTracker};
