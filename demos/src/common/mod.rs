//! Shared helpers for the demo binaries.

pub mod backend;
pub mod synthetic;

pub use backend::{create_device, get_backend_name, SelectedBackend, SelectedDevice};
pub use synthetic::clustered_batch;
