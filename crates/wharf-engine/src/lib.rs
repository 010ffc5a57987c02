pub mod api;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod effects;
pub mod history;
pub mod stats;
pub mod store;
pub mod submission;

pub use wharf_common::error;
pub use wharf_common::protocol;
