mod analyze;
mod backup;
mod connection;
mod start;
mod status;

// Connection test
pub use connection::run_test;

// Backup commands
pub use backup::{run_cleanup, run_download};

// Analyze commands
pub use analyze::run_analyze;

// Service commands
pub use start::run_start;

// Status commands
pub use status::run_status;
