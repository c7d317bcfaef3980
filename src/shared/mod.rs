// Helpers used by more than one subcommand.
pub mod connect;
pub mod lock;
pub mod report;
pub mod signal;
