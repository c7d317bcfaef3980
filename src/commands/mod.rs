// Command implementations split by subcommand.
pub mod gnss;
pub mod http;
pub mod identity;
pub mod run;

pub use gnss::run_gnss;
pub use http::run_http;
pub use identity::run_identity;
pub use run::run_mode;
