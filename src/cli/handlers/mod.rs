//! One handler per subcommand.

pub mod run;
pub mod serve;

pub use run::{RunCommandHandler, RunRequest};
pub use serve::ServeCommandHandler;
