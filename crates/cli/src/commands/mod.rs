//! CLI command implementations

mod config;
mod history;
mod run;

pub use config::{cmd_config_init, cmd_config_show};
pub use history::cmd_history;
pub use run::{RunArgs, cmd_run};
