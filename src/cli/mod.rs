pub mod app;
pub mod commands;
pub mod env;
pub mod info;
pub mod output;
pub mod runtime;
pub mod simulate;

pub use info::cmd_info;
pub use simulate::{cmd_simulate, SimulateArgs};
