use clap::Subcommand;

use super::simulate::SimulateArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Replay a multi-tab permission scenario and report what each tab saw
    Simulate(SimulateArgs),

    /// Show build information and the effective broker configuration
    Info,
}
