use clap::Subcommand;

use super::fingerprint::FingerprintArgs;
use super::replay::ReplayArgs;

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Feed a recorded session through the state registry
    Replay(ReplayArgs),

    /// Print the fingerprint of a page
    Fingerprint(FingerprintArgs),

    /// Show the effective configuration
    Config,
}
