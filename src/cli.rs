use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use keel::platform::Platform;

#[derive(Parser)]
#[command(name = "keel")]
#[command(version)]
#[command(about = "Declarative, idempotent configuration for files, accounts and packages")]
#[command(long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Platform to pick providers for, instead of detecting it
    #[arg(long, global = true, env = "KEEL_PLATFORM")]
    pub platform: Option<Platform>,

    /// Config file (default: keel.toml in the config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge the system to a manifest
    Apply(ApplyArgs),

    /// Show which resources of a manifest are out of date
    Check(CheckArgs),

    /// Show the detected platform and its providers
    Platform,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Manifest to apply
    pub manifest: PathBuf,

    /// Report what would change without changing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Keep applying after a resource fails
    #[arg(short, long)]
    pub keep_going: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Manifest to check
    pub manifest: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn apply_flags() {
        let cli = Cli::parse_from(["keel", "apply", "site.toml", "-n", "--platform", "openbsd"]);
        assert_eq!(cli.platform, Some(Platform::OpenBsd));
        match cli.command {
            Command::Apply(args) => {
                assert_eq!(args.manifest, PathBuf::from("site.toml"));
                assert!(args.dry_run);
                assert!(!args.keep_going);
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn unknown_platform_is_a_usage_error() {
        assert!(Cli::try_parse_from(["keel", "platform", "--platform", "plan9"]).is_err());
    }
}
