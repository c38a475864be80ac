//! Command-line interface definition.
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Top-level CLI entry point for linkforge.
#[derive(Parser, Debug)]
#[command(
    name = "linkforge",
    about = "Pattern-driven link, copy and post-command workflows",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: $LINKFORGE_CONFIG, then ./linkforge.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Run rules one after another (parallel is enabled by default)
    #[arg(long = "no-parallel", global = true, action = clap::ArgAction::SetFalse)]
    pub parallel: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Discover, link and run post-commands for every rule
    Run(RunOpts),
    /// List what each rule would link without touching the filesystem
    Discover(DiscoverOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file of this command.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Run(_) => "run",
            Self::Discover(_) => "discover",
            Self::Version => "version",
        }
    }
}

/// What to do when a link target already exists.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwriteMode {
    /// Keep existing targets
    #[default]
    Skip,
    /// Replace existing targets
    Always,
    /// Ask on stdin for each existing target
    Prompt,
}

/// Options for the `run` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct RunOpts {
    /// Run only the named rules
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Conflict handling for existing targets
    #[arg(long, value_enum, default_value_t = OverwriteMode::Skip)]
    pub overwrite: OverwriteMode,
}

/// Options for the `discover` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct DiscoverOpts {
    /// Show only the named rules
    #[arg(long = "rule", value_delimiter = ',')]
    pub rules: Vec<String>,
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_run_defaults() {
        let cli = Cli::parse_from(["linkforge", "run"]);
        let Command::Run(opts) = cli.command else {
            panic!("expected run");
        };
        assert!(opts.only.is_empty());
        assert_eq!(opts.overwrite, OverwriteMode::Skip);
        assert!(cli.global.parallel);
        assert!(!cli.global.verbose);
        assert!(cli.global.config.is_none());
    }

    #[test]
    fn parse_run_only_and_overwrite() {
        let cli = Cli::parse_from([
            "linkforge",
            "run",
            "--only",
            "a,b",
            "--overwrite",
            "prompt",
        ]);
        let Command::Run(opts) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(opts.only, ["a", "b"]);
        assert_eq!(opts.overwrite, OverwriteMode::Prompt);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "linkforge",
            "run",
            "-v",
            "--no-parallel",
            "-c",
            "/etc/linkforge.toml",
        ]);
        assert!(cli.global.verbose);
        assert!(!cli.global.parallel);
        assert_eq!(
            cli.global.config,
            Some(PathBuf::from("/etc/linkforge.toml"))
        );
    }

    #[test]
    fn parse_discover_rules() {
        let cli = Cli::parse_from(["linkforge", "discover", "--rule", "x", "--rule", "y"]);
        assert_eq!(cli.command.name(), "discover");
        let Command::Discover(opts) = cli.command else {
            panic!("expected discover");
        };
        assert_eq!(opts.rules, ["x", "y"]);
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["linkforge", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }

    #[test]
    fn rejects_unknown_overwrite_mode() {
        assert!(Cli::try_parse_from(["linkforge", "run", "--overwrite", "maybe"]).is_err());
    }
}
