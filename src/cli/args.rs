//! Command-line interface definitions.

use clap::{ArgAction, ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CONFIG_FILE;

/// Observable Framework preview CLI
#[derive(Parser, Debug, Clone)]
#[command(name = "observable", version, about, long_about = None, disable_version_flag = true)]
pub struct Cli {
    /// Print the version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    pub version: Option<bool>,

    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Generate the static site for deployment
    Build,

    /// Start the local preview server
    Preview {
        #[command(flatten)]
        args: PreviewArgs,
    },

    /// Sign in to the Observable cloud
    Auth,
}

/// Preview command arguments.
#[derive(clap::Args, Debug, Clone)]
pub struct PreviewArgs {
    /// Config file path
    #[arg(long, default_value = CONFIG_FILE, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Source root (overrides the config file)
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub root: Option<PathBuf>,

    /// Hostname to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (default: first free port from 3000)
    #[arg(long)]
    pub port: Option<u16>,

    /// Open the browser once the server is up
    #[arg(long)]
    pub open: bool,

    /// Log requests and socket traffic
    #[arg(long)]
    pub verbose: bool,
}

impl Default for PreviewArgs {
    fn default() -> Self {
        Self {
            config: PathBuf::from(CONFIG_FILE),
            root: None,
            host: None,
            port: None,
            open: false,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("observable").chain(args.iter().copied()))
    }

    #[test]
    fn test_preview_flags() {
        let cli = parse(&["preview", "--root", "src", "--port", "4000", "--open", "--verbose"]).unwrap();
        let Commands::Preview { args } = cli.command else {
            panic!("expected preview");
        };
        assert_eq!(args.root, Some(PathBuf::from("src")));
        assert_eq!(args.port, Some(4000));
        assert!(args.open);
        assert!(args.verbose);
        assert_eq!(args.config, PathBuf::from(CONFIG_FILE));
        assert_eq!(args.host, None);
    }

    #[test]
    fn test_other_commands() {
        assert!(matches!(parse(&["build"]).unwrap().command, Commands::Build));
        assert!(matches!(parse(&["auth"]).unwrap().command, Commands::Auth));
    }

    #[test]
    fn test_version_flag() {
        assert_eq!(parse(&["-v"]).unwrap_err().kind(), ErrorKind::DisplayVersion);
        assert_eq!(parse(&["--version"]).unwrap_err().kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_missing_or_unknown_command() {
        assert!(parse(&[]).is_err());
        assert_eq!(parse(&["deploy"]).unwrap_err().kind(), ErrorKind::InvalidSubcommand);
    }
}
