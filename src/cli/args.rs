//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Live development bridge between an editor and browser tabs
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: livedev.toml)
    #[arg(short = 'C', long, global = true, default_value = "livedev.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Show protocol and watcher details
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve a directory with live editing of HTML, CSS and JavaScript
    #[command(visible_alias = "s")]
    Serve {
        #[command(flatten)]
        args: ServeArgs,
    },

    /// Print a JavaScript file with hot-swap wrappers added
    #[command(visible_alias = "i")]
    Instrument {
        /// JavaScript file to instrument
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Print the function ID map as JSON instead of the code
        #[arg(long)]
        json: bool,
    },
}

/// Serve command arguments.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long)]
    pub interface: Option<std::net::IpAddr>,

    /// HTTP port number to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// First WebSocket port to try
    #[arg(long)]
    pub ws_port: Option<u16>,

    /// Directory to serve
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub root: Option<PathBuf>,

    /// Push file changes to connected pages
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub watch: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_args() {
        let cli = Cli::parse_from([
            "livedev", "serve", "-p", "8000", "--ws-port", "9000", "-r", "site", "-w", "false",
        ]);
        let Commands::Serve { args } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, Some(8000));
        assert_eq!(args.ws_port, Some(9000));
        assert_eq!(args.root, Some(PathBuf::from("site")));
        assert_eq!(args.watch, Some(false));
        assert_eq!(cli.config, PathBuf::from("livedev.toml"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["livedev", "instrument", "app.js", "--json", "-v", "-C", "x.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("x.toml"));
        assert!(matches!(cli.command, Commands::Instrument { json: true, .. }));
    }

    #[test]
    fn test_bare_watch_flag_means_true() {
        let cli = Cli::parse_from(["livedev", "s", "--watch"]);
        let Commands::Serve { args } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.watch, Some(true));
    }
}
