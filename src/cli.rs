//! Command-line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    config::{ENV_DATABASE, ENV_LISTEN},
    relay_client::{DEFAULT_HOST, DEFAULT_PORT},
};

/// Relay GitHub repository and follower data to TCP clients
#[derive(Parser, Debug)]
#[command(name = "ghrelay", version)]
#[command(about = "Cache GitHub repositories and followers in SQLite and serve them over TCP")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the relay server
    Serve(ServeArgs),
    /// Connect to a relay server from the terminal
    Connect(ConnectArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to listen on, e.g. 0.0.0.0:5000
    #[arg(short, long, env = ENV_LISTEN)]
    pub listen: Option<String>,

    /// SQLite database file
    #[arg(short, long, env = ENV_DATABASE)]
    pub database: Option<PathBuf>,

    /// Config file; defaults to ghrelay.toml in the user config directory
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset, e.g. `debug` or `ghrelay=trace`
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Relay server host
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Relay server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn connect_defaults_to_local_server() {
        let cli = Cli::try_parse_from(["ghrelay", "connect"]).unwrap();
        let Command::Connect(args) = cli.command else {
            panic!("expected connect");
        };
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.port, 5000);
    }

    #[test]
    fn serve_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "ghrelay",
            "serve",
            "--listen",
            "127.0.0.1:7000",
            "--database",
            "/tmp/relay.db",
            "--log-level",
            "debug",
        ])
        .unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.listen.as_deref(), Some("127.0.0.1:7000"));
        assert_eq!(args.database, Some(PathBuf::from("/tmp/relay.db")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }
}
