//! Command line and environment configuration

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:3030";

/// Default bound on draining pending saves at shutdown, in seconds
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Parser)]
#[command(name = "chatroom_relay", version, about = "Multi-room WebSocket chat relay")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the WebSocket relay
    Serve(ServeArgs),
    /// Create a persisted chat room and print its details as JSON
    CreateRoom(CreateRoomArgs),
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    /// SQLite database URL; the in-memory store is used when absent
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "CHATROOM_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// Seconds to wait for pending message saves on shutdown
    #[arg(long, env = "CHATROOM_SHUTDOWN_TIMEOUT", default_value_t = DEFAULT_SHUTDOWN_TIMEOUT_SECS)]
    pub shutdown_timeout_secs: u64,

    #[command(flatten)]
    pub store: StoreArgs,
}

impl ServeArgs {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Args)]
pub struct CreateRoomArgs {
    /// Room display name
    #[arg(long)]
    pub name: String,

    /// Optional invite code (stored hashed, case-insensitive)
    #[arg(long)]
    pub invite_code: Option<String>,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["chatroom_relay", "serve"]).unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("Wrong subcommand");
        };
        assert_eq!(args.shutdown_timeout(), Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS));
    }

    #[test]
    fn test_create_room_args() {
        let cli = Cli::try_parse_from([
            "chatroom_relay",
            "create-room",
            "--name",
            "Lobby",
            "--invite-code",
            "abc",
            "--database-url",
            "sqlite://chat.db",
        ])
        .unwrap();
        let Command::CreateRoom(args) = cli.command else {
            panic!("Wrong subcommand");
        };
        assert_eq!(args.name, "Lobby");
        assert_eq!(args.invite_code.as_deref(), Some("abc"));
        assert_eq!(args.store.database_url.as_deref(), Some("sqlite://chat.db"));
    }
}
