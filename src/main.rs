//! Multi-room WebSocket Chat Relay - Entry Point
//!
//! `serve` starts the listener, the room hub and the persistence worker.
//! `create-room` registers a persisted room and prints it as JSON.

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chatroom_relay::config::{Cli, Command, CreateRoomArgs, ServeArgs};
use chatroom_relay::{create_chat_room, open_store, serve, CreateChatRoom, PersistHandle, RoomHub};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chatroom_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chatroom_relay=info")),
        )
        .init();

    match Cli::parse().command {
        Command::Serve(args) => run_server(args).await,
        Command::CreateRoom(args) => run_create_room(args).await,
    }
}

async fn run_server(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(args.store.database_url.as_deref()).await?;
    let persist = PersistHandle::spawn(store);
    let hub = RoomHub::new(persist.clone());

    let listener = TcpListener::bind(&args.addr).await?;
    info!("WebSocket Chat Relay listening on {}", args.addr);

    serve(listener, hub, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;

    info!("Gracefully shutting down ...");
    let dropped = persist.shutdown(args.shutdown_timeout()).await;
    if dropped > 0 {
        info!("{} pending messages were not saved", dropped);
    }
    info!("Graceful shutdown completed");

    Ok(())
}

async fn run_create_room(args: CreateRoomArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(args.store.database_url.as_deref()).await?;
    let created = create_chat_room(
        &*store,
        CreateChatRoom {
            name: args.name,
            invite_code: args.invite_code,
        },
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&created)?);
    Ok(())
}
