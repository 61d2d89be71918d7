//! Connection accept loop
//!
//! Accepts TCP connections and spawns a handler task per connection.

use std::future::Future;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::handler::handle_connection;
use crate::hub::RoomHub;

/// Accept connections until `shutdown` completes
pub async fn serve(listener: TcpListener, hub: RoomHub, shutdown: impl Future<Output = ()>) {
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let hub = hub.clone();

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, hub).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
            _ = &mut shutdown => {
                info!("Stopped accepting connections");
                return;
            }
        }
    }
}
