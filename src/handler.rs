//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake with room
//! selection, the reader loop feeding the room, and the writer task
//! draining the member channel back to the socket.

use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{StatusCode, Uri};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};

use crate::client::Member;
use crate::error::AppError;
use crate::hub::RoomHub;
use crate::message::IncomingMsg;
use crate::room::RoomHandle;
use crate::types::{ClientId, RoomId};

/// Path prefix for room-scoped WebSocket endpoints
const CHAT_PATH_PREFIX: &str = "/websocket/chat/";

/// Query parameter naming the room
const ROOM_ID_PARAM: &str = "roomId";

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, joins the requested room, relays
/// messages until either side closes, then leaves the room exactly once.
pub async fn handle_connection(stream: TcpStream, hub: RoomHub) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake; the room ID must be known before upgrading
    let mut requested = None;
    let accepted = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            match room_id_from_uri(req.uri()) {
                Some(room_id) => {
                    requested = Some(room_id);
                    Ok(resp)
                }
                None => Err(reject("missing roomId")),
            }
        },
    )
    .await;

    let (ws_stream, room_id) = match (accepted, requested) {
        (Ok(ws_stream), Some(room_id)) => (ws_stream, room_id),
        (Err(e), Some(_)) => return Err(e.into()),
        _ => {
            warn!("Rejected connection from {}: missing room id", peer_addr);
            return Err(AppError::MissingRoomId);
        }
    };
    let (mut ws_sender, ws_receiver) = ws_stream.split();

    let (member, mut msg_rx) = Member::channel();
    let client_id = member.id;
    let membership = hub.join(&room_id, member).await;
    info!(room_id = %room_id, client_id = %client_id, "Client connected from {}", peer_addr);

    // Write task (ChatMsg -> WebSocket). Ends once the room drops the member.
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                }
            }
        }
        debug!("Write task ended for client");

        let _ = ws_sender.close().await;
    });

    // Read until the socket closes, errors or sends garbage
    let outcome = tokio::select! {
        res = read_loop(client_id, membership.room(), ws_receiver) => res,
        _ = &mut write_task => {
            debug!("Write task completed for {}", client_id);
            Ok(())
        }
    };

    membership.leave();

    match &outcome {
        Ok(()) => info!(room_id = %room_id, client_id = %client_id, "Client disconnected"),
        Err(e) => info!(
            room_id = %room_id,
            client_id = %client_id,
            "Client disconnected: {}", e
        ),
    }

    outcome
}

/// Forward inbound frames to the room until the stream ends
///
/// A close frame or end of stream is a normal exit. Read errors and
/// malformed payloads end the loop with an error; the caller leaves the
/// room either way.
pub async fn read_loop<S>(
    client_id: ClientId,
    room: &RoomHandle,
    mut incoming: S,
) -> Result<(), AppError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(frame) = incoming.next().await {
        let msg = match frame? {
            Message::Text(text) => IncomingMsg::from_slice(text.as_bytes()),
            Message::Binary(data) => IncomingMsg::from_slice(&data),
            Message::Close(_) => {
                debug!("Client {} sent close frame", client_id);
                break;
            }
            // Pong is handled automatically by tungstenite
            _ => continue,
        };

        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!(client_id = %client_id, "Invalid JSON, closing connection: {}", e);
                return Err(e.into());
            }
        };

        room.dispatch(msg)?;
    }

    debug!("Read loop ended for {}", client_id);
    Ok(())
}

/// Extract the room ID from `/websocket/chat/{roomId}` or `?roomId=`
pub fn room_id_from_uri(uri: &Uri) -> Option<RoomId> {
    if let Some(segment) = uri.path().strip_prefix(CHAT_PATH_PREFIX) {
        if let Some(room_id) = RoomId::parse(segment.trim_end_matches('/')) {
            return Some(room_id);
        }
    }

    uri.query()?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == ROOM_ID_PARAM)
        .and_then(|(_, value)| RoomId::parse(value))
}

fn reject(reason: &str) -> ErrorResponse {
    let mut resp = ErrorResponse::new(Some(reason.to_string()));
    *resp.status_mut() = StatusCode::BAD_REQUEST;
    resp
}
