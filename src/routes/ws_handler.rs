use axum::extract::ws::{Message, WebSocket};
use sensor_feed::ViewUpdate;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Pushes the current view, then one message per engine refresh, until
/// either side goes away.
pub async fn handle_ws_updates(mut socket: WebSocket, mut updates: watch::Receiver<ViewUpdate>) {
    info!("View stream opened");
    let mut seq: u64 = 0;

    loop {
        let payload = {
            let view = updates.borrow_and_update();
            serde_json::to_string(&*view)
        };

        let text = match payload {
            Ok(text) => text,
            Err(e) => {
                warn!("View serialization failed: {}", e);
                break;
            }
        };

        if socket.send(Message::Text(text.into())).await.is_err() {
            debug!("Client disconnected after {} messages", seq);
            break;
        }
        seq += 1;

        // client frames are ignored apart from close
        let open = loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        info!("Engine stopped, closing view stream");
                        let _ = socket.send(Message::Close(None)).await;
                        break false;
                    }
                    break true;
                }
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break false,
                    Some(Ok(_)) => {}
                },
            }
        };
        if !open {
            break;
        }
    }

    info!("View stream closed after {} messages", seq);
}
