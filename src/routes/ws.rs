use rocket::futures::{SinkExt, StreamExt};
use rocket::{State, get};
use rocket_ws as ws;

use crate::error::{ApiError, GroupError};
use crate::registry::GroupRegistry;

/// WebSocket terminator for one group subscription. The actor hands back a
/// snapshot plus its event stream; this task relays frames in emission order
/// and tears the subscription down when either side goes away.
#[get("/groups/<group_id>/ws")]
pub async fn group_stream(
    registry: &State<GroupRegistry>,
    group_id: &str,
    ws: ws::WebSocket,
) -> Result<ws::Channel<'static>, ApiError> {
    let Some(handle) = registry.lookup(group_id).await else {
        return Err(GroupError::not_found("Group not found").into_response());
    };
    let (snapshot, mut events) = handle
        .subscribe()
        .await
        .map_err(GroupError::into_response)?;

    Ok(ws.channel(move |mut stream| {
        Box::pin(async move {
            let first = serde_json::to_string(&snapshot).unwrap_or_default();
            if stream.send(ws::Message::Text(first)).await.is_err() {
                return Ok(());
            }
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(event) => {
                            let frame = serde_json::to_string(&event).unwrap_or_default();
                            if stream.send(ws::Message::Text(frame)).await.is_err() {
                                // Receiver drop unsubscribes us from the actor.
                                break;
                            }
                        }
                        None => {
                            // The actor dropped this subscription.
                            let _ = stream
                                .close(Some(ws::frame::CloseFrame {
                                    code: ws::frame::CloseCode::Error,
                                    reason: "subscription dropped".into(),
                                }))
                                .await;
                            break;
                        }
                    },
                    incoming = stream.next() => match incoming {
                        Some(Ok(ws::Message::Close(_))) | Some(Err(_)) | None => break,
                        // Clients only listen; ignore pings and chatter.
                        Some(Ok(_)) => {}
                    },
                }
            }
            Ok(())
        })
    }))
}
