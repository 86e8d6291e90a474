use axum::{
    debug_handler,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};

use crate::{actor::HubHandle, events::{Outbound, Request}, hub::Discard, presence::ConnId};

#[debug_handler(state = crate::AppState)]
pub async fn chat_ws(
    State(hub): State<HubHandle>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(async move |stream| serve_socket(hub, stream).await)
}

async fn serve_socket(hub: HubHandle, stream: WebSocket) {
    let conn = ConnId::new();
    let mut outbox = hub.connect(conn);
    let (mut sender, mut receiver) = stream.split();

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbox.recv().await {
            let event = match frame {
                Outbound::Event(event) => event,
                Outbound::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(%conn, %err, "could not encode event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let inbound = hub.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            match Request::parse(text.as_str()) {
                Ok(request) => inbound.send(conn, request),
                Err(err) => tracing::debug!(%conn, reason = %Discard::Malformed, %err, "request discarded"),
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    };

    hub.disconnect(conn);
}
