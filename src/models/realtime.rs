use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::error::{Brutal24Error, Result};
use crate::models::comment::Comment;
use crate::models::post::Post;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const POSTS_TOPIC: &str = "realtime:posts_changes";
pub const COMMENTS_TOPIC: &str = "realtime:comments_changes";

/// Row-level change pushed by the backend.
#[derive(Clone, Debug, PartialEq)]
pub enum RealtimeEvent {
    PostInserted(Post),
    PostUpdated(Post),
    PostDeleted { id: String },
    CommentInserted(Comment),
}

#[derive(Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct Change {
    table: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    record: Value,
    #[serde(default)]
    old_record: Value,
}

/// Decodes one Phoenix frame. Frames that carry no row change (replies,
/// heartbeats, presence) decode to `None`.
pub fn parse_frame(text: &str) -> Result<Option<RealtimeEvent>> {
    let frame: Frame = serde_json::from_str(text)?;
    if frame.event != "postgres_changes" {
        return Ok(None);
    }

    let data = frame
        .payload
        .get("data")
        .cloned()
        .ok_or_else(|| Brutal24Error::Realtime("postgres_changes frame without data".to_string()))?;
    let change: Change = serde_json::from_value(data)?;

    let event = match (change.table.as_str(), change.kind.as_str()) {
        ("posts", "INSERT") => RealtimeEvent::PostInserted(serde_json::from_value(change.record)?),
        ("posts", "UPDATE") => RealtimeEvent::PostUpdated(serde_json::from_value(change.record)?),
        ("posts", "DELETE") => {
            let id = change
                .old_record
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| Brutal24Error::Realtime("DELETE without old_record.id".to_string()))?;
            RealtimeEvent::PostDeleted { id: id.to_string() }
        }
        ("comments", "INSERT") => RealtimeEvent::CommentInserted(serde_json::from_value(change.record)?),
        _ => return Ok(None),
    };

    Ok(Some(event))
}

/// Subscription to the hosted realtime socket.
pub struct RealtimeChannel {
    socket_url: Url,
    api_key: String,
}

impl RealtimeChannel {
    pub fn new(supabase_url: &str, api_key: &str) -> Result<Self> {
        let mut socket_url = Url::parse(supabase_url)?.join("realtime/v1/websocket")?;
        let scheme = if socket_url.scheme() == "http" { "ws" } else { "wss" };
        socket_url
            .set_scheme(scheme)
            .map_err(|_| Brutal24Error::Config(format!("Cannot derive websocket url from {}", supabase_url)))?;
        socket_url
            .query_pairs_mut()
            .append_pair("apikey", api_key)
            .append_pair("vsn", "1.0.0");

        Ok(Self {
            socket_url,
            api_key: api_key.to_string(),
        })
    }

    pub fn socket_url(&self) -> &Url {
        &self.socket_url
    }

    fn join_frames(&self) -> [Value; 2] {
        let join = |topic: &str, changes: Value, reference: &str| {
            json!({
                "topic": topic,
                "event": "phx_join",
                "payload": {
                    "config": {
                        "broadcast": { "self": false },
                        "presence": { "key": "" },
                        "postgres_changes": changes,
                    },
                    "access_token": self.api_key,
                },
                "ref": reference,
                "join_ref": reference,
            })
        };

        [
            join(
                POSTS_TOPIC,
                json!([
                    { "event": "INSERT", "schema": "public", "table": "posts" },
                    { "event": "UPDATE", "schema": "public", "table": "posts" },
                    { "event": "DELETE", "schema": "public", "table": "posts" },
                ]),
                "1",
            ),
            join(
                COMMENTS_TOPIC,
                json!([{ "event": "INSERT", "schema": "public", "table": "comments" }]),
                "2",
            ),
        ]
    }

    /// Streams decoded events into `tx` until the socket closes or the
    /// receiving side goes away.
    pub async fn run(self, tx: mpsc::UnboundedSender<RealtimeEvent>) -> Result<()> {
        let (socket, _) = connect_async(self.socket_url.as_str()).await?;
        let (mut sink, mut stream) = socket.split();
        log::info!("Realtime connected to {}", self.socket_url.host_str().unwrap_or_default());

        for frame in self.join_frames() {
            sink.send(Message::Text(frame.to_string())).await?;
        }

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut next_ref: u64 = 3;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let beat = json!({
                        "topic": "phoenix",
                        "event": "heartbeat",
                        "payload": {},
                        "ref": next_ref.to_string(),
                    });
                    next_ref += 1;
                    sink.send(Message::Text(beat.to_string())).await?;
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => match parse_frame(&text) {
                        Ok(Some(event)) => {
                            if tx.send(event).is_err() {
                                return Ok(());
                            }
                        }
                        Ok(None) => {}
                        Err(e) => log::warn!("Skipping malformed realtime frame: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        return Err(Brutal24Error::Realtime("socket closed".to_string()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                },
            }
        }
    }
}

/// Relays the in-memory backend's change feed, for offline sessions.
pub async fn forward_local(
    mut rx: broadcast::Receiver<RealtimeEvent>,
    tx: mpsc::UnboundedSender<RealtimeEvent>,
) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if tx.send(event).is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("Realtime relay skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
