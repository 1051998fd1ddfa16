//! Realtime Protocol
//!
//! Phoenix channel frames as spoken by the backend's realtime service, and
//! decoding of `postgres_changes` events into [`ChangeNotification`]s.

use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::Table;
use crate::error::{DomainError, DomainResult};

pub const PHOENIX_TOPIC: &str = "phoenix";
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

const EVENT_JOIN: &str = "phx_join";
const EVENT_LEAVE: &str = "phx_leave";
const EVENT_REPLY: &str = "phx_reply";
const EVENT_ERROR: &str = "phx_error";
const EVENT_CLOSE: &str = "phx_close";
const EVENT_HEARTBEAT: &str = "heartbeat";
const EVENT_ACCESS_TOKEN: &str = "access_token";
const EVENT_CHANGES: &str = "postgres_changes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row change on one table, with the before/after snapshots the backend sent
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotification {
    pub table: Table,
    pub kind: ChangeKind,
    pub new: Option<Value>,
    pub old: Option<Value>,
}

impl ChangeNotification {
    /// Decodes the `new` snapshot, if any
    pub fn new_as<T: DeserializeOwned>(&self) -> DomainResult<Option<T>> {
        decode_snapshot(self.new.as_ref())
    }

    /// Decodes the `old` snapshot, if any
    pub fn old_as<T: DeserializeOwned>(&self) -> DomainResult<Option<T>> {
        decode_snapshot(self.old.as_ref())
    }
}

fn decode_snapshot<T: DeserializeOwned>(value: Option<&Value>) -> DomainResult<Option<T>> {
    match value {
        Some(value) => Ok(Some(T::deserialize(value)?)),
        None => Ok(None),
    }
}

/// Topic of the channel that carries `table`'s changes
pub fn topic_for(table: Table) -> String {
    format!("realtime:{}", table.channel_name())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    pub payload: Value,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

impl Frame {
    /// Joins the change feed for every event on `public.{table}`
    pub fn join(table: Table, join_ref: &str, access_token: Option<&str>) -> Self {
        let mut payload = json!({
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": "*", "schema": "public", "table": table.as_str() }
                ],
                "private": false
            }
        });
        if let Some(token) = access_token {
            payload["access_token"] = Value::String(token.to_string());
        }
        Self {
            topic: topic_for(table),
            event: EVENT_JOIN.to_string(),
            payload,
            reference: Some(join_ref.to_string()),
            join_ref: Some(join_ref.to_string()),
        }
    }

    pub fn leave(topic: &str, reference: &str, join_ref: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: EVENT_LEAVE.to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: Some(join_ref.to_string()),
        }
    }

    pub fn heartbeat(reference: &str) -> Self {
        Self {
            topic: PHOENIX_TOPIC.to_string(),
            event: EVENT_HEARTBEAT.to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }

    pub fn access_token(topic: &str, token: &str, reference: &str, join_ref: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: EVENT_ACCESS_TOKEN.to_string(),
            payload: json!({ "access_token": token }),
            reference: Some(reference.to_string()),
            join_ref: Some(join_ref.to_string()),
        }
    }

    /// Join, leave, reply, close and error frames belong to one join of a channel
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self.event.as_str(),
            EVENT_JOIN | EVENT_LEAVE | EVENT_REPLY | EVENT_CLOSE | EVENT_ERROR
        )
    }

    pub fn encode(&self) -> DomainResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> DomainResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builds the frame the backend sends for a row change (used by test peers)
    pub fn change(topic: &str, notification: &ChangeNotification) -> Self {
        Self {
            topic: topic.to_string(),
            event: EVENT_CHANGES.to_string(),
            payload: json!({
                "data": {
                    "schema": "public",
                    "table": notification.table.as_str(),
                    "type": notification.kind,
                    "record": notification.new.clone().unwrap_or_else(|| json!({})),
                    "old_record": notification.old.clone().unwrap_or_else(|| json!({})),
                    "errors": null
                },
                "ids": []
            }),
            reference: None,
            join_ref: None,
        }
    }
}

/// Inbound frames, classified
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Change(ChangeNotification),
    Reply {
        reference: Option<String>,
        status: String,
        response: Value,
    },
    /// The server closed or errored the channel
    ChannelDown { event: String, reason: Value },
    /// Presence, system messages and anything else the client does not use
    Other { event: String },
}

#[derive(Deserialize)]
struct ChangesPayload {
    data: ChangeData,
}

#[derive(Deserialize)]
struct ChangeData {
    table: String,
    #[serde(rename = "type")]
    kind: ChangeKind,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

#[derive(Deserialize)]
struct ReplyPayload {
    status: String,
    #[serde(default)]
    response: Value,
}

impl Inbound {
    pub fn classify(frame: Frame) -> DomainResult<Self> {
        match frame.event.as_str() {
            EVENT_CHANGES => {
                let payload: ChangesPayload = serde_json::from_value(frame.payload)?;
                let table: Table = payload.data.table.parse().map_err(|_| {
                    DomainError::Realtime(format!("change for unknown table {}", payload.data.table))
                })?;
                Ok(Inbound::Change(ChangeNotification {
                    table,
                    kind: payload.data.kind,
                    new: non_empty(payload.data.record),
                    old: non_empty(payload.data.old_record),
                }))
            }
            EVENT_REPLY => {
                let payload: ReplyPayload = serde_json::from_value(frame.payload)?;
                Ok(Inbound::Reply {
                    reference: frame.reference,
                    status: payload.status,
                    response: payload.response,
                })
            }
            EVENT_ERROR | EVENT_CLOSE => Ok(Inbound::ChannelDown {
                event: frame.event,
                reason: frame.payload,
            }),
            _ => Ok(Inbound::Other { event: frame.event }),
        }
    }
}

/// The backend sends `{}` for the side of a change that has no row
fn non_empty(value: Option<Value>) -> Option<Value> {
    match value {
        Some(Value::Null) => None,
        Some(Value::Object(map)) if map.is_empty() => None,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_frame_shape() {
        let frame = Frame::join(Table::Spots, "1", Some("jwt"));
        let json: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(json["topic"], "realtime:spots-changes");
        assert_eq!(json["event"], "phx_join");
        assert_eq!(json["ref"], "1");
        assert_eq!(json["join_ref"], "1");
        assert_eq!(json["payload"]["config"]["postgres_changes"][0]["table"], "spots");
        assert_eq!(json["payload"]["config"]["postgres_changes"][0]["event"], "*");
        assert_eq!(json["payload"]["access_token"], "jwt");
    }

    #[test]
    fn test_heartbeat_has_no_join_ref() {
        let json: Value = serde_json::from_str(&Frame::heartbeat("7").encode().unwrap()).unwrap();
        assert_eq!(json["topic"], "phoenix");
        assert!(json.get("join_ref").is_none());
    }

    #[test]
    fn test_classify_delete_change() {
        let text = r#"{
            "topic": "realtime:spots-changes",
            "event": "postgres_changes",
            "ref": null,
            "payload": {
                "data": {
                    "schema": "public",
                    "table": "spots",
                    "type": "DELETE",
                    "commit_timestamp": "2025-01-10T08:00:00Z",
                    "columns": [],
                    "record": {},
                    "old_record": { "id": "00000000-0000-0000-0000-000000000010" },
                    "errors": null
                },
                "ids": [1]
            }
        }"#;
        let inbound = Inbound::classify(Frame::decode(text).unwrap()).unwrap();
        match inbound {
            Inbound::Change(n) => {
                assert_eq!(n.table, Table::Spots);
                assert_eq!(n.kind, ChangeKind::Delete);
                assert!(n.new.is_none());
                assert_eq!(n.old.unwrap()["id"], "00000000-0000-0000-0000-000000000010");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_classify_reply_and_close() {
        let reply = Frame::decode(
            r#"{"topic":"realtime:spots-changes","event":"phx_reply","ref":"1","payload":{"status":"error","response":{"reason":"unauthorized"}}}"#,
        )
        .unwrap();
        assert!(matches!(
            Inbound::classify(reply).unwrap(),
            Inbound::Reply { ref status, .. } if status == "error"
        ));
        let close = Frame::decode(
            r#"{"topic":"realtime:spots-changes","event":"phx_close","ref":null,"payload":{}}"#,
        )
        .unwrap();
        assert!(matches!(Inbound::classify(close).unwrap(), Inbound::ChannelDown { .. }));
    }

    #[test]
    fn test_unknown_table_is_an_error() {
        let frame = Frame::decode(
            r#"{"topic":"realtime:x","event":"postgres_changes","ref":null,"payload":{"data":{"table":"users","type":"INSERT","record":{}}}}"#,
        )
        .unwrap();
        assert!(matches!(Inbound::classify(frame), Err(DomainError::Realtime(_))));
    }
}
