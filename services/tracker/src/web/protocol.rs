//! services/tracker/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between a client and the server for
//! live feeds. A client subscribes to one feed at a time and receives the full
//! record list every time it changes.

use employee_tracker_core::domain::EntityId;
use employee_tracker_core::sync::FeedSource;
use serde::{Deserialize, Serialize};
use serde_json::Value;

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Replaces the current subscription, if any, with `feed`.
    Subscribe { feed: FeedRequest },

    /// Stops the current subscription.
    Unsubscribe,
}

/// The feeds a client can follow.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum FeedRequest {
    Employees,
    Users,
    Tasks {
        #[serde(default)]
        employee_id: Option<EntityId>,
    },
    Reviews {
        #[serde(default)]
        employee_id: Option<EntityId>,
    },
    Messages { user_id: EntityId },
    Conversation { user_id: EntityId, other_id: EntityId },
    Attendance {
        #[serde(default)]
        employee_id: Option<EntityId>,
        #[serde(default)]
        date: Option<String>,
    },
}

impl FeedRequest {
    /// Short name used in logs and in `Snapshot` messages.
    pub fn label(&self) -> &'static str {
        match self {
            FeedRequest::Employees => "employees",
            FeedRequest::Users => "users",
            FeedRequest::Tasks { .. } => "tasks",
            FeedRequest::Reviews { .. } => "reviews",
            FeedRequest::Messages { .. } => "messages",
            FeedRequest::Conversation { .. } => "conversation",
            FeedRequest::Attendance { .. } => "attendance",
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms that a subscription was opened.
    Subscribed { feed: String },

    /// The full record list of the subscribed feed.
    Snapshot {
        feed: String,
        source: FeedSource,
        records: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_error: Option<String>,
    },

    /// Reports an error to the client. The connection stays open.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscribe_messages_parse_with_camel_case_fields() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"subscribe","feed":{"kind":"conversation","userId":1,"otherId":2}}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Subscribe { feed } => {
                assert_eq!(feed, FeedRequest::Conversation { user_id: 1, other_id: 2 });
                assert_eq!(feed.label(), "conversation");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn optional_filters_may_be_omitted() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"subscribe","feed":{"kind":"tasks"}}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Subscribe { feed: FeedRequest::Tasks { employee_id: None } }
        ));
    }

    #[test]
    fn snapshot_omits_a_missing_error() {
        let msg = ServerMessage::Snapshot {
            feed: "tasks".to_string(),
            source: FeedSource::Local,
            records: json!([]),
            last_error: None,
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "snapshot", "feed": "tasks", "source": "local", "records": []})
        );
    }
}
