//! Wire messages.
//!
//! ```text
//! request   {"method": "Domain.verb", "id": 3, "params": {...}}
//! command   {"method": "Domain.verb", "params": {...}}
//! response  {"id": 3, "result": {...}}  |  {"id": 3, "error": {...}}
//! event     {"method": "EventName", ...fields}
//! ```

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// An outgoing protocol call.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Fire-and-forget; serialized without an `id`.
    Command { method: String, params: Value },
    /// Correlated; the response carries the same `id`.
    Query { id: u64, method: String, params: Value },
}

#[derive(Serialize)]
struct WireRequest<'a> {
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    params: &'a Value,
}

impl Request {
    pub fn method(&self) -> &str {
        match self {
            Self::Command { method, .. } | Self::Query { method, .. } => method,
        }
    }

    pub fn id(&self) -> Option<u64> {
        match self {
            Self::Command { .. } => None,
            Self::Query { id, .. } => Some(*id),
        }
    }

    pub fn params(&self) -> &Value {
        match self {
            Self::Command { params, .. } | Self::Query { params, .. } => params,
        }
    }

    pub fn to_json(&self) -> String {
        let wire = WireRequest {
            method: self.method(),
            id: self.id(),
            params: self.params(),
        };
        // a tree of serde_json values always serializes
        serde_json::to_string(&wire).unwrap_or_default()
    }
}

/// Messages a page may send that the session can't make sense of.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message is not a JSON object")]
    NotObject,
}

/// A classified incoming message.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Carries a non-zero `id`; answers a query.
    Response { id: u64, message: Value, is_error: bool },
    /// No `id`; an unsolicited event named by `method` (`"event"` when absent).
    Event { method: String, message: Value },
}

/// Parse and classify raw message text.
pub fn parse(text: &str) -> Result<Incoming, MessageError> {
    let message: Value = serde_json::from_str(text)?;
    if !message.is_object() {
        return Err(MessageError::NotObject);
    }

    if let Some(id) = response_id(&message) {
        let is_error = message
            .get("error")
            .is_some_and(|e| !matches!(e, Value::Null | Value::Bool(false)));
        return Ok(Incoming::Response {
            id,
            message,
            is_error,
        });
    }

    let method = message
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or("event")
        .to_string();
    Ok(Incoming::Event { method, message })
}

/// `id` counts as present when it is a non-zero integer.
fn response_id(message: &Value) -> Option<u64> {
    message
        .get("id")
        .and_then(Value::as_u64)
        .filter(|id| *id != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_serializes_with_id() {
        let request = Request::Query {
            id: 4,
            method: "Runtime.evaluate".into(),
            params: json!({"expression": "1 + 1"}),
        };
        assert_eq!(
            request.to_json(),
            r#"{"method":"Runtime.evaluate","id":4,"params":{"expression":"1 + 1"}}"#
        );
    }

    #[test]
    fn test_command_serializes_without_id() {
        let request = Request::Command {
            method: "Page.reload".into(),
            params: json!({"ignoreCache": false}),
        };
        let json: Value = serde_json::from_str(&request.to_json()).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["method"], "Page.reload");
    }

    #[test]
    fn test_parse_response() {
        let incoming = parse(r#"{"id":2,"result":{"text":"a{}"}}"#).unwrap();
        assert!(matches!(incoming, Incoming::Response { id: 2, is_error: false, .. }));
    }

    #[test]
    fn test_parse_error_response() {
        let incoming = parse(r#"{"id":2,"error":{"message":"boom"}}"#).unwrap();
        assert!(matches!(incoming, Incoming::Response { id: 2, is_error: true, .. }));

        let incoming = parse(r#"{"id":2,"error":null,"result":{}}"#).unwrap();
        assert!(matches!(incoming, Incoming::Response { is_error: false, .. }));
    }

    #[test]
    fn test_parse_event() {
        let incoming = parse(r#"{"method":"ScriptAdded","src":"a.js"}"#).unwrap();
        let Incoming::Event { method, message } = incoming else {
            panic!("expected event");
        };
        assert_eq!(method, "ScriptAdded");
        assert_eq!(message["src"], "a.js");
    }

    #[test]
    fn test_zero_id_is_an_event() {
        let incoming = parse(r#"{"id":0,"method":"Ping"}"#).unwrap();
        assert!(matches!(incoming, Incoming::Event { ref method, .. } if method == "Ping"));
    }

    #[test]
    fn test_event_without_method() {
        let incoming = parse(r#"{"value":1}"#).unwrap();
        assert!(matches!(incoming, Incoming::Event { ref method, .. } if method == "event"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse("{oops"), Err(MessageError::Json(_))));
        assert!(matches!(parse("[1,2]"), Err(MessageError::NotObject)));
    }
}
