use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outgoing CDP command (client to target).
#[derive(Debug, Serialize)]
pub struct CdpCommand {
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Raw incoming CDP message before classification — the union of every field
/// a response or an event might carry.
#[derive(Debug, Deserialize)]
pub struct RawCdpMessage {
    pub id: Option<u64>,
    pub method: Option<String>,
    pub params: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<CdpProtocolError>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CdpProtocolError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug)]
pub struct CdpResponse {
    pub id: u64,
    pub result: Result<Value, CdpProtocolError>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

pub enum MessageKind {
    Response(CdpResponse),
    Event(CdpEvent),
}

impl RawCdpMessage {
    /// Classify a raw message. An `id` marks a response (error takes
    /// precedence over result); a bare `method` marks an event; neither
    /// is unclassifiable.
    ///
    /// Some WebSocket client libraries additionally emit a duplicate event
    /// with `.undefined` appended to the method name; callers should strip
    /// that suffix before dispatching so subscribers only ever see the
    /// canonical method name (spec §4.1 implementation note).
    #[must_use]
    pub fn classify(mut self) -> Option<MessageKind> {
        if let Some(method) = &self.method {
            if let Some(canonical) = method.strip_suffix(".undefined") {
                self.method = Some(canonical.to_string());
            }
        }
        if let Some(id) = self.id {
            let result = if let Some(error) = self.error {
                Err(error)
            } else {
                Ok(self.result.unwrap_or(Value::Null))
            };
            Some(MessageKind::Response(CdpResponse {
                id,
                result,
                session_id: self.session_id,
            }))
        } else if let Some(method) = self.method {
            Some(MessageKind::Event(CdpEvent {
                method,
                params: self.params.unwrap_or(Value::Null),
                session_id: self.session_id,
            }))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_response() {
        let raw: RawCdpMessage = serde_json::from_str(r#"{"id":1,"result":{"ok":true}}"#).unwrap();
        match raw.classify() {
            Some(MessageKind::Response(r)) => {
                assert_eq!(r.id, 1);
                assert!(r.result.is_ok());
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn classify_error_response() {
        let raw: RawCdpMessage =
            serde_json::from_str(r#"{"id":2,"error":{"code":-32000,"message":"nope"}}"#).unwrap();
        match raw.classify() {
            Some(MessageKind::Response(r)) => assert!(r.result.is_err()),
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn classify_event_strips_undefined_suffix() {
        let raw: RawCdpMessage =
            serde_json::from_str(r#"{"method":"Debugger.paused.undefined","params":{}}"#).unwrap();
        match raw.classify() {
            Some(MessageKind::Event(e)) => assert_eq!(e.method, "Debugger.paused"),
            _ => panic!("expected event"),
        }
    }

    #[test]
    fn classify_unclassifiable_is_none() {
        let raw: RawCdpMessage = serde_json::from_str("{}").unwrap();
        assert!(raw.classify().is_none());
    }

    #[test]
    fn serialize_command_omits_absent_fields() {
        let cmd = CdpCommand {
            id: 1,
            method: "Target.getTargets".into(),
            params: None,
            session_id: None,
        };
        let v = serde_json::to_value(&cmd).unwrap();
        assert!(v.get("params").is_none());
        assert!(v.get("sessionId").is_none());
        let cmd = CdpCommand {
            id: 2,
            method: "Page.navigate".into(),
            params: Some(json!({"url": "http://x"})),
            session_id: Some("s1".into()),
        };
        let v = serde_json::to_value(&cmd).unwrap();
        assert_eq!(v["sessionId"], "s1");
    }
}
