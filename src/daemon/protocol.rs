//! Command socket wire format (spec §4.5/§6): line-delimited JSON request/response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub cmd: String,
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default)]
    pub s: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "errorCode", default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(flatten)]
    pub body: Value,
}

impl Response {
    pub fn ok(body: Value) -> Self {
        Self {
            ok: true,
            error: None,
            error_code: None,
            body,
        }
    }

    pub fn err(error: String, error_code: &str) -> Self {
        Self {
            ok: false,
            error: Some(error),
            error_code: Some(error_code.to_string()),
            body: Value::Null,
        }
    }

    pub fn invalid_json() -> Self {
        Self {
            ok: false,
            error: Some("invalid JSON".to_string()),
            error_code: None,
            body: Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_response_flattens_body_fields() {
        let r = Response::ok(serde_json::json!({"sessions": ["s0"]}));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["ok"], true);
        assert_eq!(v["sessions"], serde_json::json!(["s0"]));
        assert!(v.get("error").is_none());
    }

    #[test]
    fn err_response_carries_camel_case_error_code() {
        let r = Response::err("boom".into(), "INTERNAL");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["ok"], false);
        assert_eq!(v["error"], "boom");
        assert_eq!(v["errorCode"], "INTERNAL");
    }

    #[test]
    fn request_parses_minimal_line() {
        let r: Request = serde_json::from_str(r#"{"cmd":"list"}"#).unwrap();
        assert_eq!(r.cmd, "list");
        assert!(r.args.is_none());
        assert!(r.s.is_none());
    }
}
