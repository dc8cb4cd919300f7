//! Target discovery (`/json` HTTP endpoint) and best-effort domain enable.

use serde::Deserialize;
use tokio::time::Duration;

use crate::error::{Error, Result};

use super::client::CdpClient;

#[derive(Debug, Clone, Deserialize)]
pub struct TargetInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub ws_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Node,
    Page,
}

impl TargetKind {
    fn matches(self, raw: &str) -> bool {
        match self {
            TargetKind::Node => raw == "node",
            TargetKind::Page => raw == "page",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "node" => Ok(TargetKind::Node),
            "page" => Ok(TargetKind::Page),
            other => Err(Error::InvalidRequest(format!("unknown target type: {other} (expected node or page)"))),
        }
    }
}

/// Fetch `http://host:port/json` and return the targets reported there.
pub async fn discover_targets(host: &str, port: u16) -> Result<Vec<TargetInfo>> {
    let url = format!("http://{host}:{port}/json");
    let client = reqwest::Client::new();
    let body = client
        .get(&url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .map_err(|e| Error::TransportClosed(format!("discovery request to {url} failed: {e}")))?
        .text()
        .await
        .map_err(|e| Error::ProtocolJsonInvalid(format!("reading discovery body: {e}")))?;
    serde_json::from_str(&body)
        .map_err(|e| Error::ProtocolJsonInvalid(format!("parsing /json response: {e}")))
}

/// Pick a WebSocket debugger URL among discovered targets: explicit `target_id`
/// wins if present; else an explicit `--type` restricts to that kind; else
/// prefer `node`, then `page` (spec §4.1/§4.5).
pub fn pick_target(targets: &[TargetInfo], target_id: Option<&str>, kind: Option<TargetKind>) -> Result<String> {
    if let Some(id) = target_id {
        return targets
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.ws_url.clone())
            .ok_or_else(|| Error::InvalidRequest(format!("no target with id {id}")));
    }
    if let Some(kind) = kind {
        return targets
            .iter()
            .find(|t| kind.matches(&t.kind))
            .map(|t| t.ws_url.clone())
            .ok_or_else(|| Error::InvalidRequest(format!("no {kind:?} target available")));
    }
    for preferred in [TargetKind::Node, TargetKind::Page] {
        if let Some(t) = targets.iter().find(|t| preferred.matches(&t.kind)) {
            return Ok(t.ws_url.clone());
        }
    }
    Err(Error::InvalidRequest(
        "no node or page target available for auto-detect".into(),
    ))
}

/// Best-effort per-domain enable: each domain gets a short timeout and
/// failure is tolerated (spec §4.1 — "unsupported domains must be enabled
/// best-effort ... tolerant of failure").
pub async fn enable_domains_best_effort(client: &CdpClient, domains: &[&str]) {
    const PER_DOMAIN_TIMEOUT: Duration = Duration::from_millis(750);
    for domain in domains {
        let method = format!("{domain}.enable");
        match client
            .send_command_with_timeout(&method, None, PER_DOMAIN_TIMEOUT)
            .await
        {
            Ok(_) => tracing::debug!(domain, "enabled cdp domain"),
            Err(e) => tracing::debug!(domain, error = %e, "domain enable failed, continuing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: &str, kind: &str) -> TargetInfo {
        TargetInfo {
            id: id.into(),
            kind: kind.into(),
            ws_url: format!("ws://127.0.0.1/{id}"),
            title: String::new(),
            url: String::new(),
        }
    }

    #[test]
    fn pick_target_prefers_node_over_page() {
        let targets = vec![target("a", "page"), target("b", "node")];
        let picked = pick_target(&targets, None, None).unwrap();
        assert_eq!(picked, "ws://127.0.0.1/b");
    }

    #[test]
    fn pick_target_falls_back_to_page() {
        let targets = vec![target("a", "page")];
        let picked = pick_target(&targets, None, None).unwrap();
        assert_eq!(picked, "ws://127.0.0.1/a");
    }

    #[test]
    fn pick_target_honors_explicit_id() {
        let targets = vec![target("a", "page"), target("b", "node")];
        let picked = pick_target(&targets, Some("a"), None).unwrap();
        assert_eq!(picked, "ws://127.0.0.1/a");
    }

    #[test]
    fn pick_target_errors_when_nothing_matches() {
        let targets = vec![target("a", "worker")];
        assert!(pick_target(&targets, None, None).is_err());
    }

    #[test]
    fn pick_target_honors_explicit_type_over_default_preference() {
        let targets = vec![target("a", "page"), target("b", "node")];
        let picked = pick_target(&targets, None, Some(TargetKind::Page)).unwrap();
        assert_eq!(picked, "ws://127.0.0.1/a");
    }
}
