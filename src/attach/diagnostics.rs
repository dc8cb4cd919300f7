//! Per-attempt and aggregate diagnostics (spec §4.4 "Diagnostics").

use serde::Serialize;

use super::types::AttachStrategy;

#[derive(Debug, Clone, Serialize)]
pub struct AttemptDiagnostic {
    pub strategy: AttachStrategy,
    pub duration_ms: u64,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachDiagnostics {
    pub requested_strategy: AttachStrategy,
    pub selected_strategy: Option<AttachStrategy>,
    pub provider_resolve_ms: u64,
    pub total_ms: u64,
    pub attempts: Vec<AttemptDiagnostic>,
}

impl AttachDiagnostics {
    pub fn new(requested_strategy: AttachStrategy, provider_resolve_ms: u64) -> Self {
        Self {
            requested_strategy,
            selected_strategy: None,
            provider_resolve_ms,
            total_ms: 0,
            attempts: Vec::new(),
        }
    }
}
