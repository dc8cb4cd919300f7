//! Adaptive attach command timeout (spec §9 open question — formula kept
//! verbatim: `base * attempts + 30s`).

use std::time::Duration;

const DEFAULT_BASE: Duration = Duration::from_secs(30);
const SLACK: Duration = Duration::from_secs(30);

/// `base` is the per-strategy timeout carried on the request (or
/// [`DEFAULT_BASE`] if unset); `attempts` is the number of strategies the
/// resolved strategy order will try.
pub fn command_timeout(base: Option<Duration>, attempts: usize) -> Duration {
    let base = base.unwrap_or(DEFAULT_BASE);
    base * attempts.max(1) as u32 + SLACK
}
