//! Strategy ordering (spec §4.4 "Strategy order").

use crate::error::{Error, Result};

use super::types::{AttachEnvironment, AttachStrategy, ProviderResolutionResult};

/// Compute the ordered list of strategies to attempt for a resolved target.
/// A simulator target only ever tries `device-process`; an explicit
/// `gdb-remote` request against a simulator is a fatal, immediate error.
pub fn strategy_order(
    requested: AttachStrategy,
    resolution: &ProviderResolutionResult,
) -> Result<Vec<AttachStrategy>> {
    match resolution.attach_environment {
        AttachEnvironment::Simulator => {
            if requested == AttachStrategy::GdbRemote {
                return Err(Error::InvalidRequest(
                    "gdb-remote attach is only supported for physical devices".into(),
                ));
            }
            Ok(vec![AttachStrategy::DeviceProcess])
        }
        AttachEnvironment::Device => Ok(match requested {
            AttachStrategy::Auto => vec![AttachStrategy::DeviceProcess, AttachStrategy::GdbRemote],
            AttachStrategy::DeviceProcess => vec![AttachStrategy::DeviceProcess],
            AttachStrategy::GdbRemote => vec![AttachStrategy::GdbRemote],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolution(env: AttachEnvironment) -> ProviderResolutionResult {
        ProviderResolutionResult {
            provider: "apple".into(),
            platform: "ios".into(),
            device_id: "dev1".into(),
            bundle_id: "com.example.app".into(),
            pid: Some(42),
            attach_protocol: "dap".into(),
            attach_environment: env,
            metadata: json!({}),
        }
    }

    #[test]
    fn simulator_always_uses_device_process() {
        let r = resolution(AttachEnvironment::Simulator);
        assert_eq!(
            strategy_order(AttachStrategy::Auto, &r).unwrap(),
            vec![AttachStrategy::DeviceProcess]
        );
    }

    #[test]
    fn simulator_rejects_explicit_gdb_remote() {
        let r = resolution(AttachEnvironment::Simulator);
        assert!(strategy_order(AttachStrategy::GdbRemote, &r).is_err());
    }

    #[test]
    fn physical_auto_tries_device_process_then_gdb_remote() {
        let r = resolution(AttachEnvironment::Device);
        assert_eq!(
            strategy_order(AttachStrategy::Auto, &r).unwrap(),
            vec![AttachStrategy::DeviceProcess, AttachStrategy::GdbRemote]
        );
    }

    #[test]
    fn physical_explicit_strategy_is_singleton() {
        let r = resolution(AttachEnvironment::Device);
        assert_eq!(
            strategy_order(AttachStrategy::GdbRemote, &r).unwrap(),
            vec![AttachStrategy::GdbRemote]
        );
    }
}
