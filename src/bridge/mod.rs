pub mod adb;
pub mod devices;

pub use adb::Adb;
pub use devices::{Device, DeviceState};

use crate::events::{EventEmitter, MirrorEvent};

/// List attached devices, reporting failures to the event sink.
///
/// Any adb failure yields an empty list; use [`Adb::devices`] to tell "no
/// devices" apart from "adb failed".
pub async fn list_devices(adb: &Adb, events: &EventEmitter) -> Vec<Device> {
    let devices = match adb.devices().await {
        Ok(devices) => devices,
        Err(e) => {
            events.warn(format!("Device scan failed: {}", e));
            Vec::new()
        }
    };

    events.emit(MirrorEvent::DevicesScanned {
        devices: devices.clone(),
    });
    devices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogLevel;
    use crate::testing::ScriptedRunner;
    use std::sync::Arc;

    async fn scan(runner: Arc<ScriptedRunner>) -> (Vec<Device>, Vec<MirrorEvent>) {
        let adb = Adb::new(runner, &ScriptedRunner::config());
        let events = EventEmitter::default();
        let mut rx = events.subscribe();

        let devices = list_devices(&adb, &events).await;

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        (devices, seen)
    }

    fn has_scan_warning(events: &[MirrorEvent]) -> bool {
        events.iter().any(|e| {
            matches!(e, MirrorEvent::Log { level: LogLevel::Warn, message }
                if message.starts_with("Device scan failed"))
        })
    }

    #[tokio::test]
    async fn test_timeout_yields_empty_list_and_warning() {
        let runner = ScriptedRunner::new();
        runner.timeout("adb devices");

        let (devices, events) = scan(runner).await;
        assert!(devices.is_empty());
        assert!(has_scan_warning(&events));
        assert!(events.iter().any(|e| matches!(
            e,
            MirrorEvent::DevicesScanned { devices } if devices.is_empty()
        )));
    }

    #[tokio::test]
    async fn test_missing_adb_yields_empty_list_and_warning() {
        let runner = ScriptedRunner::new();
        runner.not_found("adb devices");

        let (devices, events) = scan(runner).await;
        assert!(devices.is_empty());
        assert!(has_scan_warning(&events));
    }

    #[tokio::test]
    async fn test_successful_scan_has_no_warning() {
        let runner = ScriptedRunner::new();
        runner.respond("adb devices", 0, "List of devices attached\nAAA\tdevice\n", "");

        let (devices, events) = scan(runner).await;
        assert_eq!(devices.len(), 1);
        assert!(!has_scan_warning(&events));
    }
}
