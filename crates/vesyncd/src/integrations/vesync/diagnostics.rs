//! Redacted device dumps for logs and the diagnostics endpoint.

use serde_json::Value;
use serde_json::json;

use super::capabilities::CapabilityLookup;
use super::device::DeviceRecord;
use super::device::DeviceSnapshot;

/// Keys whose values never leave the process unredacted.
pub const TO_REDACT: &[&str] = &["cid", "uuid", "mac_id"];

const REDACTED: &str = "**REDACTED**";

/// Replace every redacted key, at any depth, with a placeholder.
pub fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if TO_REDACT.contains(&key.as_str()) {
                    *v = Value::String(REDACTED.to_string());
                } else {
                    redact(v);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

fn redacted_record(device: &DeviceRecord) -> Value {
    let mut value = serde_json::to_value(device).unwrap_or(Value::Null);
    redact(&mut value);
    value
}

/// The whole snapshot, one list per family, with identifiers redacted.
pub fn redacted_snapshot(snapshot: &DeviceSnapshot) -> Value {
    let mut value = serde_json::to_value(snapshot).unwrap_or(Value::Null);
    redact(&mut value);
    value
}

/// Diagnostics payload for one integration entry.
///
/// Devices are grouped by family, except that fans driven by a humidifier
/// module are listed under `humidifier`.
pub fn entry_diagnostics(snapshot: &DeviceSnapshot, caps: &dyn CapabilityLookup) -> Value {
    let mut out = serde_json::Map::new();
    for (family, device) in snapshot.iter() {
        let is_humidifier = caps
            .fan_features(&device.device_type)
            .is_some_and(|f| f.is_humidifier());
        let key = if is_humidifier {
            "humidifier".to_string()
        } else {
            family.to_string()
        };

        let entry = out.entry(key).or_insert_with(|| json!([]));
        if let Value::Array(devices) = entry {
            devices.push(redacted_record(device));
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::vesync::capabilities::StaticCapabilities;
    use crate::integrations::vesync::device::fixtures::*;

    #[test]
    fn test_redact_nested() {
        let mut value = json!({
            "cid": "secret",
            "name": "kept",
            "children": [{"uuid": "u1", "mac_id": "m1", "power": 3}]
        });
        redact(&mut value);

        assert_eq!(
            value,
            json!({
                "cid": "**REDACTED**",
                "name": "kept",
                "children": [{"uuid": "**REDACTED**", "mac_id": "**REDACTED**", "power": 3}]
            })
        );
    }

    #[test]
    fn test_snapshot_dump_hides_identifiers() {
        let mut outlet = device("c-secret", "ESW15-USA");
        outlet.device_name = "Desk plug".to_string();
        let snapshot = DeviceSnapshot {
            outlets: vec![outlet],
            ..Default::default()
        };
        let value = redacted_snapshot(&snapshot);
        assert_eq!(value["outlets"][0]["cid"], "**REDACTED**");
        assert_eq!(value["outlets"][0]["uuid"], "**REDACTED**");

        let dump = value.to_string();
        assert!(!dump.contains("c-secret"));
        assert!(!dump.contains("aa:bb:cc"));
        assert!(dump.contains("ESW15-USA"));
    }

    #[test]
    fn test_entry_diagnostics_groups_humidifiers() {
        let snapshot = DeviceSnapshot {
            fans: vec![device("h1", "Classic300S"), device("p1", "Core200S")],
            bulbs: vec![device("b1", "ESL100")],
            ..Default::default()
        };
        let diag = entry_diagnostics(&snapshot, &StaticCapabilities);

        assert_eq!(diag["humidifier"].as_array().map(Vec::len), Some(1));
        assert_eq!(diag["fans"].as_array().map(Vec::len), Some(1));
        assert_eq!(diag["bulbs"][0]["device_type"], "ESL100");
        assert_eq!(diag["bulbs"][0]["cid"], "**REDACTED**");
        assert!(diag.get("kitchen").is_none());
    }
}
