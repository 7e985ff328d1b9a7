//! Per-printer connection identity and MQTT topic naming.

use serde::{Deserialize, Serialize};

/// The identity of one printer on the LAN.
///
/// Immutable per call; the communication layer never mutates or persists
/// profiles, it only reads them. Loaded from the appliance's
/// configuration store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    /// Display name, used in logs and user-facing surfaces.
    pub name: String,
    /// IP address or hostname of the printer.
    pub address: String,
    /// The LAN-mode access code printed on the device.
    pub access_code: String,
    /// The printer serial number. Names the MQTT topics when present;
    /// optional so a printer can be driven before its serial is known.
    #[serde(default)]
    pub serial: Option<String>,
}

/// The resolved request/report topic pair for one printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    /// Topic the printer accepts commands on.
    pub request: String,
    /// Topic the printer publishes telemetry reports on.
    pub report: String,
}

impl ConnectionProfile {
    /// Create a profile for a printer with a known serial number.
    pub fn new<S: Into<String>>(name: S, address: S, access_code: S, serial: S) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            access_code: access_code.into(),
            serial: Some(serial.into()),
        }
    }

    /// Resolve the topic pair for this printer.
    ///
    /// Resolves the naming token exactly once, so the degraded-mode
    /// warning below fires at most once per operation.
    pub fn topics(&self) -> Topics {
        let token = self.topic_token();
        Topics {
            request: format!("device/{token}/request"),
            report: format!("device/{token}/report"),
        }
    }

    /// The token naming this printer's MQTT topics.
    ///
    /// Prefers the configured serial number. Without one, falls back to a
    /// topic-safe form of the address and warns: the fallback keeps a
    /// half-configured printer usable during onboarding, but serials
    /// should always be set in production.
    fn topic_token(&self) -> String {
        if let Some(serial) = self.serial.as_deref() {
            if !serial.is_empty() {
                return serial.to_string();
            }
        }

        let token = fallback_token(&self.address);
        tracing::warn!(
            printer = %self.name,
            token = %token,
            "no serial number configured, deriving MQTT topic token from the address"
        );
        token
    }
}

/// Normalize an address into a topic-safe token: every character that is
/// not ASCII alphanumeric becomes an underscore.
fn fallback_token(address: &str) -> String {
    address
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn profile(serial: Option<&str>) -> ConnectionProfile {
        ConnectionProfile {
            name: "workshop".to_string(),
            address: "192.168.1.42".to_string(),
            access_code: "12345678".to_string(),
            serial: serial.map(String::from),
        }
    }

    #[test]
    fn serial_names_the_topics() {
        let topics = profile(Some("00M09A9B0300123")).topics();
        assert_eq!(topics.request, "device/00M09A9B0300123/request");
        assert_eq!(topics.report, "device/00M09A9B0300123/report");
    }

    #[test]
    fn missing_serial_falls_back_to_the_address() {
        let topics = profile(None).topics();
        assert_eq!(topics.request, "device/192_168_1_42/request");
        assert_eq!(topics.report, "device/192_168_1_42/report");
    }

    #[test]
    fn empty_serial_is_treated_as_missing() {
        let topics = profile(Some("")).topics();
        assert_eq!(topics.request, "device/192_168_1_42/request");
    }

    #[test]
    fn fallback_token_normalizes_hostnames() {
        assert_eq!(fallback_token("bambu-p1s.local"), "bambu_p1s_local");
    }
}
