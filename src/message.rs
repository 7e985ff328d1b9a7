//! Inbound telemetry from the printer's report topic.
//!
//! The printer publishes loosely-typed nested JSON. Every field here is
//! optional and unknown fields are retained, because firmware revisions
//! add and drop keys freely; the strongly-typed view lives in [`crate::ams`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The telemetry envelope published on the report topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// The print status block. Absent on non-print reports.
    pub print: Option<PrintStatus>,
    #[serde(flatten)]
    other: BTreeMap<String, Value>,
}

impl Report {
    /// Whether this report carries an AMS block, i.e. qualifies as the
    /// answer to a filament status query.
    pub fn has_ams(&self) -> bool {
        self.print.as_ref().is_some_and(|print| print.ams.is_some())
    }
}

/// The print status block of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintStatus {
    /// The AMS subsystem block.
    pub ams: Option<AmsReport>,
    /// The command this report answers, when it answers one.
    pub command: Option<String>,
    /// Sequence id echoed from the request. Strings and integers both
    /// occur in the wild, so it is kept raw.
    pub sequence_id: Option<Value>,
    #[serde(flatten)]
    other: BTreeMap<String, Value>,
}

/// The AMS block: the attached units and their aggregate state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmsReport {
    /// One entry per attached AMS unit.
    pub ams: Option<Vec<AmsUnitReport>>,
    /// Bitfield of which units exist.
    pub ams_exist_bits: Option<String>,
    /// Bitfield of which trays hold a spool.
    pub tray_exist_bits: Option<String>,
    #[serde(flatten)]
    other: BTreeMap<String, Value>,
}

/// One AMS unit as reported on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmsUnitReport {
    /// The unit id, a numeric string on the wire.
    pub id: String,
    /// The tray list, one entry per slot, listed even for empty slots.
    #[serde(default)]
    pub tray: Vec<TrayReport>,
    /// The unit humidity level.
    pub humidity: Option<String>,
    /// The unit temperature.
    pub temp: Option<String>,
    #[serde(flatten)]
    other: BTreeMap<String, Value>,
}

/// One tray (slot) as reported on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrayReport {
    /// The slot id, a numeric string on the wire.
    pub id: String,
    /// The filament type. Absent or empty when no spool is loaded.
    pub tray_type: Option<String>,
    /// The filament color. Six or eight hex digits depending on firmware.
    pub tray_color: Option<String>,
    /// The material identifier the spool reports.
    pub tray_info_idx: Option<String>,
    #[serde(flatten)]
    other: BTreeMap<String, Value>,
}

/// Parse a report-topic payload into the envelope.
///
/// Best-effort: a payload that is not the expected envelope is logged and
/// yields `None`, so a query loop can keep waiting for a usable report.
pub(crate) fn parse_report(payload: &[u8]) -> Option<Report> {
    let Ok(text) = std::str::from_utf8(payload) else {
        tracing::debug!("non-utf8 report payload, ignoring");
        return None;
    };

    match serde_json::from_str::<Report>(text)
        .map_err(|err| format_serde_error::SerdeError::new(text.to_string(), err))
    {
        Ok(report) => Some(report),
        Err(err) => {
            tracing::error!("error parsing report: {:?}", err);
            None
        }
    }
}
