//! Domain model of the AMS filament subsystem.
//!
//! The filament-matching collaborator consumes [`AmsUnit`] lists to plan
//! slot assignment before slicing; it never sees the wire shapes in
//! [`crate::message`].

use serde::{Deserialize, Serialize};

use crate::message::Report;

/// Filament label for a slot with no spool loaded.
///
/// An `"Empty"` slot is present-but-unloaded, which is distinct from the
/// unit itself being absent.
pub const EMPTY_FILAMENT: &str = "Empty";

/// Placeholder color for an empty slot: fully transparent.
pub const EMPTY_COLOR: &str = "00000000";

/// One slot of an AMS unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmsSlot {
    /// The slot id within its unit.
    pub id: i64,
    /// The loaded filament type, or [`EMPTY_FILAMENT`] for a bare slot.
    pub filament: String,
    /// The filament color as reported. Six- and eight-hex-digit forms are
    /// both passed through verbatim: normalizing would silently discard an
    /// alpha distinction this layer cannot safely interpret.
    pub color: String,
    /// The material identifier, when the spool reports one.
    pub material: Option<String>,
}

impl AmsSlot {
    /// Whether this slot has no spool loaded.
    pub fn is_empty(&self) -> bool {
        self.filament == EMPTY_FILAMENT
    }
}

/// One AMS unit and its slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmsUnit {
    /// The unit id.
    pub id: i64,
    /// The slots, in reported order, listed even when empty.
    pub slots: Vec<AmsSlot>,
}

/// Outcome of an AMS status query.
///
/// A printer that refused the connection is an error at the call site; a
/// printer that connected but never answered is this type with
/// `success == false`. Callers rely on that distinction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmsStatusResult {
    /// Whether a qualifying report arrived in time.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// The attached units. Present only on success.
    pub units: Option<Vec<AmsUnit>>,
    /// Error detail. Present only on failure.
    pub error: Option<String>,
}

impl AmsStatusResult {
    /// A report arrived and was extracted.
    pub(crate) fn received(units: Vec<AmsUnit>) -> Self {
        Self {
            success: true,
            message: format!("{} AMS unit(s) reported", units.len()),
            units: Some(units),
            error: None,
        }
    }

    /// The printer never answered inside the wait budget.
    pub(crate) fn no_response(timeout: std::time::Duration) -> Self {
        Self {
            success: false,
            message: "no response".to_string(),
            units: None,
            error: Some(format!("timeout after {}s", timeout.as_secs())),
        }
    }
}

/// Extract the AMS units from a report.
///
/// Best-effort: a malformed or absent substructure yields an empty list,
/// never an error. A tray with a missing or empty type marker becomes an
/// [`EMPTY_FILAMENT`] slot with the zero-alpha placeholder color.
pub fn ams_units(report: &Report) -> Vec<AmsUnit> {
    let Some(print) = &report.print else {
        return Vec::new();
    };
    let Some(ams) = &print.ams else {
        return Vec::new();
    };
    let Some(units) = &ams.ams else {
        return Vec::new();
    };

    units
        .iter()
        .map(|unit| AmsUnit {
            id: parse_id(&unit.id),
            slots: unit.tray.iter().map(slot_from_tray).collect(),
        })
        .collect()
}

fn slot_from_tray(tray: &crate::message::TrayReport) -> AmsSlot {
    let id = parse_id(&tray.id);
    match tray.tray_type.as_deref().filter(|t| !t.is_empty()) {
        Some(filament) => AmsSlot {
            id,
            filament: filament.to_string(),
            color: tray
                .tray_color
                .clone()
                .unwrap_or_else(|| EMPTY_COLOR.to_string()),
            material: tray.tray_info_idx.clone(),
        },
        None => AmsSlot {
            id,
            filament: EMPTY_FILAMENT.to_string(),
            color: EMPTY_COLOR.to_string(),
            material: None,
        },
    }
}

/// The wire sends ids as numeric strings. An unparsable id degrades to 0
/// rather than dropping the entry, keeping slot listings stable for the
/// filament-matching consumer.
fn parse_id(raw: &str) -> i64 {
    match raw.parse() {
        Ok(id) => id,
        Err(_) => {
            tracing::debug!(raw, "unparsable AMS id");
            0
        }
    }
}
