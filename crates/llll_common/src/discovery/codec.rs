//! `LLLL_DETECT:` wire protocol
//!
//! The probe may print anything, but exactly one line must start with
//! `LLLL_DETECT:` immediately followed by a JSON object. Either a snapshot:
//!
//! ```text
//! LLLL_DETECT:{"hub_type":"TechnicHub","hub_name":"Hub1","battery_voltage":8100,
//!              "ports":[{"port":"A","device_id":46},{"port":"B","device_id":null}]}
//! ```
//!
//! or an error reported by the hub itself: `LLLL_DETECT:{"error":"..."}`.

use serde_json::Value;

use super::hub::HubSnapshot;

/// Prefix of the one line the decoder cares about
pub const MARKER: &str = "LLLL_DETECT:";

/// What the probe reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbePayload {
    /// Enriched hub snapshot
    Snapshot(HubSnapshot),
    /// The probe ran but couldn't inspect the hub
    HubError(String),
}

/// Why probe output could not be decoded
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("No LLLL_DETECT: line in output")]
    MissingMarker,

    #[error("Invalid JSON after LLLL_DETECT: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Unexpected payload after LLLL_DETECT: {0}")]
    InvalidPayload(String),
}

/// Find the marker line and return the JSON text after it
fn find_payload(output: &str) -> Option<&str> {
    output
        .lines()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .find_map(|line| line.strip_prefix(MARKER))
}

/// Decode probe output into an enriched snapshot or a hub-side error.
///
/// Lines without the marker are ignored; the first marker line wins.
pub fn decode(output: &str) -> Result<ProbePayload, DecodeError> {
    let payload = find_payload(output).ok_or(DecodeError::MissingMarker)?;
    let value: Value = serde_json::from_str(payload).map_err(DecodeError::InvalidJson)?;

    let Value::Object(map) = &value else {
        return Err(DecodeError::InvalidPayload(
            "expected a JSON object".to_string(),
        ));
    };

    if let Some(error) = map.get("error") {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Ok(ProbePayload::HubError(message));
    }

    let mut snapshot: HubSnapshot = serde_json::from_value(value)
        .map_err(|e| DecodeError::InvalidPayload(e.to_string()))?;
    snapshot.enrich();
    Ok(ProbePayload::Snapshot(snapshot))
}
