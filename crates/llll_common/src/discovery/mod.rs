//! Hub discovery
//!
//! Stages the probe program, runs it through the program runner, and turns
//! the `LLLL_DETECT:` line it prints into a `HubSnapshot`.

pub mod catalog;
pub mod codec;
pub mod hub;
pub mod probe;

pub use catalog::{DeviceDescriptor, DEVICE_CATALOG};
pub use codec::{decode, DecodeError, ProbePayload, MARKER};
pub use hub::{HubSnapshot, HubType, PortDevice, UnknownHubType};
pub use probe::{StagedProbe, PROBE_PROGRAM};

use tracing::{info, warn};

use crate::runner::{ProgramRunner, RunError, RunRequest};

/// Default discovery timeout in seconds
pub const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 30;

/// Why discovery produced no snapshot
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Failed to stage discovery program: {0}")]
    Stage(#[source] std::io::Error),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("{}", failure_message(*exit_code, *timed_out))]
    ProgramFailed {
        exit_code: i32,
        timed_out: bool,
        output: String,
    },

    #[error("Could not parse discovery output: {source}")]
    Unparseable {
        #[source]
        source: DecodeError,
        output: String,
    },

    #[error("{message}")]
    Hub { message: String },
}

fn failure_message(exit_code: i32, timed_out: bool) -> String {
    if timed_out {
        "Discovery program timed out".to_string()
    } else {
        format!("Discovery program failed (exit code {})", exit_code)
    }
}

impl DiscoveryError {
    /// Captured uploader output, when a process actually ran
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            DiscoveryError::ProgramFailed { output, .. } | DiscoveryError::Unparseable { output, .. } => {
                Some(output.as_str())
            }
            _ => None,
        }
    }
}

/// Detect the hub and the devices on its ports.
///
/// The probe file exists only for the duration of this call.
pub async fn discover(
    runner: &ProgramRunner,
    hub_name: Option<String>,
    timeout_secs: u64,
) -> Result<HubSnapshot, DiscoveryError> {
    let staged = StagedProbe::stage(runner.project()).map_err(DiscoveryError::Stage)?;

    let request = RunRequest::new(staged.relative_path())
        .with_hub_name(hub_name)
        .with_timeout_secs(timeout_secs);
    let result = runner.run(&request).await?;

    drop(staged);

    if !result.success {
        warn!(
            "Discovery run failed: exit_code={} timed_out={}",
            result.exit_code, result.timed_out
        );
        return Err(DiscoveryError::ProgramFailed {
            exit_code: result.exit_code,
            timed_out: result.timed_out,
            output: result.output,
        });
    }

    match decode(&result.output) {
        Ok(ProbePayload::Snapshot(snapshot)) => {
            info!(
                "Discovered {} '{}' ({} port(s) with devices)",
                snapshot.hub_type,
                snapshot.hub_name,
                snapshot.occupied_ports().count()
            );
            Ok(snapshot)
        }
        Ok(ProbePayload::HubError(message)) => Err(DiscoveryError::Hub { message }),
        Err(source) => Err(DiscoveryError::Unparseable {
            source,
            output: result.output,
        }),
    }
}
