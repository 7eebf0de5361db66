use std::path::Path;
use std::time::Duration;

use provision_core::{MarkerPair, OperationKind};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::raw::{RawConfig, RawMarkerPair};

const DEFAULT_POLL_INTERVAL_SECS: u64 = 20;
const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// What a fan-out step does with the units that succeeded when others failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartialFailurePolicy {
    /// Delete whatever the successful units created before reporting failure.
    #[default]
    RollBack,
    /// Leave successful units in place and log their identifiers for manual cleanup.
    Retain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    interval: Duration,
    deadline: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            deadline: None,
        }
    }
}

impl PollSettings {
    #[must_use]
    pub fn new(interval: Duration, deadline: Option<Duration>) -> Self {
        Self { interval, deadline }
    }

    /// Time slept between two state queries.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Upper bound on one wait; `None` waits until a terminal state.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOutSettings {
    max_concurrency: usize,
    on_partial_failure: PartialFailurePolicy,
}

impl Default for FanOutSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            on_partial_failure: PartialFailurePolicy::default(),
        }
    }
}

impl FanOutSettings {
    /// # Errors
    ///
    /// Returns an error if `max_concurrency` is zero.
    pub fn new(
        max_concurrency: usize,
        on_partial_failure: PartialFailurePolicy,
    ) -> Result<Self, ConfigError> {
        if max_concurrency == 0 {
            return Err(ConfigError::ZeroValue {
                field: "fan-out.max-concurrency",
            });
        }
        Ok(Self {
            max_concurrency,
            on_partial_failure,
        })
    }

    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    #[must_use]
    pub fn on_partial_failure(&self) -> PartialFailurePolicy {
        self.on_partial_failure
    }
}

/// Event-log markers for each operation kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureMarkers {
    create: MarkerPair,
    scale: MarkerPair,
    delete: MarkerPair,
}

impl Default for FailureMarkers {
    fn default() -> Self {
        Self {
            create: MarkerPair::new("Start to create cluster", "Failed to create cluster"),
            scale: MarkerPair::new("Start to scale cluster", "Failed to scale cluster"),
            delete: MarkerPair::new("Start to delete cluster", "Failed to delete cluster"),
        }
    }
}

impl FailureMarkers {
    #[must_use]
    pub fn new(create: MarkerPair, scale: MarkerPair, delete: MarkerPair) -> Self {
        Self {
            create,
            scale,
            delete,
        }
    }

    #[must_use]
    pub fn for_kind(&self, kind: OperationKind) -> &MarkerPair {
        match kind {
            OperationKind::Create => &self.create,
            OperationKind::Scale => &self.scale,
            OperationKind::Delete => &self.delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    poll: PollSettings,
    fan_out: FanOutSettings,
    compensate: bool,
    markers: FailureMarkers,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll: PollSettings::default(),
            fan_out: FanOutSettings::default(),
            compensate: true,
            markers: FailureMarkers::default(),
        }
    }
}

impl OrchestratorConfig {
    #[must_use]
    pub fn poll(&self) -> PollSettings {
        self.poll
    }

    #[must_use]
    pub fn fan_out(&self) -> FanOutSettings {
        self.fan_out
    }

    /// Whether a failed saga compensates its completed steps.
    #[must_use]
    pub fn compensate(&self) -> bool {
        self.compensate
    }

    #[must_use]
    pub fn markers(&self) -> &FailureMarkers {
        &self.markers
    }

    #[must_use]
    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    #[must_use]
    pub fn with_fan_out(mut self, fan_out: FanOutSettings) -> Self {
        self.fan_out = fan_out;
        self
    }

    #[must_use]
    pub fn with_compensation(mut self, compensate: bool) -> Self {
        self.compensate = compensate;
        self
    }

    #[must_use]
    pub fn with_markers(mut self, markers: FailureMarkers) -> Self {
        self.markers = markers;
        self
    }
}

fn resolve_marker_pair(
    name: &str,
    raw: Option<RawMarkerPair>,
    default: MarkerPair,
) -> Result<MarkerPair, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };

    let start = raw.start.unwrap_or(default.start);
    let end = raw.end.unwrap_or(default.end);
    if start.trim().is_empty() {
        return Err(ConfigError::EmptyMarker {
            field: format!("markers.{name}.start"),
        });
    }
    if end.trim().is_empty() {
        return Err(ConfigError::EmptyMarker {
            field: format!("markers.{name}.end"),
        });
    }
    Ok(MarkerPair::new(start, end))
}

fn resolve(raw: RawConfig) -> Result<OrchestratorConfig, ConfigError> {
    let defaults = OrchestratorConfig::default();

    let interval_secs = raw
        .poll
        .interval_secs
        .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
    if interval_secs == 0 {
        return Err(ConfigError::ZeroValue {
            field: "poll.interval-secs",
        });
    }
    if raw.poll.deadline_secs == Some(0) {
        return Err(ConfigError::ZeroValue {
            field: "poll.deadline-secs",
        });
    }
    let poll = PollSettings::new(
        Duration::from_secs(interval_secs),
        raw.poll.deadline_secs.map(Duration::from_secs),
    );

    let fan_out = FanOutSettings::new(
        raw.fan_out
            .max_concurrency
            .unwrap_or(defaults.fan_out.max_concurrency),
        raw.fan_out
            .on_partial_failure
            .unwrap_or(defaults.fan_out.on_partial_failure),
    )?;

    let default_markers = defaults.markers;
    let markers = FailureMarkers::new(
        resolve_marker_pair("create", raw.markers.create, default_markers.create)?,
        resolve_marker_pair("scale", raw.markers.scale, default_markers.scale)?,
        resolve_marker_pair("delete", raw.markers.delete, default_markers.delete)?,
    );

    Ok(OrchestratorConfig {
        poll,
        fan_out,
        compensate: raw.saga.compensate.unwrap_or(defaults.compensate),
        markers,
    })
}

/// Parses orchestrator configuration from TOML text.
///
/// # Errors
///
/// Returns an error if the text is not valid TOML, contains unknown keys, or
/// holds out-of-range values.
pub fn parse_config(text: &str) -> Result<OrchestratorConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(text)?;
    resolve(raw)
}

/// Loads orchestrator configuration from a TOML file.
///
/// A missing file yields the default configuration.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<OrchestratorConfig, ConfigError> {
    if !path.exists() {
        return Ok(OrchestratorConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    resolve(raw)
}
