use serde::Deserialize;

use crate::config::PartialFailurePolicy;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawConfig {
    #[serde(default)]
    pub(crate) poll: RawPoll,
    #[serde(default, rename = "fan-out", alias = "fan_out")]
    pub(crate) fan_out: RawFanOut,
    #[serde(default)]
    pub(crate) saga: RawSaga,
    #[serde(default)]
    pub(crate) markers: RawMarkers,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawPoll {
    #[serde(rename = "interval-secs", alias = "interval_secs")]
    pub(crate) interval_secs: Option<u64>,
    #[serde(rename = "deadline-secs", alias = "deadline_secs")]
    pub(crate) deadline_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawFanOut {
    #[serde(rename = "max-concurrency", alias = "max_concurrency")]
    pub(crate) max_concurrency: Option<usize>,
    #[serde(rename = "on-partial-failure", alias = "on_partial_failure")]
    pub(crate) on_partial_failure: Option<PartialFailurePolicy>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawSaga {
    pub(crate) compensate: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawMarkers {
    pub(crate) create: Option<RawMarkerPair>,
    pub(crate) scale: Option<RawMarkerPair>,
    pub(crate) delete: Option<RawMarkerPair>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawMarkerPair {
    pub(crate) start: Option<String>,
    pub(crate) end: Option<String>,
}
