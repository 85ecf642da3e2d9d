//! Wire-visible defaults and the one environment input the coordinator
//! reads directly (`HOTWORD_DETECTION_SENSITIVITY`).
//!
//! Anything heavier - a config file format, a layered env/file/flag loader -
//! is an external collaborator and stays out of this crate.

use std::time::Duration;

/// Samples per second the coordinator assumes for all PCM it handles.
pub const SAMPLE_RATE: u32 = 16_000;
/// Bits per PCM sample.
pub const SAMPLE_BITS: u32 = 16;
/// Default size, in milliseconds, of each audio chunk sent to the cloud.
pub const DEFAULT_CHUNK_MS: u32 = 120;
/// Milliseconds of synthetic audio sent during a connection check.
pub const DEFAULT_AUDIO_LEN_MS: u32 = 6_000;
/// RPC timeout applied to every stream.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(9);

/// Default hotword pre-filter sensitivity, absent an env override.
pub const DEFAULT_HOTWORD_SENSITIVITY: f64 = 0.7;

const MIN_ZCR: f64 = 0.1;
const MAX_ZCR: f64 = 0.3;
const MIN_CENTROID: f64 = 1000.0;
const MAX_CENTROID: f64 = 4000.0;
const MIN_ENERGY: f64 = 1000.0;
const MAX_ENERGY: f64 = 30_000.0;

const ENV_SENSITIVITY: &str = "HOTWORD_DETECTION_SENSITIVITY";

/// Derived chunking parameters for sizing RPC frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub chunk_ms: u32,
}

impl ChunkConfig {
    pub fn new(chunk_ms: u32) -> Self {
        Self { chunk_ms }
    }

    /// Number of 16-bit samples in one chunk.
    pub fn chunk_samples(&self) -> u32 {
        SAMPLE_RATE * self.chunk_ms / 1000
    }

    /// Size in bytes of one chunk.
    pub fn stream_size(&self) -> u32 {
        self.chunk_samples() * (SAMPLE_BITS / 8)
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_MS)
    }
}

/// Expected packet count for a connection check under the default chunking.
pub fn default_expected_packets() -> u8 {
    (DEFAULT_AUDIO_LEN_MS / DEFAULT_CHUNK_MS) as u8
}

/// Tunable thresholds for the hotword pre-filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HotwordFilterConfig {
    pub sensitivity: f64,
    pub min_zcr: f64,
    pub max_zcr: f64,
    pub min_centroid: f64,
    pub max_centroid: f64,
    pub min_energy: f64,
    pub max_energy: f64,
}

impl Default for HotwordFilterConfig {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_HOTWORD_SENSITIVITY,
            min_zcr: MIN_ZCR,
            max_zcr: MAX_ZCR,
            min_centroid: MIN_CENTROID,
            max_centroid: MAX_CENTROID,
            min_energy: MIN_ENERGY,
            max_energy: MAX_ENERGY,
        }
    }
}

impl HotwordFilterConfig {
    /// Same defaults, but with `sensitivity` overridden from
    /// `HOTWORD_DETECTION_SENSITIVITY` if it is set and parses as an `f64`.
    pub fn from_env() -> Self {
        Self {
            sensitivity: hotword_sensitivity_from_env(),
            ..Self::default()
        }
    }
}

/// Reads `HOTWORD_DETECTION_SENSITIVITY`, falling back to
/// [`DEFAULT_HOTWORD_SENSITIVITY`] if it is unset or fails to parse.
pub fn hotword_sensitivity_from_env() -> f64 {
    match std::env::var(ENV_SENSITIVITY) {
        Ok(raw) if !raw.is_empty() => raw.parse().unwrap_or_else(|_| {
            log::warn!("invalid {ENV_SENSITIVITY}={raw:?}, using default");
            DEFAULT_HOTWORD_SENSITIVITY
        }),
        _ => DEFAULT_HOTWORD_SENSITIVITY,
    }
}

/// Top-level coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub chunking: ChunkConfig,
    pub hotword: HotwordFilterConfig,
    pub endpoint: String,
    pub require_token: bool,
    /// Opaque handler identifier forwarded into `Intent`/`IntentGraph`
    /// stream options.
    pub handler: String,
    /// Firmware version string sniffed for the `IntentGraph` cutover:
    /// any build containing `"1.8."` or `"2.0."` gets `IntentGraph`
    /// streams instead of plain `Intent` ones.
    pub firmware_version: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkConfig::default(),
            hotword: HotwordFilterConfig::default(),
            endpoint: String::new(),
            require_token: true,
            handler: String::new(),
            firmware_version: String::new(),
        }
    }
}
