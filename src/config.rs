//! Configuration system for the MIDI tokenization pipeline

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub timing: TimingConfig,
    pub preprocess: PreprocessConfig,
    pub tokenize: TokenizeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            timing: TimingConfig::default(),
            preprocess: PreprocessConfig::default(),
            tokenize: TokenizeConfig::default(),
        }
    }
}

impl Config {
    /// Ticks per second of the compound token clock
    pub fn time_resolution(&self) -> u32 {
        self.timing.time_resolution
    }

    /// Length of one beat on the drum grid, in ticks
    pub fn beat_length(&self) -> u32 {
        self.timing.time_resolution / 2
    }

    /// Length of one 4/4 bar on the drum grid, in ticks
    pub fn bar_length(&self) -> u32 {
        4 * self.beat_length()
    }
}

/// Compound token clock
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Ticks per second (100 = 10ms resolution)
    pub time_resolution: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            time_resolution: 100,
        }
    }
}

/// MIDI → compound preprocessing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Worker pool size, shared by both orchestrators
    pub workers: usize,
    /// File extensions discovered recursively under the input root
    pub extensions: Vec<String>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            workers: 16,
            extensions: vec!["mid".to_string(), "midi".to_string()],
        }
    }
}

/// Event tokenization and track filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizeConfig {
    /// Anticipation interval (seconds)
    pub anticipation_interval_seconds: u32,
    /// Events per arrival-time training sequence (M)
    pub context_events: usize,
    /// Tokens per interarrival training sequence
    pub context_size: usize,
    pub max_time_seconds: u32,
    pub max_duration_seconds: u32,
    pub max_interarrival_seconds: u32,
    pub max_track_time_seconds: u32,
    pub min_track_time_seconds: u32,
    pub min_track_events: usize,
    pub max_track_instruments: usize,
    /// Upper bound (exclusive) on the random-augmentation rate
    pub anticipation_rates: u32,
    /// Rate of the exponential gap between anticipated spans (per second)
    pub span_rate: f64,
    pub seed: u64,
}

impl Default for TokenizeConfig {
    fn default() -> Self {
        Self {
            anticipation_interval_seconds: 5,
            context_events: 341,
            context_size: 1024,
            max_time_seconds: 100,
            max_duration_seconds: 10,
            max_interarrival_seconds: 10,
            max_track_time_seconds: 3600,
            min_track_time_seconds: 10,
            min_track_events: 100,
            max_track_instruments: 16,
            anticipation_rates: 10,
            span_rate: 0.05,
            seed: 0,
        }
    }
}

/// Finest supported clock: 0.1ms ticks
pub const MAX_TIME_RESOLUTION: u32 = 10_000;

/// Validate configuration parameters
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    let resolution = config.timing.time_resolution;
    if resolution == 0 || resolution % 2 != 0 {
        anyhow::bail!(
            "time_resolution must be a positive even number (got {})",
            resolution
        );
    }
    if resolution > MAX_TIME_RESOLUTION {
        anyhow::bail!(
            "time_resolution must be at most {} (got {})",
            MAX_TIME_RESOLUTION,
            resolution
        );
    }

    if config.preprocess.workers == 0 {
        anyhow::bail!("workers must be at least 1");
    }
    if config.preprocess.extensions.is_empty() {
        anyhow::bail!("at least one MIDI extension is required");
    }

    let tok = &config.tokenize;
    if tok.min_track_time_seconds >= tok.max_track_time_seconds {
        anyhow::bail!("min_track_time_seconds must be < max_track_time_seconds");
    }
    if tok.context_events == 0 || tok.context_size == 0 {
        anyhow::bail!("context_events and context_size must be non-zero");
    }
    if tok.max_time_seconds == 0 || tok.max_duration_seconds == 0 || tok.max_interarrival_seconds == 0
    {
        anyhow::bail!("max_time, max_duration and max_interarrival must be non-zero");
    }
    // second-valued bounds are used in ticks; token ids are u32
    let seconds = [
        ("anticipation_interval_seconds", tok.anticipation_interval_seconds),
        ("max_time_seconds", tok.max_time_seconds),
        ("max_duration_seconds", tok.max_duration_seconds),
        ("max_interarrival_seconds", tok.max_interarrival_seconds),
        ("max_track_time_seconds", tok.max_track_time_seconds),
        ("min_track_time_seconds", tok.min_track_time_seconds),
    ];
    for (name, value) in seconds {
        if resolution.checked_mul(value).is_none() {
            anyhow::bail!("{} = {} overflows at {} ticks per second", name, value, resolution);
        }
    }
    let vocab_size = 2 * u64::from(resolution)
        * (u64::from(tok.max_time_seconds) + u64::from(tok.max_duration_seconds))
        + 2 * u64::from(crate::tokenize::vocab::MAX_NOTE)
        + 4;
    if vocab_size > u64::from(u32::MAX) {
        anyhow::bail!("token vocabulary of {} ids does not fit in u32", vocab_size);
    }

    // random augmentation draws r from [1, anticipation_rates)
    if tok.anticipation_rates < 2 {
        anyhow::bail!("anticipation_rates must be >= 2");
    }
    if !(tok.span_rate > 0.0) {
        anyhow::bail!("span_rate must be positive");
    }

    Ok(())
}

/// Load configuration from JSON file
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Save configuration to JSON file
pub fn save_config<P: AsRef<std::path::Path>>(config: &Config, path: P) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
