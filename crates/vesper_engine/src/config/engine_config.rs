use super::{Config, ConfigError};
use crate::foundation::logging::Verbosity;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// # Simulation Configuration
///
/// Fixed tick rate and the size of the worker pool the actor waves run on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Tick period in milliseconds
    pub tick_delay_ms: u64,
    /// Worker thread count; `None` picks one from the available parallelism
    pub worker_threads: Option<usize>,
}

impl SimulationConfig {
    /// Tick period as a duration
    pub fn tick_delay(&self) -> Duration {
        Duration::from_millis(self.tick_delay_ms)
    }

    /// Set the tick period
    pub fn with_tick_delay_ms(mut self, ms: u64) -> Self {
        self.tick_delay_ms = ms;
        self
    }

    /// Pin the worker thread count
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_delay_ms: 20,
            worker_threads: None,
        }
    }
}

/// # Scene Bridge Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Capacity of each model load/unload message ring
    pub message_queue_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            message_queue_capacity: 1024 * 4,
        }
    }
}

/// # Render Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Frames the GPU may have in flight at once
    pub frames_in_flight: usize,
    /// A warning is logged for any second that draws fewer frames than this
    pub min_fps_warning: u32,
    /// Application name reported to the Vulkan driver
    pub application_name: String,
    /// Enable the Khronos validation layer
    pub enable_validation: bool,
}

impl RenderConfig {
    /// Set the application name
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = enabled;
        self
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            min_fps_warning: 58,
            application_name: "Vesper Application".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

/// # Audio Configuration
///
/// Output is always interleaved stereo `f32`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Frames per callback block
    pub frames_per_buffer: u32,
    /// Maximum number of buffers mixed at once
    pub max_voices: usize,
    /// Capacity of the submission ring
    pub queue_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            frames_per_buffer: 256,
            max_voices: 256,
            queue_capacity: 1024 * 16,
        }
    }
}

/// # Complete Engine Configuration
///
/// Top-level configuration covering every subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log verbosity
    pub verbosity: Verbosity,
    /// Simulation loop settings
    pub simulation: SimulationConfig,
    /// Scene bridge settings
    pub bridge: BridgeConfig,
    /// Frame loop and Vulkan settings
    pub render: RenderConfig,
    /// Mixer and output stream settings
    pub audio: AudioConfig,
}

impl EngineConfig {
    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.tick_delay_ms == 0 {
            return Err(invalid("simulation.tick_delay_ms", "must be positive"));
        }
        if self.simulation.worker_threads == Some(0) {
            return Err(invalid("simulation.worker_threads", "must be at least 1"));
        }
        if self.bridge.message_queue_capacity == 0 {
            return Err(invalid("bridge.message_queue_capacity", "must be positive"));
        }
        if self.render.frames_in_flight == 0 {
            return Err(invalid("render.frames_in_flight", "must be at least 1"));
        }
        if self.audio.sample_rate == 0 || self.audio.frames_per_buffer == 0 {
            return Err(invalid("audio", "sample rate and block size must be positive"));
        }
        if self.audio.max_voices == 0 || self.audio.queue_capacity == 0 {
            return Err(invalid("audio", "voice and queue capacities must be positive"));
        }
        Ok(())
    }
}

impl Config for EngineConfig {}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("vesper_config_{}_{name}", std::process::id()))
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.simulation.tick_delay(), Duration::from_millis(20));
        assert_eq!(config.render.frames_in_flight, 2);
        assert_eq!(config.render.min_fps_warning, 58);
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.audio.frames_per_buffer, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let path = temp_path("round_trip.toml");
        let config = EngineConfig {
            simulation: SimulationConfig::default()
                .with_tick_delay_ms(10)
                .with_worker_threads(3),
            ..EngineConfig::default()
        };

        config.save_to_file(&path).unwrap();
        let loaded = EngineConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ron_round_trip() {
        let path = temp_path("round_trip.ron");
        let config = EngineConfig {
            verbosity: Verbosity::Verbose,
            render: RenderConfig::default().with_application_name("ron test"),
            ..EngineConfig::default()
        };

        config.save_to_file(&path).unwrap();
        let loaded = EngineConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: EngineConfig = ConfigFormat::Toml
            .parse("[simulation]\ntick_delay_ms = 5\n")
            .unwrap();
        assert_eq!(config.simulation.tick_delay_ms, 5);
        assert_eq!(config.simulation.worker_threads, None);
        assert_eq!(config.audio, AudioConfig::default());
    }

    #[test]
    fn test_unsupported_format() {
        let result = EngineConfig::default().save_to_file(temp_path("config.json"));
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let config = EngineConfig::load_or_default(temp_path("missing.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_tick() {
        let config = EngineConfig {
            simulation: SimulationConfig::default().with_tick_delay_ms(0),
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "simulation.tick_delay_ms", .. })
        ));
    }
}
