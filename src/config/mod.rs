//! Application Configuration
//!
//! Game coordination settings stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::clock::{ClockConfig, TurnTimePreset, SHORT_FORMAT_LIMIT_MS};
use crate::delegate::DispatchPolicy;
use crate::input::InputMode;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Turn clock settings
    pub clock: ClockSettings,
    /// Pointer input settings
    pub input: InputSettings,
    /// Delegate dispatch settings
    pub dispatch: DispatchSettings,
    /// Main loop settings
    pub game_loop: LoopSettings,
}

/// Turn clock settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    /// Time per turn in milliseconds, absent for unbounded turns
    pub turn_duration_ms: Option<u64>,
    /// Sampling interval while the clock runs
    pub tick_interval_ms: u64,
    /// Sleep interval while the clock is stopped
    pub idle_interval_ms: u64,
    /// Upper bound accepted by the short `MM:SS` formatter
    pub short_format_limit_ms: i64,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            turn_duration_ms: Some(TurnTimePreset::default().duration().as_millis() as u64),
            tick_interval_ms: 5,
            idle_interval_ms: 15,
            short_format_limit_ms: SHORT_FORMAT_LIMIT_MS,
        }
    }
}

impl ClockSettings {
    /// Build the runtime clock configuration
    pub fn to_clock_config(&self, dispatch_policy: DispatchPolicy) -> ClockConfig {
        ClockConfig {
            turn_duration: self.turn_duration_ms.map(Duration::from_millis),
            // Zero would make the clock thread spin
            tick_interval: Duration::from_millis(self.tick_interval_ms.max(1)),
            idle_interval: Duration::from_millis(self.idle_interval_ms.max(1)),
            dispatch_policy,
        }
    }
}

/// Pointer input settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Deliver pointer events on the main loop or on the input thread
    pub mode: InputMode,
}

/// Delegate dispatch settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// What a panicking subscriber does to the rest of the dispatch
    pub policy: DispatchPolicy,
}

/// Main loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSettings {
    /// Target frame rate
    pub frames_per_second: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            frames_per_second: 60,
        }
    }
}

impl LoopSettings {
    /// Duration of one frame; a zero frame rate is treated as 1 fps
    pub fn frame_time(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frames_per_second.max(1)))
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        // Check clock defaults
        assert_eq!(config.clock.turn_duration_ms, Some(120_000));
        assert_eq!(config.clock.tick_interval_ms, 5);
        assert_eq!(config.clock.idle_interval_ms, 15);
        assert_eq!(config.clock.short_format_limit_ms, SHORT_FORMAT_LIMIT_MS);

        // Check input and dispatch defaults
        assert_eq!(config.input.mode, InputMode::Synchronized);
        assert_eq!(config.dispatch.policy, DispatchPolicy::Propagate);

        // Check loop defaults
        assert_eq!(config.game_loop.frames_per_second, 60);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        // Serialize to TOML
        let toml_str = toml::to_string_pretty(&config).unwrap();

        // Deserialize back
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        // Verify values match
        assert_eq!(config.clock.turn_duration_ms, parsed.clock.turn_duration_ms);
        assert_eq!(config.input.mode, parsed.input.mode);
        assert_eq!(config.dispatch.policy, parsed.dispatch.policy);
        assert_eq!(config.game_loop.frames_per_second, parsed.game_loop.frames_per_second);
    }

    #[test]
    fn test_infinite_turn_roundtrip() {
        let mut config = AppConfig::default();
        config.clock.turn_duration_ms = None;
        config.input.mode = InputMode::Direct;
        config.dispatch.policy = DispatchPolicy::Isolate;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.clock.turn_duration_ms, None);
        assert_eq!(parsed.input.mode, InputMode::Direct);
        assert_eq!(parsed.dispatch.policy, DispatchPolicy::Isolate);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [input]
            mode = "direct"

            [game_loop]
            frames_per_second = 30
            "#,
        )
        .unwrap();

        assert_eq!(parsed.input.mode, InputMode::Direct);
        assert_eq!(parsed.game_loop.frames_per_second, 30);
        assert_eq!(parsed.clock.idle_interval_ms, 15);
        assert_eq!(parsed.dispatch.policy, DispatchPolicy::Propagate);
    }

    #[test]
    fn test_clock_config_conversion() {
        let settings = ClockSettings {
            turn_duration_ms: Some(40_000),
            tick_interval_ms: 2,
            idle_interval_ms: 20,
            short_format_limit_ms: SHORT_FORMAT_LIMIT_MS,
        };
        let clock = settings.to_clock_config(DispatchPolicy::Isolate);

        assert_eq!(clock.turn_duration, Some(Duration::from_secs(40)));
        assert_eq!(clock.tick_interval, Duration::from_millis(2));
        assert_eq!(clock.idle_interval, Duration::from_millis(20));
        assert_eq!(clock.dispatch_policy, DispatchPolicy::Isolate);
    }

    #[test]
    fn test_zero_intervals_clamped() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [clock]
            tick_interval_ms = 0
            idle_interval_ms = 0
            "#,
        )
        .unwrap();
        let clock = parsed.clock.to_clock_config(DispatchPolicy::Propagate);

        assert_eq!(clock.tick_interval, Duration::from_millis(1));
        assert_eq!(clock.idle_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_frame_time() {
        let settings = LoopSettings { frames_per_second: 50 };
        assert_eq!(settings.frame_time(), Duration::from_millis(20));

        let zero = LoopSettings { frames_per_second: 0 };
        assert_eq!(zero.frame_time(), Duration::from_secs(1));
    }

    #[test]
    fn test_save_and_load_config() {
        let config = AppConfig::default();

        // Create a temporary file
        let temp_file = NamedTempFile::new().unwrap();

        // Save config
        save_config(&config, temp_file.path()).unwrap();

        // Load config
        let loaded = load_config(temp_file.path()).unwrap();

        // Verify
        assert_eq!(config.clock.turn_duration_ms, loaded.clock.turn_duration_ms);
        assert_eq!(config.game_loop.frames_per_second, loaded.game_loop.frames_per_second);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
