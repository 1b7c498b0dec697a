//! Configuration system for retrodbg

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::arch::Architecture;
use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub disassembly: DisassemblyConfig,
    pub call_stack: CallStackConfig,
    pub watch: WatchConfig,
    pub logging: LoggingConfig,
}

/// General debugger settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Architecture activated by `initialize`
    pub architecture: Architecture,
    /// Enter `Paused` right after initialization instead of `Running`
    pub start_paused: bool,
}

/// Disassembly view settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisassemblyConfig {
    /// Instructions rendered per view
    pub lines_per_view: usize,
    /// Maximum entries kept in the navigation history
    pub history_limit: usize,
    /// Widest backwards probe when looking for the previous instruction
    pub max_probe_bytes: u32,
}

/// Call stack reconstruction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallStackConfig {
    /// Hard cap on reconstructed frames
    pub max_frames: usize,
    /// Saved frame pointers below this address end the walk
    pub min_frame_address: u32,
    /// Stack slots inspected by the scanning heuristic
    pub scan_slots: usize,
    /// Lowest address accepted as a plausible return address
    pub code_start: u32,
    /// Highest address accepted as a plausible return address
    pub code_end: u32,
    /// Frames shown by the renderer
    pub max_display_depth: usize,
    /// Rebuild the stack heuristically on every update
    pub auto_detect: bool,
}

/// Watch view settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Pause a running session when a watchpoint triggers
    pub break_on_trigger: bool,
    /// Mark watchpoints whose value changed since the last access
    pub highlight_changes: bool,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

/// Logging level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            architecture: Architecture::M68K,
            start_paused: false,
        }
    }
}

impl Default for DisassemblyConfig {
    fn default() -> Self {
        Self {
            lines_per_view: 20,
            history_limit: 64,
            max_probe_bytes: 16,
        }
    }
}

impl Default for CallStackConfig {
    fn default() -> Self {
        Self {
            max_frames: 32,
            min_frame_address: 0x1000,
            scan_slots: 8,
            code_start: 0x0000,
            code_end: 0xFFFF_FFFF,
            max_display_depth: 32,
            auto_detect: true,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            break_on_trigger: true,
            highlight_changes: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, or defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file, or defaults if absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("retrodbg")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.architecture, Architecture::M68K);
        assert_eq!(config.call_stack.max_frames, 32);
        assert_eq!(config.call_stack.min_frame_address, 0x1000);
        assert!(config.watch.break_on_trigger);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.disassembly.history_limit, config.disassembly.history_limit);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("[general]\narchitecture = \"Z80\"\n").unwrap();
        assert_eq!(parsed.general.architecture, Architecture::Z80);
        assert_eq!(parsed.call_stack.scan_slots, 8);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.call_stack.code_end = 0xFFFF;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.call_stack.code_end, 0xFFFF);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.disassembly.lines_per_view, 20);
    }
}
