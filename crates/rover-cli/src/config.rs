//! Configuration Vault – reads/writes `~/.rover/config.toml`.

use rover_perception::PerceptionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

/// Persisted user configuration stored in `~/.rover/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log_format: LogFormat,

    /// OTLP/HTTP collector base URL.  Span export is off when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub otlp_endpoint: String,

    /// Must stay the last field: TOML needs tables after plain values.
    #[serde(default)]
    pub perception: PerceptionConfig,
}

/// Return the path to `~/.rover/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rover").join("config.toml")
}

/// Load the config from `path` and apply env overrides.  Returns `None` if
/// the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    let mut cfg = read_from(path)?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Parse the file at `path` as-is, without env overrides.
pub(crate) fn read_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| format!("Failed to parse config: {}", e))
}

/// Load from `path`, falling back to defaults (with env overrides) when the
/// file is absent.
pub fn load_or_default(path: &Path) -> Result<Config, String> {
    match load_from(path)? {
        Some(cfg) => Ok(cfg),
        None => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            Ok(cfg)
        }
    }
}

/// Apply `ROVER_*` environment variable overrides to `cfg`.
///
/// Values that fail to parse are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROVER_WORLD_SIZE` | `perception.world_size` |
/// | `ROVER_SCALE` | `perception.scale` |
/// | `ROVER_STABILITY_EPSILON` | `perception.stability_epsilon_deg` |
/// | `ROVER_LOG_FORMAT` | `log_format` |
/// | `ROVER_OTLP_ENDPOINT` | `otlp_endpoint` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ROVER_WORLD_SIZE")
        && let Ok(size) = v.parse::<usize>()
    {
        cfg.perception.world_size = size;
    }
    if let Ok(v) = std::env::var("ROVER_SCALE")
        && let Ok(scale) = v.parse::<f32>()
    {
        cfg.perception.scale = scale;
    }
    if let Ok(v) = std::env::var("ROVER_STABILITY_EPSILON")
        && let Ok(eps) = v.parse::<f32>()
    {
        cfg.perception.stability_epsilon_deg = eps;
    }
    if let Ok(v) = std::env::var("ROVER_LOG_FORMAT")
        && let Ok(format) = v.parse::<LogFormat>()
    {
        cfg.log_format = format;
    }
    if let Ok(v) = std::env::var("ROVER_OTLP_ENDPOINT") {
        cfg.otlp_endpoint = v;
    }
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_perception::world_map::GatePolicy;

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600, "config file must have 0o600 permissions");

        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .expect("dir metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700, "config directory must have 0o700 permissions");
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let loaded = read_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.log_format, LogFormat::Compact);
        assert!(loaded.otlp_endpoint.is_empty());
        assert_eq!(loaded.perception, PerceptionConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "log_format = \"json\"\n\n[perception]\nworld_size = 50\ngate_policy = \"signed\"\n",
        )
        .unwrap();

        let loaded = read_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.log_format, LogFormat::Json);
        assert_eq!(loaded.perception.world_size, 50);
        assert_eq!(loaded.perception.gate_policy, GatePolicy::Signed);
        assert_eq!(loaded.perception.frame_width, 320);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "log_format = [").unwrap();
        let err = read_from(&path).unwrap_err();
        assert!(err.contains("Failed to parse config"));
    }

    #[test]
    fn config_path_points_to_rover_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".rover"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("compact".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("pretty".parse::<LogFormat>().is_err());
    }

    // Each env test touches a distinct variable; file tests use `read_from`.

    #[test]
    fn apply_env_overrides_changes_world_size() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("ROVER_WORLD_SIZE", "64") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.perception.world_size, 64);
        unsafe { std::env::remove_var("ROVER_WORLD_SIZE") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_scale() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("ROVER_SCALE", "ten") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.perception.scale, 10.0);
        unsafe { std::env::remove_var("ROVER_SCALE") };
    }

    #[test]
    fn apply_env_overrides_changes_stability_epsilon() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("ROVER_STABILITY_EPSILON", "2.5") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.perception.stability_epsilon_deg, 2.5);
        unsafe { std::env::remove_var("ROVER_STABILITY_EPSILON") };
    }

    #[test]
    fn apply_env_overrides_changes_otlp_endpoint() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("ROVER_OTLP_ENDPOINT", "http://collector:4318") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.otlp_endpoint, "http://collector:4318");
        unsafe { std::env::remove_var("ROVER_OTLP_ENDPOINT") };
    }
}
