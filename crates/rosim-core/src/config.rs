//! TOML loading for [`InterfaceConfig`], with `ROSIM_*` env overrides.
//!
//! The recognized options are exactly the two the interface layer consumes:
//! `default_namespace` and `use_entity_name_as_namespace`.

use std::fs;
use std::path::Path;

use rosim_types::InterfaceConfig;

/// Load the config from `path`.  Returns `None` if the file does not exist.
///
/// Env overrides are applied on top of whatever the file contains.
pub fn load_from(path: &Path) -> Result<Option<InterfaceConfig>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: InterfaceConfig =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Load from `path`, falling back to defaults (plus env overrides) when the
/// file is missing.
pub fn load_or_default(path: &Path) -> Result<InterfaceConfig, String> {
    match load_from(path)? {
        Some(cfg) => Ok(cfg),
        None => {
            let mut cfg = InterfaceConfig::default();
            apply_env_overrides(&mut cfg);
            Ok(cfg)
        }
    }
}

/// Apply `ROSIM_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROSIM_NAMESPACE` | `default_namespace` |
/// | `ROSIM_USE_ENTITY_NAME` | `use_entity_name_as_namespace` |
pub fn apply_env_overrides(cfg: &mut InterfaceConfig) {
    if let Ok(v) = std::env::var("ROSIM_NAMESPACE") {
        cfg.default_namespace = v;
    }
    if let Ok(v) = std::env::var("ROSIM_USE_ENTITY_NAME")
        && let Ok(flag) = v.parse::<bool>()
    {
        cfg.use_entity_name_as_namespace = flag;
    }
}

/// Save the config to `path`, creating parent directories if necessary.
pub fn save_to(cfg: &InterfaceConfig, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("rosim.toml");

        let cfg = InterfaceConfig::default();
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("rosim.toml");
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn load_or_default_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("rosim.toml");
        let cfg = load_or_default(&path).expect("ok");
        assert_eq!(cfg, InterfaceConfig::default());
    }

    #[test]
    fn partial_file_keeps_field_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("rosim.toml");
        fs::write(&path, "default_namespace = \"warehouse\"\n").unwrap();

        let loaded = load_from(&path).expect("ok").expect("some");
        assert_eq!(loaded.default_namespace, "warehouse");
        assert!(loaded.use_entity_name_as_namespace);
    }

    #[test]
    fn env_override_changes_namespace() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("ROSIM_NAMESPACE", "cell_7") };
        let mut cfg = InterfaceConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.default_namespace, "cell_7");
        unsafe { std::env::remove_var("ROSIM_NAMESPACE") };
    }

    #[test]
    fn env_override_ignores_invalid_flag() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("ROSIM_USE_ENTITY_NAME", "not-a-bool") };
        let mut cfg = InterfaceConfig::default();
        apply_env_overrides(&mut cfg);
        assert!(cfg.use_entity_name_as_namespace);
        unsafe { std::env::remove_var("ROSIM_USE_ENTITY_NAME") };
    }
}
