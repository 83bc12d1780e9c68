//! Config file loading — YAML, TOML or JSON into an untyped mapping.
//!
//! The format is picked by file extension. Every format is read into a
//! `serde_json::Value` so normalization and parsing see one representation.

use std::path::Path;

use serde_json::Value;

use super::normalize::normalize_config;
use super::schema::{parse_engine_config, ConfigError, EngineConfig};

/// Read a config file into an untyped mapping without normalizing it.
pub fn load_raw_config(path: &Path) -> Result<Value, ConfigError> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display.clone(),
        source,
    })?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let parse_err = |reason: String| ConfigError::Parse {
        path: display.clone(),
        reason,
    };

    let value = match ext.as_str() {
        "yaml" | "yml" => {
            serde_yaml::from_str::<Value>(&text).map_err(|e| parse_err(e.to_string()))?
        }
        "toml" => {
            let table: toml::Value = toml::from_str(&text).map_err(|e| parse_err(e.to_string()))?;
            serde_json::to_value(table).map_err(|e| parse_err(e.to_string()))?
        }
        "json" => serde_json::from_str::<Value>(&text).map_err(|e| parse_err(e.to_string()))?,
        _ => return Err(ConfigError::UnsupportedFormat(display)),
    };

    // An empty YAML document loads as null; treat it as an empty mapping.
    Ok(match value {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    })
}

/// Load, normalize and parse a config file.
pub fn load_engine_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let raw = load_raw_config(path)?;
    let canonical = normalize_config(&raw);
    let config = parse_engine_config(&canonical)?;
    tracing::debug!(
        path = %path.display(),
        fingerprint = %config.fingerprint(),
        "loaded engine config"
    );
    Ok(config)
}

impl EngineConfig {
    /// Convenience for [`load_engine_config`].
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        load_engine_config(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    const LEGACY_YAML: &str = "\
engine:
  name: portfolio_engine
  version: 0.1
strategy:
  name: beta_engine_60_40
  weights:
    SPY: 60
    TLT: 40
rebalancer:
  type: monthly
constraints:
  leverage: false
";

    #[test]
    fn loads_legacy_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "config.yaml", LEGACY_YAML);
        let cfg = load_engine_config(&path).unwrap();
        assert_eq!(cfg.engine.version, "0.1");
        assert_eq!(cfg.allocation_model.module_type, "beta_engine_60_40");
        assert_eq!(cfg.overlays.len(), 2);
        assert_eq!(cfg.allocator.module_type, "capital_allocator");
    }

    #[test]
    fn toml_and_json_match_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write(&dir, "a.yml", LEGACY_YAML);
        let toml_body = "\
[engine]
name = \"portfolio_engine\"
version = \"0.1\"

[strategy]
name = \"beta_engine_60_40\"

[strategy.weights]
SPY = 60
TLT = 40

[rebalancer]
type = \"monthly\"

[constraints]
leverage = false
";
        let toml_path = write(&dir, "a.toml", toml_body);
        let json_body = r#"{"engine":{"name":"portfolio_engine","version":"0.1"},
            "strategy":{"name":"beta_engine_60_40","weights":{"SPY":60,"TLT":40}},
            "rebalancer":{"type":"monthly"},"constraints":{"leverage":false}}"#;
        let json_path = write(&dir, "a.json", json_body);

        let a = load_engine_config(&yaml).unwrap();
        let b = load_engine_config(&toml_path).unwrap();
        let c = load_engine_config(&json_path).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn empty_yaml_is_empty_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "empty.yaml", "");
        assert_eq!(load_raw_config(&path).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "config.ini", "x=1");
        assert!(matches!(
            load_raw_config(&path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_raw_config(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "bad.yaml", "engine: [unclosed");
        assert!(matches!(
            load_raw_config(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
