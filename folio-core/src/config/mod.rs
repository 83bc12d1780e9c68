//! Engine configuration — versioned schema, normalization, typed parsing, loading.
//!
//! - `normalize`: v0/v1 detection and the pure v0 → v1 migration
//! - `schema`: typed `EngineConfig` and its validating parser
//! - `loader`: YAML/TOML/JSON files → untyped mapping → `EngineConfig`

pub mod loader;
pub mod normalize;
pub mod schema;

pub use loader::{load_engine_config, load_raw_config};
pub use normalize::{migrate_v0_to_v1, normalize_config, SchemaVersion};
pub use schema::{
    parse_engine_config, ConfigError, Constraints, EngineConfig, EngineMeta, ModuleConfig,
};
