//! Loopfuse configuration stored in `loopfuse.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "loopfuse.toml";

/// Loopfuse configuration (TOML).
///
/// Missing fields default to sensible values, so an empty file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoopfuseConfig {
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Pending deferred operations the reference engine holds before it is
    /// forced to flush on its own.
    pub max_pending_ops: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pending_ops: 10_000,
        }
    }
}

impl LoopfuseConfig {
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_pending_ops == 0 {
            return Err(anyhow!("engine.max_pending_ops must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LoopfuseConfig::default()`.
pub fn load_config(path: &Path) -> Result<LoopfuseConfig> {
    if !path.exists() {
        let cfg = LoopfuseConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LoopfuseConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &LoopfuseConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, LoopfuseConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("loopfuse.toml");
        let cfg = LoopfuseConfig {
            engine: EngineConfig {
                max_pending_ops: 64,
            },
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("loopfuse.toml");
        fs::write(&path, "").expect("write");
        assert_eq!(load_config(&path).expect("load"), LoopfuseConfig::default());
    }

    #[test]
    fn zero_pending_ops_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("loopfuse.toml");
        fs::write(&path, "[engine]\nmax_pending_ops = 0\n").expect("write");
        let err = load_config(&path).expect_err("invalid config");
        assert!(err.to_string().contains("max_pending_ops"));
    }
}
