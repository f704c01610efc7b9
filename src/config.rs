use crate::error::{BracketError, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::{
    env,
    fs,
    io::Write,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

pub const DEFAULT_MAX_ENTRANTS: u32 = 128;

/// Engine tuning knobs supplied by the host application. Loaded from a JSON
/// file when one exists, with environment overrides on top.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
  pub max_entrants: u32,
  pub notifications_enabled: bool,
  pub audit_log_dir: String,
}

impl Default for EngineConfig {
  fn default() -> Self {
    EngineConfig {
      max_entrants: DEFAULT_MAX_ENTRANTS,
      notifications_enabled: true,
      audit_log_dir: "logs".to_string(),
    }
  }
}

pub fn config_path() -> PathBuf {
  if let Ok(raw) = env::var("BRACKET_ENGINE_CONFIG_PATH") {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return PathBuf::from(trimmed);
    }
  }
  PathBuf::from("bracket_engine.json")
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

pub fn env_flag_true_default(key: &str, default: bool) -> bool {
  match env::var(key) {
    Ok(value) => {
      let value = value.trim().to_ascii_lowercase();
      matches!(value.as_str(), "1" | "true" | "yes" | "on")
    }
    Err(_) => default,
  }
}

pub fn apply_env_defaults(mut config: EngineConfig) -> EngineConfig {
  if let Some(value) = env_default("BRACKET_MAX_ENTRANTS") {
    if let Ok(parsed) = value.parse::<u32>() {
      if parsed >= 2 {
        config.max_entrants = parsed;
      }
    }
  }
  config.notifications_enabled =
    env_flag_true_default("BRACKET_NOTIFICATIONS", config.notifications_enabled);
  if let Some(value) = env_default("BRACKET_AUDIT_LOG_DIR") {
    config.audit_log_dir = value;
  }
  config
}

pub fn load_config_inner() -> Result<EngineConfig> {
  let path = config_path();
  if !path.is_file() {
    return Ok(apply_env_defaults(EngineConfig::default()));
  }
  let data = fs::read_to_string(&path)
    .map_err(|e| BracketError::persistence(format!("read config {}: {e}", path.display())))?;
  let config = serde_json::from_str::<EngineConfig>(&data)
    .map_err(|e| BracketError::validation(format!("parse config {}: {e}", path.display())))?;
  Ok(apply_env_defaults(config))
}

pub fn now_ms() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis() as u64
}

// ── Audit log ──────────────────────────────────────────────────────────
//
// Multi-step mutations (bracket generation, override cascades) append a
// line here before they start touching rows, so a partial failure leaves
// enough behind for manual repair.

pub fn audit_log_path(config: &EngineConfig) -> PathBuf {
  PathBuf::from(&config.audit_log_dir).join("bracket_audit.log")
}

pub fn append_audit_log(config: &EngineConfig, label: &str, detail: &str) {
  let dir = PathBuf::from(&config.audit_log_dir);
  if fs::create_dir_all(&dir).is_err() {
    return;
  }
  let path = audit_log_path(config);
  let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
  let entry = format!("[{timestamp}] {label}\n{detail}\n\n");
  if let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(&path) {
    let _ = file.write_all(entry.as_bytes());
  }
}
