use std::fs;
use std::path::Path;

use env_logger::{Builder, Target};
use serde::Serialize;

use crate::config::{self, FormatConfig, SystemConfig};

#[derive(Serialize)]
struct FullConfig {
    system: SystemConfig,
    format: FormatConfig,
}

pub fn init(config_path: &Path) {
    ensure_config_exists(config_path);

    if let Err(e) = config::init(config_path) {
        eprintln!("Config load warning: {}", e);
    }

    init_logger();
}

/// Writes a config file holding every section's defaults if none exists yet.
fn ensure_config_exists(path: &Path) {
    if path.exists() {
        return;
    }

    let default_config = FullConfig {
        system: SystemConfig::default(),
        format: FormatConfig::default(),
    };

    let toml_str = match toml::to_string_pretty(&default_config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to serialize default config: {}", e);
            return;
        }
    };

    match fs::write(path, toml_str) {
        Ok(()) => eprintln!("Created default configuration at {:?}", path),
        Err(e) => eprintln!("Failed to write config file {:?}: {}", path, e),
    }
}

/// Logs go to stderr so `fmt` and `dump` output stays clean on stdout.
fn init_logger() {
    let sys_cfg: SystemConfig = config::get("system");
    let mut builder =
        Builder::from_env(env_logger::Env::default().default_filter_or(&sys_cfg.log_level));
    builder.target(Target::Stderr);
    builder.init();
}
