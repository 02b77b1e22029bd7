use std::fs;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use anyhow::Context;
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use toml::Table;

static GLOBAL_CONFIG: OnceCell<RwLock<Table>> = OnceCell::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Spaces per nesting level in generated scripts.
    pub indent_width: usize,
    /// Column width of a tab when measuring indentation.
    pub tab_width: usize,
    /// File extension picked up when walking directories.
    pub extension: String,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            indent_width: 4,
            tab_width: 4,
            extension: "rpy".into(),
        }
    }
}

/// Loads `path` into the process-wide table. A missing file or a syntax
/// error leaves every section at its default.
pub fn init<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();

    let content = if path.exists() {
        log::info!("Loading storyscript config from {:?}", path);
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?
    } else {
        log::warn!("No storyscript config at {:?}, formatting with defaults.", path);
        String::new()
    };

    let table: Table = toml::from_str(&content).unwrap_or_else(|e| {
        log::error!("Syntax error in {:?}: {}, formatting with defaults.", path, e);
        Table::new()
    });

    GLOBAL_CONFIG
        .set(RwLock::new(table))
        .map_err(|_| anyhow::anyhow!("Config already loaded; refusing to load {:?} as well", path))?;

    Ok(())
}

/// Reads section `[key]`, falling back to `T::default()` when it is missing,
/// malformed, or the config was never loaded.
pub fn get<T: DeserializeOwned + Default>(key: &str) -> T {
    let Some(store) = GLOBAL_CONFIG.get() else {
        log::warn!("Config read before init, using defaults for '[{}]'.", key);
        return T::default();
    };
    let read_guard = store.read().unwrap_or_else(PoisonError::into_inner);
    section(&read_guard, key)
}

fn section<T: DeserializeOwned + Default>(table: &Table, key: &str) -> T {
    if let Some(value) = table.get(key) {
        value.clone().try_into().unwrap_or_else(|e| {
            log::warn!("Config section '[{}]' mismatch: {}. Using default.", key, e);
            T::default()
        })
    } else {
        T::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_section_keeps_defaults() {
        let table: Table = toml::from_str("[format]\nindent_width = 2\n").unwrap();
        let format: FormatConfig = section(&table, "format");
        assert_eq!(format.indent_width, 2);
        assert_eq!(format.tab_width, 4);
        assert_eq!(format.extension, "rpy");
    }

    #[test]
    fn second_load_names_the_rejected_file() {
        let first = std::env::temp_dir().join("storyscript-config-missing-a.toml");
        let second = std::env::temp_dir().join("storyscript-config-missing-b.toml");
        init(&first).unwrap();
        let err = init(&second).unwrap_err().to_string();
        assert!(err.contains("storyscript-config-missing-b.toml"), "{err}");
        let format: FormatConfig = get("format");
        assert_eq!(format.extension, "rpy");
    }

    #[test]
    fn mismatched_section_falls_back() {
        let table: Table = toml::from_str("[system]\nlog_level = 3\n").unwrap();
        let system: SystemConfig = section(&table, "system");
        assert_eq!(system.log_level, "warn");
        let missing: FormatConfig = section(&table, "format");
        assert_eq!(missing.indent_width, 4);
    }
}
