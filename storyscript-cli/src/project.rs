use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::info;
use walkdir::WalkDir;

use storyscript_core::{Generator, NodeFactory, ParseResult, ScanOptions, parse_with};

use crate::config::FormatConfig;

/// One script file read from disk together with its parse.
pub struct ScriptFile {
    pub path: PathBuf,
    pub source: String,
    pub result: ParseResult,
}

/// Loads scripts and regenerates them with the configured formatting.
pub struct Project {
    format: FormatConfig,
    pub files: Vec<ScriptFile>,
}

impl Project {
    pub fn new(format: FormatConfig) -> Self {
        Self {
            format,
            files: Vec::new(),
        }
    }

    /// Loads every file named in `paths`; directories are walked for the
    /// configured extension.
    pub fn load(&mut self, paths: &[PathBuf]) -> Result<()> {
        for path in paths {
            if path.is_dir() {
                self.load_dir(path)?;
            } else if path.is_file() {
                self.load_file(path)?;
            } else {
                bail!("No such file or directory: {:?}", path);
            }
        }
        info!("Loaded {} script files", self.files.len());
        Ok(())
    }

    fn load_dir(&mut self, root: &Path) -> Result<()> {
        info!("Scanning scripts under {:?}", root);
        let ext = self.format.extension.trim_start_matches('.').to_string();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {:?}", root))?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|e| e == ext.as_str()) {
                self.load_file(path)?;
            }
        }
        Ok(())
    }

    fn load_file(&mut self, path: &Path) -> Result<()> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read script: {:?}", path))?;
        let result = self.parse(&source, Some(&path.display().to_string()));
        log::debug!(
            "{:?}: {} statements, {} diagnostics",
            path,
            result.ast.body.len(),
            result.errors.len()
        );
        self.files.push(ScriptFile {
            path: path.to_path_buf(),
            source,
            result,
        });
        Ok(())
    }

    pub fn parse(&self, source: &str, file: Option<&str>) -> ParseResult {
        let options = ScanOptions {
            tab_width: self.format.tab_width,
        };
        parse_with(source, file, options, NodeFactory::default())
    }

    pub fn generator(&self) -> Generator {
        Generator::new(self.format.indent_width)
    }
}
