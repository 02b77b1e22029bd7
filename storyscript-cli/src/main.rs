mod config;
mod project;
mod setup;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::FormatConfig;
use crate::project::Project;

/// Checks, formats and inspects visual-novel scripts.
#[derive(Parser)]
#[command(name = "storyscript", version, about = "Visual-novel script toolchain")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "storyscript.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse scripts and report diagnostics
    Check {
        /// Script files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Regenerate scripts in canonical form
    Fmt {
        /// Script files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Write the result back instead of printing it
        #[arg(long)]
        write: bool,
    },

    /// Print the parsed tree as JSON
    Dump {
        /// Script file
        path: PathBuf,
        /// Indent the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Verify that generate-then-parse preserves every script
    Roundtrip {
        /// Script files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup::init(&cli.config);
    log::debug!(">>> storyscript {} <<<", env!("CARGO_PKG_VERSION"));

    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Runs one command. `Ok(false)` means the scripts had problems.
fn run(command: Commands) -> Result<bool> {
    let format: FormatConfig = config::get("format");
    let mut project = Project::new(format);

    match command {
        Commands::Check { paths } => {
            project.load(&paths)?;
            check(&project)
        }
        Commands::Fmt { paths, write } => {
            project.load(&paths)?;
            fmt(&project, write)
        }
        Commands::Dump { path, pretty } => {
            project.load(std::slice::from_ref(&path))?;
            dump(&project, pretty)
        }
        Commands::Roundtrip { paths } => {
            project.load(&paths)?;
            Ok(roundtrip(&project))
        }
    }
}

fn check(project: &Project) -> Result<bool> {
    let mut total = 0;
    for file in &project.files {
        for diag in &file.result.errors {
            println!("{}:{}: {}", file.path.display(), diag.line, diag.message);
        }
        total += file.result.errors.len();
    }
    log::info!(
        "Checked {} files, {} diagnostics",
        project.files.len(),
        total
    );
    Ok(total == 0)
}

fn fmt(project: &Project, write: bool) -> Result<bool> {
    let generator = project.generator();
    for file in &project.files {
        if !file.result.errors.is_empty() {
            log::warn!(
                "{:?} has {} diagnostics; unparsed lines are kept verbatim",
                file.path,
                file.result.errors.len()
            );
        }
        let text = generator.generate(&file.result.ast);
        if !write {
            print!("{}", text);
        } else if text != file.source {
            fs::write(&file.path, &text)
                .with_context(|| format!("Failed to write {:?}", file.path))?;
            log::info!("Formatted {:?}", file.path);
        }
    }
    Ok(true)
}

fn dump(project: &Project, pretty: bool) -> Result<bool> {
    for file in &project.files {
        let json = if pretty {
            serde_json::to_string_pretty(&file.result)?
        } else {
            serde_json::to_string(&file.result)?
        };
        println!("{}", json);
    }
    Ok(true)
}

fn roundtrip(project: &Project) -> bool {
    let generator = project.generator();
    let mut ok = true;
    for file in &project.files {
        let first = generator.generate(&file.result.ast);
        let reparsed = project.parse(&first, None);
        let second = generator.generate(&reparsed.ast);

        if !reparsed.ast.equivalent(&file.result.ast) {
            let before = &file.result.ast.body;
            let after = &reparsed.ast.body;
            let idx = before
                .iter()
                .zip(after)
                .position(|(a, b)| !a.equivalent(b))
                .unwrap_or(before.len().min(after.len()));
            match before.get(idx) {
                Some(stmt) => println!(
                    "{}:{}: `{}` changed after regeneration",
                    file.path.display(),
                    stmt.line.unwrap_or(0),
                    stmt.kind.tag()
                ),
                None => println!("{}: tree changed after regeneration", file.path.display()),
            }
            ok = false;
        } else if first != second {
            println!("{}: regeneration is not stable", file.path.display());
            ok = false;
        } else {
            log::debug!("{:?}: round trip ok", file.path);
        }
    }
    ok
}
