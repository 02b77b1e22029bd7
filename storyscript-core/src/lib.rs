//! Parser and code generator for the visual-novel scripting language.
//!
//! ```
//! use storyscript_core::{generate, parse};
//!
//! let result = parse("label start:\n    e \"Hello!\"\n    return\n", None);
//! assert!(result.errors.is_empty());
//! let again = parse(&generate(&result.ast), None);
//! assert!(again.ast.equivalent(&result.ast));
//! ```

pub mod ast;
pub mod codegen;
pub mod equiv;
pub mod error;
pub mod id;
pub mod lexer;
pub mod parser;
pub mod scanner;

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

pub use ast::{Script, Stmt, StmtKind};
pub use codegen::{Generator, generate};
pub use equiv::equivalent;
pub use error::Diagnostic;
pub use id::{IdGen, NodeFactory, NodeId};
pub use scanner::ScanOptions;

use ast::ScriptMeta;
use parser::Parser;

/// A best-effort tree plus everything that went wrong building it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub ast: Script,
    pub errors: Vec<Diagnostic>,
}

/// Parses `source` with default options and the process-wide id generator.
pub fn parse(source: &str, file: Option<&str>) -> ParseResult {
    parse_with(source, file, ScanOptions::default(), NodeFactory::default())
}

pub fn parse_with(
    source: &str,
    file: Option<&str>,
    options: ScanOptions,
    factory: NodeFactory<'_>,
) -> ParseResult {
    let (lines, mut errors) = scanner::scan(source, options);
    let (body, parse_errors) = Parser::new(&lines, factory).parse();
    errors.extend(parse_errors);
    errors.sort_by_key(|d| d.line);

    log::debug!(
        "parsed {} logical lines of {} into {} statements ({} diagnostics)",
        lines.len(),
        file.unwrap_or("<memory>"),
        body.len(),
        errors.len()
    );

    ParseResult {
        ast: Script {
            meta: ScriptMeta {
                file: file.map(str::to_string),
                parsed_at: Some(SystemTime::now()),
                ..ScriptMeta::default()
            },
            body,
        },
        errors,
    }
}
