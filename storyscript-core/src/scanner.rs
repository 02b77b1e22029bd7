//! Indentation scanner: source text to logical lines.
//!
//! Blank lines and full-line comments are dropped. Indentation is measured in
//! columns after tab expansion and tracked on a stack of open levels; a dedent
//! that lands between two open levels is reported and snapped to the enclosing
//! level, so the parser only ever sees columns that match an open block.

use crate::error::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Tabs advance to the next multiple of this width.
    pub tab_width: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self { tab_width: 4 }
    }
}

/// One statement-bearing source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// The line with its indentation removed.
    pub content: String,
    /// Indentation in columns.
    pub indent: usize,
    /// 1-based source line number.
    pub line: usize,
}

pub struct Scanner<'a> {
    src: &'a str,
    options: ScanOptions,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str, options: ScanOptions) -> Self {
        let src = src.strip_prefix('\u{feff}').unwrap_or(src);
        Scanner { src, options }
    }

    /// Splits leading whitespace off and returns its width in columns.
    fn measure<'l>(&self, line: &'l str) -> (usize, &'l str) {
        let tab = self.options.tab_width.max(1);
        let mut col = 0;
        for (i, c) in line.char_indices() {
            match c {
                ' ' => col += 1,
                '\t' => col = (col / tab + 1) * tab,
                _ => return (col, &line[i..]),
            }
        }
        (col, "")
    }

    pub fn run(self) -> (Vec<LogicalLine>, Vec<Diagnostic>) {
        let mut lines = Vec::new();
        let mut diags = Vec::new();
        // (source column, indent reported to the parser). A column that matched
        // no open block is kept with the indent it was snapped to, so later
        // lines at that column land at the same depth.
        let mut levels: Vec<(usize, usize)> = vec![(0, 0)];

        for (idx, raw) in self.src.lines().enumerate() {
            let line = idx + 1;
            let (col, content) = self.measure(raw);
            if content.trim().is_empty() || content.starts_with('#') {
                continue;
            }

            let (top_col, top_indent) = levels.last().copied().unwrap_or((0, 0));
            let indent = if col == top_col {
                top_indent
            } else if col > top_col {
                levels.push((col, col));
                col
            } else {
                while levels.len() > 1 && levels[levels.len() - 1].0 > col {
                    levels.pop();
                }
                let (enclosing_col, enclosing) = levels[levels.len() - 1];
                if enclosing_col != col {
                    log::warn!(
                        "line {}: dedent to column {} matches no open block, using column {}",
                        line,
                        col,
                        enclosing
                    );
                    diags.push(Diagnostic::new(
                        line,
                        format!("inconsistent indentation: column {col} does not match any enclosing block"),
                    ));
                    levels.push((col, enclosing));
                }
                enclosing
            };

            log::trace!("line {}: indent {} {:?}", line, indent, content);
            lines.push(LogicalLine {
                content: content.to_string(),
                indent,
                line,
            });
        }

        (lines, diags)
    }
}

/// Scans `src` with the given options.
pub fn scan(src: &str, options: ScanOptions) -> (Vec<LogicalLine>, Vec<Diagnostic>) {
    Scanner::new(src, options).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indents(src: &str) -> Vec<(usize, usize)> {
        scan(src, ScanOptions::default())
            .0
            .into_iter()
            .map(|l| (l.line, l.indent))
            .collect()
    }

    #[test]
    fn drops_blank_and_comment_lines() {
        let (lines, diags) = scan("# header\n\nlabel a:\n    # note\n    return\n", ScanOptions::default());
        assert!(diags.is_empty());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].content, "label a:");
        assert_eq!(lines[1].line, 5);
    }

    #[test]
    fn tabs_and_spaces_measure_alike() {
        assert_eq!(indents("a:\n\tb\n"), indents("a:\n    b\n"));
        assert_eq!(indents("a:\n  \tb\n"), vec![(1, 0), (2, 4)]);
    }

    #[test]
    fn inconsistent_dedent_snaps_to_enclosing_level() {
        let (lines, diags) = scan("a:\n    b:\n        c\n      d\n", ScanOptions::default());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 4);
        assert_eq!(lines[3].indent, 4);
    }

    #[test]
    fn snapped_column_stays_snapped_for_siblings() {
        let (lines, diags) = scan(
            "a:\n    b:\n        c\n      d\n      e\n    f\n",
            ScanOptions::default(),
        );
        assert_eq!(diags.len(), 1);
        let depths: Vec<usize> = lines.iter().map(|l| l.indent).collect();
        assert_eq!(depths, vec![0, 4, 8, 4, 4, 4]);
    }

    #[test]
    fn strips_bom_and_crlf() {
        let (lines, _) = scan("\u{feff}label a:\r\n    return\r\n", ScanOptions::default());
        assert_eq!(lines[0].content, "label a:");
        assert_eq!(lines[1].content, "return");
    }
}
