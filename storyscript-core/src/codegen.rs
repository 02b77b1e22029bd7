//! AST to source text.
//!
//! Output is deterministic: one line per simple statement, a header plus an
//! indented block for compound ones, and the same indentation width at every
//! depth. Absent optional fields emit nothing.

use std::fmt::Write;

use crate::ast::{Branch, Choice, ImageExtras, Script, Stmt, StmtKind};

pub struct Generator {
    indent_width: usize,
}

impl Default for Generator {
    fn default() -> Self {
        Self { indent_width: 4 }
    }
}

impl Generator {
    pub fn new(indent_width: usize) -> Self {
        Self {
            indent_width: indent_width.max(1),
        }
    }

    pub fn generate(&self, script: &Script) -> String {
        let mut out = String::new();
        self.block(&mut out, &script.body, 0);
        log::debug!(
            "generated {} bytes from {} top-level statements",
            out.len(),
            script.body.len()
        );
        out
    }

    fn line(&self, out: &mut String, depth: usize, text: &str) {
        for _ in 0..depth * self.indent_width {
            out.push(' ');
        }
        out.push_str(text);
        out.push('\n');
    }

    fn block(&self, out: &mut String, stmts: &[Stmt], depth: usize) {
        for stmt in stmts {
            self.stmt(out, stmt, depth);
        }
    }

    /// A nested block; `pass` stands in for an empty one.
    fn body(&self, out: &mut String, stmts: &[Stmt], depth: usize) {
        if stmts.is_empty() {
            self.line(out, depth, "pass");
        } else {
            self.block(out, stmts, depth);
        }
    }

    fn stmt(&self, out: &mut String, stmt: &Stmt, depth: usize) {
        match &stmt.kind {
            StmtKind::Label { name, params, body } => {
                let mut head = format!("label {name}");
                if !params.is_empty() {
                    let _ = write!(head, "({})", params.join(", "));
                }
                head.push(':');
                self.line(out, depth, &head);
                self.body(out, body, depth + 1);
            }
            StmtKind::Dialogue {
                speaker,
                text,
                extras,
            } => {
                let mut s = String::new();
                if extras.extend {
                    s.push_str("extend ");
                } else if let Some(speaker) = speaker {
                    s.push_str(speaker);
                    s.push(' ');
                }
                s.push_str(&quote(text));
                for attr in &extras.attributes {
                    s.push(' ');
                    s.push_str(attr);
                }
                if let Some(t) = &extras.transition {
                    let _ = write!(s, " with {t}");
                }
                self.line(out, depth, &s);
            }
            StmtKind::Menu { choices, extras } => {
                match &extras.screen {
                    Some(screen) => {
                        self.line(out, depth, &format!("menu (screen={}):", quote(screen)))
                    }
                    None => self.line(out, depth, "menu:"),
                }
                if let Some(prompt) = &extras.prompt {
                    let text = match &prompt.speaker {
                        Some(speaker) => format!("{speaker} {}", quote(&prompt.text)),
                        None => quote(&prompt.text),
                    };
                    self.line(out, depth + 1, &text);
                }
                if let Some(var) = &extras.result_var {
                    self.line(out, depth + 1, &format!("set {var}"));
                }
                for choice in choices {
                    self.choice(out, choice, depth + 1);
                }
            }
            StmtKind::Scene { image, extras } => {
                let mut s = String::from("scene");
                if let Some(image) = image {
                    s.push(' ');
                    s.push_str(image);
                }
                image_clauses(&mut s, extras);
                self.line(out, depth, &s);
            }
            StmtKind::Show { image, extras } => {
                let mut s = format!("show {image}");
                image_clauses(&mut s, extras);
                self.line(out, depth, &s);
            }
            StmtKind::Hide { image, extras } => {
                let mut s = format!("hide {image}");
                image_clauses(&mut s, extras);
                self.line(out, depth, &s);
            }
            StmtKind::With { transition } => self.line(out, depth, &format!("with {transition}")),
            StmtKind::Jump { target, expression } => {
                let s = if expression.unwrap_or(false) {
                    format!("jump expression {target}")
                } else {
                    format!("jump {target}")
                };
                self.line(out, depth, &s);
            }
            StmtKind::Call {
                target,
                expression,
                args,
                from,
            } => {
                let mut s = String::from("call ");
                let expression = expression.unwrap_or(false);
                if expression {
                    s.push_str("expression ");
                }
                s.push_str(target);
                if !args.is_empty() {
                    if expression {
                        s.push_str(" pass ");
                    }
                    let _ = write!(s, "({})", args.join(", "));
                }
                if let Some(from) = from {
                    let _ = write!(s, " from {from}");
                }
                self.line(out, depth, &s);
            }
            StmtKind::Return { value } => match value {
                Some(v) => self.line(out, depth, &format!("return {v}")),
                None => self.line(out, depth, "return"),
            },
            StmtKind::If { branches } => {
                for (i, branch) in branches.iter().enumerate() {
                    self.branch(out, branch, i == 0, depth);
                }
            }
            StmtKind::Set { var, op, value } => {
                self.line(out, depth, &format!("$ {var} {} {value}", op.as_str()))
            }
            StmtKind::Python { code, early, hide } => {
                let mut head = String::from("python");
                if *early {
                    head.push_str(" early");
                }
                if *hide {
                    head.push_str(" hide");
                }
                head.push(':');
                self.line(out, depth, &head);
                if code.trim().is_empty() {
                    self.line(out, depth + 1, "pass");
                }
                for code_line in code.lines() {
                    self.line(out, depth + 1, code_line);
                }
            }
            StmtKind::Define { name, value, store } => {
                let s = match store {
                    Some(store) => format!("define {store}.{name} = {value}"),
                    None => format!("define {name} = {value}"),
                };
                self.line(out, depth, &s);
            }
            StmtKind::Default { name, value } => {
                self.line(out, depth, &format!("default {name} = {value}"))
            }
            StmtKind::Play {
                channel,
                file,
                options,
            } => {
                let verb = if options.queue { "queue" } else { "play" };
                let mut s = format!("{verb} {} {}", channel.as_str(), quote(file));
                if let Some(f) = options.fade_in {
                    let _ = write!(s, " fadein {}", number(f));
                }
                if let Some(v) = options.volume {
                    let _ = write!(s, " volume {}", number(v));
                }
                match options.r#loop {
                    Some(true) => s.push_str(" loop"),
                    Some(false) => s.push_str(" noloop"),
                    None => {}
                }
                self.line(out, depth, &s);
            }
            StmtKind::Stop { channel, fade_out } => {
                let mut s = format!("stop {}", channel.as_str());
                if let Some(f) = fade_out {
                    let _ = write!(s, " fadeout {}", number(*f));
                }
                self.line(out, depth, &s);
            }
            StmtKind::Pause { duration } => match duration {
                Some(d) => self.line(out, depth, &format!("pause {}", number(*d))),
                None => self.line(out, depth, "pause"),
            },
            StmtKind::Nvl { action } => self.line(out, depth, &format!("nvl {}", action.as_str())),
            StmtKind::Raw { content } => {
                for raw_line in content.split('\n') {
                    self.line(out, depth, raw_line);
                }
            }
        }
    }

    fn choice(&self, out: &mut String, choice: &Choice, depth: usize) {
        let mut head = quote(&choice.text);
        if let Some(cond) = &choice.condition {
            let _ = write!(head, " if {cond}");
        }
        head.push(':');
        self.line(out, depth, &head);
        self.body(out, &choice.body, depth + 1);
    }

    fn branch(&self, out: &mut String, branch: &Branch, first: bool, depth: usize) {
        let head = match (&branch.condition, first) {
            (Some(cond), true) => format!("if {cond}:"),
            (Some(cond), false) => format!("elif {cond}:"),
            (None, _) => "else:".to_string(),
        };
        self.line(out, depth, &head);
        self.body(out, &branch.body, depth + 1);
    }
}

fn image_clauses(s: &mut String, extras: &ImageExtras) {
    for attr in &extras.attributes {
        s.push(' ');
        s.push_str(attr);
    }
    if let Some(p) = &extras.position {
        let _ = write!(s, " at {p}");
    }
    if let Some(l) = &extras.layer {
        let _ = write!(s, " onlayer {l}");
    }
    if let Some(z) = extras.zorder {
        let _ = write!(s, " zorder {z}");
    }
    if let Some(t) = &extras.as_tag {
        let _ = write!(s, " as {t}");
    }
    if let Some(b) = &extras.behind {
        let _ = write!(s, " behind {b}");
    }
    if let Some(t) = &extras.transition {
        let _ = write!(s, " with {t}");
    }
}

/// Double-quotes `s`, escaping what the lexer decodes.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Renders a number so the lexer reads back the same value.
pub fn number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.1}")
    } else {
        format!("{n}")
    }
}

/// Generates source for `script` with the default indentation width.
pub fn generate(script: &Script) -> String {
    Generator::default().generate(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_escapes_what_the_lexer_decodes() {
        assert_eq!(quote("say \"hi\"\n"), r#""say \"hi\"\n""#);
        assert_eq!(quote(r"a\b"), r#""a\\b""#);
    }

    #[test]
    fn numbers_keep_a_decimal() {
        assert_eq!(number(1.0), "1.0");
        assert_eq!(number(0.25), "0.25");
        assert_eq!(number(2.5), "2.5");
    }
}
