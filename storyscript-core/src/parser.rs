//! Recursive-descent statement parser over logical lines.
//!
//! Each line at the current block's column is dispatched on its leading
//! keyword. Compound statements (`label`, `if`, `menu`, `python`) consume
//! their header and recurse into the deeper block that follows. Anything the
//! rules do not recognize, together with the block nested under it, becomes a
//! `Raw` statement so no source is ever lost.

use std::sync::LazyLock;

use regex::Regex;

use crate::ast::{
    AssignOp, AudioChannel, AudioOptions, Branch, Choice, DialogueExtras, ImageExtras, MenuExtras,
    NvlAction, Prompt, Stmt, StmtKind,
};
use crate::error::Diagnostic;
use crate::id::NodeFactory;
use crate::lexer::{Tok, TokKind, tokenize};
use crate::scanner::LogicalLine;

static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([\p{XID_Start}_]\p{XID_Continue}*(?:\.[\p{XID_Start}_]\p{XID_Continue}*)*)\s*(//=|\*\*=|\+=|-=|\*=|/=|%=|\|=|&=|\^=|=)\s*(.*)$",
    )
    .expect("assignment pattern is valid")
});

const IMAGE_CLAUSES: [&str; 6] = ["at", "onlayer", "zorder", "as", "behind", "with"];

/// What a statement rule decided about its line.
enum Outcome {
    Node(StmtKind),
    /// Not a shape this parser knows; keep the source verbatim.
    Raw,
    /// A known statement written incorrectly; keep the source verbatim and report.
    Invalid(String),
}

/// A logical line prepared for the statement rules: tokens without a trailing
/// comment, and the text they cover.
struct Header<'a> {
    line: &'a LogicalLine,
    toks: Vec<Tok>,
    text: &'a str,
}

impl<'a> Header<'a> {
    fn new(line: &'a LogicalLine) -> Result<Self, String> {
        let mut toks = tokenize(&line.content).map_err(|e| format!("malformed string: {e}"))?;
        let mut text = line.content.as_str();
        if let Some(Tok {
            kind: TokKind::Comment(_),
            span,
        }) = toks.last()
        {
            text = &text[..span.start];
            toks.pop();
        }
        Ok(Header {
            line,
            toks,
            text: text.trim_end(),
        })
    }

    fn kind(&self, idx: usize) -> Option<&TokKind> {
        self.toks.get(idx).map(|t| &t.kind)
    }

    fn ident(&self, idx: usize) -> Option<&str> {
        self.kind(idx).and_then(TokKind::as_ident)
    }

    fn is(&self, idx: usize, word: &str) -> bool {
        self.ident(idx) == Some(word)
    }

    /// Text from the start of token `from` to the end of the line.
    fn rest(&self, from: usize) -> &'a str {
        match self.toks.get(from) {
            Some(t) => self.text[t.span.start..].trim(),
            None => "",
        }
    }

    /// Text covering tokens `from..to`.
    fn slice(&self, from: usize, to: usize) -> &'a str {
        if from >= to {
            return "";
        }
        self.text[self.toks[from].span.start..self.toks[to - 1].span.end].trim()
    }

    /// `a.b.c` or `.local`, written without spaces. Returns the name and the
    /// index of the first token after it.
    fn dotted(&self, from: usize) -> Option<(&'a str, usize)> {
        let mut idx = from;
        if matches!(self.kind(idx), Some(TokKind::Dot)) {
            idx += 1;
        }
        self.ident(idx)?;
        idx += 1;
        while matches!(self.kind(idx), Some(TokKind::Dot))
            && self.ident(idx + 1).is_some()
            && self.toks[idx].span.start == self.toks[idx - 1].span.end
            && self.toks[idx + 1].span.start == self.toks[idx].span.end
        {
            idx += 2;
        }
        Some((self.slice(from, idx), idx))
    }

    /// Index of the bracket closing the one opened at `open`.
    fn matching(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (idx, tok) in self.toks.iter().enumerate().skip(open) {
            match tok.kind {
                TokKind::LParen | TokKind::LBracket | TokKind::LBrace => depth += 1,
                TokKind::RParen | TokKind::RBracket | TokKind::RBrace => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(idx);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Comma separated items inside the parentheses opened at `open`.
    /// Returns the items and the index after the closing parenthesis.
    fn paren_list(&self, open: usize) -> Option<(Vec<String>, usize)> {
        if !matches!(self.kind(open), Some(TokKind::LParen)) {
            return None;
        }
        let close = self.matching(open)?;
        let mut items = Vec::new();
        let mut start = open + 1;
        let mut depth = 0usize;
        for idx in open + 1..close {
            match self.toks[idx].kind {
                TokKind::LParen | TokKind::LBracket | TokKind::LBrace => depth += 1,
                TokKind::RParen | TokKind::RBracket | TokKind::RBrace => depth -= 1,
                TokKind::Comma if depth == 0 => {
                    items.push(self.slice(start, idx).to_string());
                    start = idx + 1;
                }
                _ => {}
            }
        }
        items.push(self.slice(start, close).to_string());
        items.retain(|s| !s.is_empty());
        Some((items, close + 1))
    }

    /// Index of the next token at bracket depth zero that is one of `words`.
    fn find_word(&self, from: usize, words: &[&str]) -> Option<usize> {
        let mut depth = 0usize;
        for (idx, tok) in self.toks.iter().enumerate().skip(from) {
            match &tok.kind {
                TokKind::LParen | TokKind::LBracket | TokKind::LBrace => depth += 1,
                TokKind::RParen | TokKind::RBracket | TokKind::RBrace => {
                    depth = depth.saturating_sub(1)
                }
                TokKind::Ident(w) if depth == 0 && words.contains(&w.as_str()) => return Some(idx),
                _ => {}
            }
        }
        None
    }

    /// Text between token `from` and a trailing colon.
    fn colon_header(&self, from: usize, what: &str) -> Result<&'a str, Outcome> {
        match self.toks.last() {
            Some(Tok {
                kind: TokKind::Colon,
                ..
            }) => Ok(self.slice(from, self.toks.len() - 1)),
            _ => Err(Outcome::Invalid(format!(
                "expected ':' at the end of the {what} header"
            ))),
        }
    }

    fn ends_with_colon(&self) -> bool {
        matches!(self.toks.last().map(|t| &t.kind), Some(TokKind::Colon))
    }
}

pub struct Parser<'a, 'g> {
    lines: &'a [LogicalLine],
    cursor: usize,
    factory: NodeFactory<'g>,
    diags: Vec<Diagnostic>,
}

impl<'a, 'g> Parser<'a, 'g> {
    pub fn new(lines: &'a [LogicalLine], factory: NodeFactory<'g>) -> Self {
        Self {
            lines,
            cursor: 0,
            factory,
            diags: Vec::new(),
        }
    }

    /// Parses every line into a statement list. Never fails; problems are
    /// returned as diagnostics next to a best-effort tree.
    pub fn parse(mut self) -> (Vec<Stmt>, Vec<Diagnostic>) {
        let body = self.block(0);
        if self.cursor != self.lines.len() {
            unreachable!("top-level block stopped at line {}", self.lines[self.cursor].line);
        }
        (body, self.diags)
    }

    fn peek(&self) -> Option<&'a LogicalLine> {
        self.lines.get(self.cursor)
    }

    fn error(&mut self, line: usize, msg: impl Into<String>) {
        let diag = Diagnostic::new(line, msg);
        log::debug!("{}", diag);
        self.diags.push(diag);
    }

    fn block(&mut self, indent: usize) -> Vec<Stmt> {
        let mut body = Vec::new();
        while let Some(line) = self.peek() {
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                self.error(line.line, "unexpected indentation");
                body.push(self.raw_run(indent));
                continue;
            }
            body.push(self.stmt());
        }
        body
    }

    /// Captures the line at the cursor plus every following line deeper than
    /// `base` into one `Raw` statement. Every line keeps its indentation past
    /// `base`, so an over-indented run is still over-indented when regenerated.
    fn raw_run(&mut self, base: usize) -> Stmt {
        let lines = self.lines;
        let first = &lines[self.cursor];
        let mut content = format!(
            "{}{}",
            " ".repeat(first.indent.saturating_sub(base)),
            first.content
        );
        self.cursor += 1;
        while let Some(next) = self.peek() {
            if next.indent <= base {
                break;
            }
            content.push('\n');
            content.push_str(&" ".repeat(next.indent - base));
            content.push_str(&next.content);
            self.cursor += 1;
        }
        self.factory.node(StmtKind::Raw { content }, Some(first.line))
    }

    fn raw_block(&mut self) -> Stmt {
        let indent = self.lines[self.cursor].indent;
        self.raw_run(indent)
    }

    fn stmt(&mut self) -> Stmt {
        let lines = self.lines;
        let line = &lines[self.cursor];
        let start = self.cursor;
        let h = match Header::new(line) {
            Ok(h) => h,
            Err(msg) => {
                self.error(line.line, msg);
                return self.raw_block();
            }
        };

        let mark = self.diags.len();
        let mut outcome = match h.kind(0) {
            Some(TokKind::Ident(word)) => match word.as_str() {
                "label" => self.label(&h),
                "if" => self.if_chain(&h),
                "elif" | "else" => Outcome::Invalid(format!("`{word}` without a preceding `if`")),
                "menu" => self.menu(&h),
                "python" => self.python(&h),
                "scene" | "show" | "hide" => image(&h),
                "with" => with(&h),
                "jump" => jump(&h),
                "call" => call(&h),
                "return" => ret(&h),
                "define" => define(&h),
                "default" => default(&h),
                "play" | "queue" => play(&h),
                "stop" => stop(&h),
                "pause" => pause(&h),
                "nvl" => nvl(&h),
                "extend" => dialogue(&h, None, true),
                _ if matches!(h.kind(1), Some(TokKind::Str(_))) => {
                    dialogue(&h, Some(word.clone()), false)
                }
                _ => Outcome::Raw,
            },
            Some(TokKind::Str(_)) => dialogue(&h, None, false),
            Some(TokKind::Dollar) => dollar(&h),
            _ => Outcome::Raw,
        };

        // `show "Hi"` is a character named `show` speaking.
        if matches!(outcome, Outcome::Raw | Outcome::Invalid(_)) {
            if let (Some(TokKind::Ident(speaker)), Some(TokKind::Str(_))) = (h.kind(0), h.kind(1)) {
                if let Outcome::Node(kind) = dialogue(&h, Some(speaker.clone()), false) {
                    self.cursor = start;
                    self.diags.truncate(mark);
                    outcome = Outcome::Node(kind);
                }
            }
        }

        match outcome {
            Outcome::Node(kind) => {
                if self.cursor == start {
                    self.cursor += 1;
                }
                self.factory.node(kind, Some(line.line))
            }
            Outcome::Raw => {
                self.cursor = start;
                self.raw_block()
            }
            Outcome::Invalid(msg) => {
                self.cursor = start;
                self.error(line.line, msg);
                self.raw_block()
            }
        }
    }

    /// Parses the block nested under `header` (whose line the cursor has
    /// already moved past). A block holding only `pass` is empty.
    fn body(&mut self, header: &LogicalLine, what: &str) -> Vec<Stmt> {
        let Some(first) = self.peek().filter(|l| l.indent > header.indent) else {
            self.error(header.line, format!("{what} expects a non-empty block"));
            return Vec::new();
        };
        if self.lone_pass(header) {
            self.cursor += 1;
            return Vec::new();
        }
        self.block(first.indent)
    }

    /// Whether the block under `header` is a single `pass` line.
    fn lone_pass(&self, header: &LogicalLine) -> bool {
        let is_pass = self
            .peek()
            .and_then(|l| Header::new(l).ok())
            .is_some_and(|h| h.toks.len() == 1 && h.is(0, "pass"));
        is_pass
            && self
                .lines
                .get(self.cursor + 1)
                .is_none_or(|next| next.indent <= header.indent)
    }

    fn label(&mut self, h: &Header) -> Outcome {
        let Some((name, mut idx)) = h.dotted(1) else {
            return Outcome::Invalid("expected a label name".into());
        };
        let mut params = Vec::new();
        if matches!(h.kind(idx), Some(TokKind::LParen)) {
            match h.paren_list(idx) {
                Some((list, next)) => {
                    params = list;
                    idx = next;
                }
                None => return Outcome::Invalid("unclosed parameter list".into()),
            }
        }
        match h.kind(idx) {
            Some(TokKind::Colon) if idx + 1 == h.toks.len() => {}
            None => return Outcome::Invalid("expected ':' at the end of the label header".into()),
            _ => return Outcome::Raw,
        }
        let name = name.to_string();
        self.cursor += 1;
        let body = self.body(h.line, "label");
        Outcome::Node(StmtKind::Label { name, params, body })
    }

    fn if_chain(&mut self, h: &Header) -> Outcome {
        let cond = match h.colon_header(1, "if") {
            Ok(c) => c,
            Err(o) => return o,
        };
        if cond.is_empty() {
            return Outcome::Invalid("`if` without a condition".into());
        }
        self.cursor += 1;
        let mut branches = vec![Branch {
            condition: Some(cond.to_string()),
            body: self.body(h.line, "if"),
        }];

        let mut seen_else = false;
        while let Some(next) = self.peek() {
            if next.indent != h.line.indent {
                break;
            }
            let Ok(nh) = Header::new(next) else { break };
            let condition = if nh.is(0, "elif") {
                match nh.colon_header(1, "elif") {
                    Ok(c) if !c.is_empty() => Some(c.to_string()),
                    _ => break,
                }
            } else if nh.is(0, "else") {
                if nh.toks.len() != 2 || !nh.ends_with_colon() {
                    break;
                }
                None
            } else {
                break;
            };

            if seen_else {
                let word = if condition.is_some() { "elif" } else { "else" };
                self.error(next.line, format!("`{word}` after `else` branch"));
            }
            seen_else |= condition.is_none();
            self.cursor += 1;
            let what = if condition.is_some() { "elif" } else { "else" };
            let body = self.body(next, what);
            branches.push(Branch { condition, body });
        }
        Outcome::Node(StmtKind::If { branches })
    }

    fn menu(&mut self, h: &Header) -> Outcome {
        let mut extras = MenuExtras::default();
        let mut idx = 1;
        if matches!(h.kind(1), Some(TokKind::LParen)) {
            let screen = match (h.ident(2), h.kind(3), h.kind(4), h.kind(5)) {
                (Some("screen"), Some(TokKind::Op(eq)), Some(TokKind::Str(s)), Some(TokKind::RParen))
                    if eq == "=" =>
                {
                    s.clone()
                }
                _ => return Outcome::Raw,
            };
            extras.screen = Some(screen);
            idx = 6;
        }
        match h.kind(idx) {
            Some(TokKind::Colon) if idx + 1 == h.toks.len() => {}
            None => return Outcome::Invalid("expected ':' at the end of the menu header".into()),
            _ => return Outcome::Raw,
        }

        let start = self.cursor;
        let mark = self.diags.len();
        self.cursor += 1;
        let Some(child) = self.peek().filter(|l| l.indent > h.line.indent).map(|l| l.indent) else {
            self.error(h.line.line, "menu expects a non-empty block");
            return Outcome::Node(StmtKind::Menu {
                choices: Vec::new(),
                extras,
            });
        };

        let mut choices = Vec::new();
        let mut failure = None;
        while let Some(item) = self.peek() {
            if item.indent < child {
                break;
            }
            if item.indent > child {
                failure = Some((item.line, "unexpected indentation in menu".to_string()));
                break;
            }
            let ih = match Header::new(item) {
                Ok(ih) => ih,
                Err(msg) => {
                    failure = Some((item.line, msg));
                    break;
                }
            };
            match menu_item(&ih) {
                Some(MenuItem::Choice { text, condition }) => {
                    self.cursor += 1;
                    let body = self.body(item, "menu choice");
                    choices.push(Choice {
                        text,
                        condition,
                        body,
                    });
                }
                Some(MenuItem::Prompt(prompt)) if extras.prompt.is_none() => {
                    extras.prompt = Some(prompt);
                    self.cursor += 1;
                }
                Some(MenuItem::Set(var)) if extras.result_var.is_none() => {
                    extras.result_var = Some(var);
                    self.cursor += 1;
                }
                _ => {
                    failure = Some((item.line, "unexpected statement in menu".to_string()));
                    break;
                }
            }
        }

        if let Some((line, msg)) = failure {
            self.cursor = start;
            self.diags.truncate(mark);
            self.error(line, msg);
            return Outcome::Raw;
        }
        if choices.is_empty() {
            self.error(h.line.line, "menu has no choices");
        }
        Outcome::Node(StmtKind::Menu { choices, extras })
    }

    fn python(&mut self, h: &Header) -> Outcome {
        let mut early = false;
        let mut hide = false;
        let last = h.toks.len() - 1;
        for idx in 1..h.toks.len() {
            let flag = match h.ident(idx) {
                Some("early") => &mut early,
                Some("hide") => &mut hide,
                _ if idx == last && h.ends_with_colon() => break,
                _ => return Outcome::Raw,
            };
            if *flag {
                return Outcome::Invalid(format!(
                    "duplicate `{}` flag",
                    h.ident(idx).unwrap_or_default()
                ));
            }
            *flag = true;
        }
        if !h.ends_with_colon() {
            return Outcome::Invalid("expected ':' at the end of the python header".into());
        }

        self.cursor += 1;
        let mut code = Vec::new();
        let base = self.peek().filter(|l| l.indent > h.line.indent).map(|l| l.indent);
        if base.is_some() && self.lone_pass(h.line) {
            self.cursor += 1;
            return Outcome::Node(StmtKind::Python {
                code: String::new(),
                early,
                hide,
            });
        }
        match base {
            Some(base) => {
                while let Some(next) = self.peek() {
                    if next.indent <= h.line.indent {
                        break;
                    }
                    code.push(format!(
                        "{}{}",
                        " ".repeat(next.indent.saturating_sub(base)),
                        next.content
                    ));
                    self.cursor += 1;
                }
            }
            None => self.error(h.line.line, "python expects a non-empty block"),
        }
        Outcome::Node(StmtKind::Python {
            code: code.join("\n"),
            early,
            hide,
        })
    }
}

enum MenuItem {
    Choice {
        text: String,
        condition: Option<String>,
    },
    Prompt(Prompt),
    Set(String),
}

fn menu_item(h: &Header) -> Option<MenuItem> {
    let n = h.toks.len();
    match (h.kind(0)?, h.kind(1)) {
        (TokKind::Str(text), Some(TokKind::Colon)) if n == 2 => Some(MenuItem::Choice {
            text: text.clone(),
            condition: None,
        }),
        (TokKind::Str(text), Some(TokKind::Ident(kw))) if kw == "if" && h.ends_with_colon() => {
            let cond = h.slice(2, n - 1);
            (!cond.is_empty()).then(|| MenuItem::Choice {
                text: text.clone(),
                condition: Some(cond.to_string()),
            })
        }
        (TokKind::Str(text), None) => Some(MenuItem::Prompt(Prompt {
            speaker: None,
            text: text.clone(),
        })),
        (TokKind::Ident(kw), Some(_)) if kw == "set" => {
            let (var, next) = h.dotted(1)?;
            (next == n).then(|| MenuItem::Set(var.to_string()))
        }
        (TokKind::Ident(speaker), Some(TokKind::Str(text))) if n == 2 => {
            Some(MenuItem::Prompt(Prompt {
                speaker: Some(speaker.clone()),
                text: text.clone(),
            }))
        }
        _ => None,
    }
}

/// `[speaker] "text" [attr ...] [with transition]`, or `extend "text" ...`.
fn dialogue(h: &Header, speaker: Option<String>, extend: bool) -> Outcome {
    let text_idx = if speaker.is_some() || extend { 1 } else { 0 };
    let Some(TokKind::Str(text)) = h.kind(text_idx) else {
        return Outcome::Raw;
    };
    let mut extras = DialogueExtras {
        extend,
        ..DialogueExtras::default()
    };
    let mut idx = text_idx + 1;
    while let Some(word) = h.ident(idx) {
        if word == "with" {
            let transition = h.rest(idx + 1);
            if transition.is_empty() {
                return Outcome::Invalid("`with` without a transition".into());
            }
            extras.transition = Some(transition.to_string());
            idx = h.toks.len();
            break;
        }
        extras.attributes.push(word.to_string());
        idx += 1;
    }
    if idx != h.toks.len() {
        return Outcome::Raw;
    }
    Outcome::Node(StmtKind::Dialogue {
        speaker,
        text: text.clone(),
        extras,
    })
}

fn image(h: &Header) -> Outcome {
    let keyword = h.ident(0).unwrap_or_default();
    let mut idx = 1;
    let name = match h.ident(1) {
        Some(w) if !IMAGE_CLAUSES.contains(&w) => {
            if matches!(w, "expression" | "screen" | "layer") {
                return Outcome::Raw;
            }
            idx = 2;
            Some(w.to_string())
        }
        _ => None,
    };
    if name.is_none() && keyword != "scene" {
        return Outcome::Raw;
    }

    let mut extras = ImageExtras::default();
    loop {
        match (h.kind(idx), h.ident(idx + 1)) {
            (Some(TokKind::Ident(w)), _) if !IMAGE_CLAUSES.contains(&w.as_str()) => {
                extras.attributes.push(w.clone());
                idx += 1;
            }
            (Some(TokKind::Op(op)), Some(w))
                if op == "-" && h.toks[idx].span.end == h.toks[idx + 1].span.start =>
            {
                extras.attributes.push(format!("-{w}"));
                idx += 2;
            }
            _ => break,
        }
    }

    while idx < h.toks.len() {
        let Some(clause) = h.ident(idx).filter(|w| IMAGE_CLAUSES.contains(w)) else {
            return Outcome::Raw;
        };
        let end = h.find_word(idx + 1, &IMAGE_CLAUSES).unwrap_or(h.toks.len());
        let value = h.slice(idx + 1, end);
        if value.is_empty() {
            return Outcome::Invalid(format!("`{clause}` clause without a value"));
        }
        let single = end == idx + 2;
        let slot = match clause {
            "at" => &mut extras.position,
            "behind" => &mut extras.behind,
            "with" => &mut extras.transition,
            "onlayer" | "as" if single && h.ident(idx + 1).is_some() => match clause {
                "onlayer" => &mut extras.layer,
                _ => &mut extras.as_tag,
            },
            "zorder" => {
                if extras.zorder.is_some() {
                    return Outcome::Invalid("duplicate `zorder` clause".into());
                }
                match value.parse::<i64>() {
                    Ok(z) => extras.zorder = Some(z),
                    Err(_) => return Outcome::Raw,
                }
                idx = end;
                continue;
            }
            _ => return Outcome::Raw,
        };
        if slot.is_some() {
            return Outcome::Invalid(format!("duplicate `{clause}` clause"));
        }
        *slot = Some(value.to_string());
        idx = end;
    }

    Outcome::Node(match keyword {
        "scene" => StmtKind::Scene {
            image: name,
            extras,
        },
        "show" => StmtKind::Show {
            image: name.unwrap_or_default(),
            extras,
        },
        _ => StmtKind::Hide {
            image: name.unwrap_or_default(),
            extras,
        },
    })
}

fn with(h: &Header) -> Outcome {
    let transition = h.rest(1);
    if transition.is_empty() || h.ends_with_colon() {
        return Outcome::Raw;
    }
    Outcome::Node(StmtKind::With {
        transition: transition.to_string(),
    })
}

fn jump(h: &Header) -> Outcome {
    if h.is(1, "expression") {
        let expr = h.rest(2);
        if expr.is_empty() {
            return Outcome::Invalid("`jump expression` without an expression".into());
        }
        return Outcome::Node(StmtKind::Jump {
            target: expr.to_string(),
            expression: Some(true),
        });
    }
    match h.dotted(1) {
        Some((target, next)) if next == h.toks.len() => Outcome::Node(StmtKind::Jump {
            target: target.to_string(),
            expression: None,
        }),
        None if h.toks.len() == 1 => Outcome::Invalid("`jump` without a target".into()),
        _ => Outcome::Raw,
    }
}

fn call(h: &Header) -> Outcome {
    let n = h.toks.len();
    let (target, expression, mut idx) = if h.is(1, "expression") {
        let end = h.find_word(2, &["pass", "from"]).unwrap_or(n);
        let expr = h.slice(2, end);
        if expr.is_empty() {
            return Outcome::Invalid("`call expression` without an expression".into());
        }
        (expr, Some(true), end)
    } else {
        match h.dotted(1) {
            Some((target, next)) => (target, None, next),
            None if n == 1 => return Outcome::Invalid("`call` without a target".into()),
            None => return Outcome::Raw,
        }
    };

    let mut args = Vec::new();
    let open = match expression {
        Some(_) if h.is(idx, "pass") => Some(idx + 1),
        None if matches!(h.kind(idx), Some(TokKind::LParen)) => Some(idx),
        _ => None,
    };
    if let Some(open) = open {
        match h.paren_list(open) {
            Some((list, next)) => {
                args = list;
                idx = next;
            }
            None => return Outcome::Raw,
        }
    }

    let mut from = None;
    if h.is(idx, "from") {
        match h.dotted(idx + 1) {
            Some((label, next)) => {
                from = Some(label.to_string());
                idx = next;
            }
            None => return Outcome::Invalid("`from` without a label name".into()),
        }
    }
    if idx != n {
        return Outcome::Raw;
    }
    Outcome::Node(StmtKind::Call {
        target: target.to_string(),
        expression,
        args,
        from,
    })
}

fn ret(h: &Header) -> Outcome {
    let value = h.rest(1);
    if h.ends_with_colon() {
        return Outcome::Raw;
    }
    Outcome::Node(StmtKind::Return {
        value: (!value.is_empty()).then(|| value.to_string()),
    })
}

fn dollar(h: &Header) -> Outcome {
    let code = h.rest(1);
    if code.is_empty() {
        return Outcome::Invalid("`$` without any code".into());
    }
    if let Some(caps) = ASSIGNMENT.captures(code) {
        let value = caps[3].trim();
        if !value.is_empty() && !value.starts_with('=') {
            if let Some(op) = AssignOp::from_keyword(&caps[2]) {
                return Outcome::Node(StmtKind::Set {
                    var: caps[1].to_string(),
                    op,
                    value: value.to_string(),
                });
            }
        }
    }
    Outcome::Node(StmtKind::Python {
        code: code.to_string(),
        early: false,
        hide: false,
    })
}

/// `name = value` after `define` or `default`.
fn binding<'h>(h: &Header<'h>) -> Result<(&'h str, String), Outcome> {
    let Some((name, next)) = h.dotted(1) else {
        return Err(Outcome::Raw);
    };
    if name.starts_with('.') || !matches!(h.kind(next), Some(k) if k.is_op("=")) {
        return Err(Outcome::Raw);
    }
    let value = h.rest(next + 1);
    if value.is_empty() {
        return Err(Outcome::Invalid(format!("`{name}` is assigned no value")));
    }
    Ok((name, value.to_string()))
}

fn define(h: &Header) -> Outcome {
    match binding(h) {
        Ok((name, value)) => {
            let (store, name) = match name.rsplit_once('.') {
                Some((store, name)) => (Some(store.to_string()), name.to_string()),
                None => (None, name.to_string()),
            };
            Outcome::Node(StmtKind::Define { name, value, store })
        }
        Err(o) => o,
    }
}

fn default(h: &Header) -> Outcome {
    match binding(h) {
        Ok((name, value)) => Outcome::Node(StmtKind::Default {
            name: name.to_string(),
            value,
        }),
        Err(o) => o,
    }
}

/// A number literal at `idx`, optionally written with a leading `-`.
/// Returns the value and the index after it.
fn number(h: &Header, idx: usize) -> Option<(f64, usize)> {
    match (h.kind(idx), h.kind(idx + 1)) {
        (Some(TokKind::Num(n)), _) => Some((*n, idx + 1)),
        (Some(TokKind::Op(op)), Some(TokKind::Num(n)))
            if op == "-" && h.toks[idx].span.end == h.toks[idx + 1].span.start =>
        {
            Some((-*n, idx + 2))
        }
        _ => None,
    }
}

fn play(h: &Header) -> Outcome {
    let Some(channel) = h.ident(1).and_then(AudioChannel::from_keyword) else {
        return Outcome::Raw;
    };
    let Some(TokKind::Str(file)) = h.kind(2) else {
        return Outcome::Raw;
    };
    let mut options = AudioOptions {
        queue: h.is(0, "queue"),
        ..AudioOptions::default()
    };
    let mut idx = 3;
    while idx < h.toks.len() {
        let word = h.ident(idx).unwrap_or_default();
        match word {
            "loop" | "noloop" => {
                if options.r#loop.is_some() {
                    return Outcome::Invalid("`loop` and `noloop` given more than once".into());
                }
                options.r#loop = Some(word == "loop");
                idx += 1;
            }
            "fadein" | "volume" => {
                let Some((value, next)) = number(h, idx + 1) else {
                    return Outcome::Invalid(format!("`{word}` expects a number"));
                };
                let slot = if word == "fadein" {
                    &mut options.fade_in
                } else {
                    &mut options.volume
                };
                if slot.is_some() {
                    return Outcome::Invalid(format!("duplicate `{word}` clause"));
                }
                *slot = Some(value);
                idx = next;
            }
            _ => return Outcome::Raw,
        }
    }
    Outcome::Node(StmtKind::Play {
        channel,
        file: file.clone(),
        options,
    })
}

fn stop(h: &Header) -> Outcome {
    let Some(channel) = h.ident(1).and_then(AudioChannel::from_keyword) else {
        return Outcome::Raw;
    };
    let n = h.toks.len();
    let fade_out = match (n, h.ident(2)) {
        (2, _) => None,
        (_, Some("fadeout")) => match number(h, 3) {
            Some((value, next)) if next == n => Some(value),
            Some(_) => return Outcome::Raw,
            None => return Outcome::Invalid("`fadeout` expects a number".into()),
        },
        _ => return Outcome::Raw,
    };
    Outcome::Node(StmtKind::Stop { channel, fade_out })
}

fn pause(h: &Header) -> Outcome {
    match (h.toks.len(), number(h, 1)) {
        (1, _) => Outcome::Node(StmtKind::Pause { duration: None }),
        (n, Some((value, next))) if next == n => Outcome::Node(StmtKind::Pause {
            duration: Some(value),
        }),
        _ => Outcome::Raw,
    }
}

fn nvl(h: &Header) -> Outcome {
    match (h.toks.len(), h.ident(1).and_then(NvlAction::from_keyword)) {
        (2, Some(action)) => Outcome::Node(StmtKind::Nvl { action }),
        _ => Outcome::Raw,
    }
}
