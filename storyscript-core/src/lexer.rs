//! Tokenizer for a single logical line.
//!
//! The scanner has already split the source into lines and measured their
//! indentation, so the lexer never sees a newline outside a string escape.
//! Spans are byte offsets into the line so the parser can slice expressions
//! back out verbatim.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use unicode_xid::UnicodeXID;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokKind {
    Ident(String),
    Str(String),
    Num(f64),
    Colon,
    Dollar,
    Comma,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    /// A run of operator characters, e.g. `=`, `+=`, `==`, `-`.
    Op(String),
    /// `# ...` up to the end of the line.
    Comment(String),
    Other(char),
}

impl TokKind {
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            TokKind::Ident(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_op(&self, op: &str) -> bool {
        matches!(self, TokKind::Op(o) if o == op)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tok {
    pub kind: TokKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub offset: usize,
    pub msg: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (column {})", self.msg, self.offset + 1)
    }
}

impl std::error::Error for LexError {}

const OP_CHARS: &str = "=+-*/%<>!&|^~@";

pub struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src,
            chars: src.char_indices().peekable(),
        }
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        self.chars.next()
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        let offset = self.offset();
        self.src[offset..].chars().nth(n)
    }

    /// Byte offset of the next unread character.
    fn offset(&self) -> usize {
        let mut it = self.chars.clone();
        it.peek().map(|&(i, _)| i).unwrap_or(self.src.len())
    }

    fn consume_escape(&mut self) -> char {
        match self.advance().map(|(_, c)| c) {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some(c) => c,
            None => '\\',
        }
    }

    fn string_literal(&mut self, start: usize) -> Result<String, LexError> {
        let (_, quote) = self.advance().expect("string literal starts at a quote");
        let triple = self.peek() == Some(quote) && self.peek_nth(1) == Some(quote);
        if triple {
            self.advance();
            self.advance();
        }
        let mut content = String::new();
        loop {
            match self.advance().map(|(_, c)| c) {
                Some(c) if c == quote => {
                    if !triple {
                        return Ok(content);
                    }
                    if self.peek() == Some(quote) && self.peek_nth(1) == Some(quote) {
                        self.advance();
                        self.advance();
                        return Ok(content);
                    }
                    content.push(c);
                }
                Some('\\') => content.push(self.consume_escape()),
                Some(c) => content.push(c),
                None => {
                    return Err(LexError {
                        offset: start,
                        msg: "unterminated string literal".to_string(),
                    });
                }
            }
        }
    }

    fn number(&mut self) -> f64 {
        let start = self.offset();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') && matches!(self.peek_nth(1), Some(c) if c.is_ascii_digit()) {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let end = self.offset();
        // digits with at most one dot always parse
        self.src[start..end].parse().unwrap_or(0.0)
    }

    fn ident(&mut self) -> String {
        let start = self.offset();
        self.advance();
        while matches!(self.peek(), Some(c) if c.is_xid_continue()) {
            self.advance();
        }
        self.src[start..self.offset()].to_string()
    }

    fn operator(&mut self) -> String {
        let start = self.offset();
        while matches!(self.peek(), Some(c) if OP_CHARS.contains(c)) {
            self.advance();
        }
        self.src[start..self.offset()].to_string()
    }

    pub fn run(mut self) -> Result<Vec<Tok>, LexError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            let start = self.offset();
            let kind = match c {
                ' ' | '\t' | '\r' => {
                    self.advance();
                    continue;
                }
                '"' | '\'' => TokKind::Str(self.string_literal(start)?),
                '#' => {
                    let text = self.src[start..].to_string();
                    while self.advance().is_some() {}
                    TokKind::Comment(text)
                }
                c if c.is_ascii_digit() => TokKind::Num(self.number()),
                c if c == '_' || c.is_xid_start() => TokKind::Ident(self.ident()),
                c if OP_CHARS.contains(c) => TokKind::Op(self.operator()),
                _ => {
                    self.advance();
                    match c {
                        ':' => TokKind::Colon,
                        '$' => TokKind::Dollar,
                        ',' => TokKind::Comma,
                        '.' => TokKind::Dot,
                        '(' => TokKind::LParen,
                        ')' => TokKind::RParen,
                        '[' => TokKind::LBracket,
                        ']' => TokKind::RBracket,
                        '{' => TokKind::LBrace,
                        '}' => TokKind::RBrace,
                        other => TokKind::Other(other),
                    }
                }
            };
            tokens.push(Tok {
                kind,
                span: Span {
                    start,
                    end: self.offset(),
                },
            });
        }
        Ok(tokens)
    }
}

/// Tokenizes one logical line.
pub fn tokenize(line: &str) -> Result<Vec<Tok>, LexError> {
    Lexer::new(line).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn spans_are_byte_offsets() {
        let toks = tokenize("é \"ü\" x").unwrap();
        assert_eq!(toks[0].span, Span { start: 0, end: 2 });
        assert_eq!(toks[1].span, Span { start: 3, end: 7 });
        assert_eq!(toks[2].span, Span { start: 8, end: 9 });
    }

    #[test]
    fn operators_are_greedy() {
        assert_eq!(
            kinds("x //= 2"),
            vec![
                TokKind::Ident("x".into()),
                TokKind::Op("//=".into()),
                TokKind::Num(2.0)
            ]
        );
    }

    #[test]
    fn numbers_stop_at_second_dot() {
        assert_eq!(kinds("1.5")[0], TokKind::Num(1.5));
        assert_eq!(kinds("1.0.1")[0], TokKind::Num(1.0));
    }

    #[test]
    fn comment_swallows_rest_of_line() {
        let k = kinds("jump start # go");
        assert_eq!(k.last(), Some(&TokKind::Comment("# go".into())));
        assert_eq!(k.len(), 3);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("e \"hello").unwrap_err();
        assert_eq!(err.offset, 2);
    }
}
