// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug, Formatter};
use std::iter::Peekable;
use std::rc::Rc;
use std::str::CharIndices;

use anyhow::{anyhow, bail, Result};

struct SourceText {
    name: String,
    text: String,
    // Byte offsets (start, end) of each line, excluding the line terminator.
    lines: Vec<(u32, u32)>,
}

/// Policy text plus the name it is reported under in diagnostics.
#[derive(Clone)]
pub struct Source {
    inner: Rc<SourceText>,
}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.inner.name.fmt(f)
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Source) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Source {}

fn line_table(text: &str) -> Vec<(u32, u32)> {
    let mut lines = vec![];
    let mut start = 0u32;
    let mut after_cr = false;
    for (i, ch) in text.char_indices() {
        if ch == '\n' {
            let end = if after_cr { i as u32 - 1 } else { i as u32 };
            lines.push((start, end));
            start = i as u32 + 1;
        }
        after_cr = ch == '\r';
    }

    let len = text.len() as u32;
    if start < len || text.is_empty() {
        lines.push((start, len));
    } else {
        lines.push((len - 1, len - 1));
    }
    lines
}

impl Source {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Result<Source> {
        let (name, text) = (name.into(), text.into());
        if text.len() >= u32::MAX as usize {
            bail!("{name} is too large to be parsed");
        }
        let lines = line_table(&text);
        Ok(Self {
            inner: Rc::new(SourceText { name, text, lines }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn text(&self) -> &str {
        &self.inner.text
    }

    /// Text of the zero-based line `idx`; empty when out of range.
    pub fn line(&self, idx: u32) -> &str {
        match self.inner.lines.get(idx as usize) {
            Some(&(start, end)) => &self.inner.text[start as usize..end as usize],
            None => "",
        }
    }

    /// Renders a diagnostic pointing at a one-based line and column.
    pub fn message(&self, line: u32, col: u32, kind: &str, msg: &str) -> String {
        if line == 0 || line as usize > self.inner.lines.len() {
            return format!("{}: invalid line {line} specified", self.inner.name);
        }

        let gutter = format!("{line}").len() + 1;
        let pad = col.saturating_sub(1) as usize;
        format!(
            "\n--> {}:{line}:{col}\n{:<gutter$}|\n{line:<gutter$}| {}\n{:<gutter$}| {:<pad$}^\n{kind}: {msg}",
            self.inner.name,
            "",
            self.line(line - 1),
            "",
            "",
        )
    }

    pub fn error(&self, line: u32, col: u32, msg: &str) -> anyhow::Error {
        anyhow!(self.message(line, col, "error", msg))
    }
}

#[derive(Clone)]
pub struct Span {
    pub source: Source,
    pub line: u32,
    pub col: u32,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn text(&self) -> &str {
        &self.source.text()[self.start as usize..self.end as usize]
    }

    pub fn message(&self, kind: &str, msg: &str) -> String {
        self.source.message(self.line, self.col, kind, msg)
    }

    pub fn error(&self, msg: &str) -> anyhow::Error {
        self.source.error(self.line, self.col, msg)
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let text = self.text().escape_debug().to_string();
        let (shown, more) = match text.char_indices().nth(32) {
            Some((idx, _)) => (&text[..idx], "..."),
            None => (text.as_str(), ""),
        };
        write!(f, "{}:{} \"{shown}{more}\"", self.line, self.col)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenKind {
    Symbol,
    String,
    RawString,
    Number,
    Ident,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Clone)]
pub struct Lexer<'source> {
    source: Source,
    iter: Peekable<CharIndices<'source>>,
    line: u32,
    col: u32,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source Source) -> Self {
        Self {
            source: source.clone(),
            iter: source.text().char_indices().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn peek(&mut self) -> (usize, char) {
        match self.iter.peek() {
            Some(&(idx, ch)) => (idx, ch),
            None => (self.source.text().len(), '\x00'),
        }
    }

    fn peek_nth(&self, n: usize) -> char {
        self.iter.clone().nth(n).map(|(_, ch)| ch).unwrap_or('\x00')
    }

    fn span(&self, line: u32, col: u32, start: usize, end: usize) -> Span {
        Span {
            source: self.source.clone(),
            line,
            col,
            start: start as u32,
            end: end as u32,
        }
    }

    fn advance_while(&mut self, pred: impl Fn(char) -> bool) {
        while pred(self.peek().1) {
            self.iter.next();
        }
    }

    fn read_ident(&mut self) -> Token {
        let (start, col) = (self.peek().0, self.col);
        self.advance_while(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        let end = self.peek().0;
        self.col += (end - start) as u32;
        Token::new(TokenKind::Ident, self.span(self.line, col, start, end))
    }

    // Numbers follow the JSON grammar, with an optional leading '-'.
    fn read_number(&mut self) -> Result<Token> {
        let (start, first) = self.peek();
        let col = self.col;
        self.iter.next();

        if first != '0' {
            self.advance_while(|ch| ch.is_ascii_digit());
        }
        if self.peek().1 == '.' && self.peek_nth(1).is_ascii_digit() {
            self.iter.next();
            self.advance_while(|ch| ch.is_ascii_digit());
        }
        if matches!(self.peek().1, 'e' | 'E') {
            self.iter.next();
            if matches!(self.peek().1, '+' | '-') {
                self.iter.next();
            }
            self.advance_while(|ch| ch.is_ascii_digit());
        }

        let end = self.peek().0;
        self.col += (end - start) as u32;

        let next = self.peek().1;
        if next == '_' || next == '.' || next.is_ascii_alphanumeric() {
            return Err(self.source.error(self.line, self.col, "invalid number"));
        }

        if let Err(e) = serde_json::from_str::<serde_json::Number>(&self.source.text()[start..end]) {
            let reason = e.to_string();
            let reason = ["out of range", "invalid number", "expected value"]
                .into_iter()
                .find(|r| reason.contains(r))
                .map(str::to_string)
                .unwrap_or(reason);
            bail!(
                "{} {reason}",
                self.source.error(self.line, col, "invalid number literal:")
            );
        }

        Ok(Token::new(TokenKind::Number, self.span(self.line, col, start, end)))
    }

    fn read_raw_string(&mut self) -> Result<Token> {
        self.iter.next();
        self.col += 1;
        let (line, col) = (self.line, self.col);
        let start = self.peek().0;
        loop {
            let (offset, ch) = self.peek();
            self.iter.next();
            match ch {
                '`' => {
                    self.col += 1;
                    return Ok(Token::new(
                        TokenKind::RawString,
                        self.span(line, col, start, offset),
                    ));
                }
                '\x00' if offset < self.source.text().len() => {
                    return Err(self.source.error(self.line, self.col, "invalid character"))
                }
                '\x00' => return Err(self.source.error(line, col, "unmatched `")),
                '\n' => {
                    self.line += 1;
                    self.col = 1;
                }
                '\t' => self.col += 4,
                _ => self.col += 1,
            }
        }
    }

    fn read_escape(&mut self, line: u32, col: u32) -> Result<()> {
        self.iter.next();
        let (_, ch) = self.peek();
        self.iter.next();
        match ch {
            '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' => Ok(()),
            'u' => {
                for _ in 0..4 {
                    if !self.peek().1.is_ascii_hexdigit() {
                        return Err(self.source.error(line, col, "invalid hex escape sequence"));
                    }
                    self.iter.next();
                }
                Ok(())
            }
            _ => Err(self.source.error(line, col, "invalid escape sequence")),
        }
    }

    fn read_string(&mut self) -> Result<Token> {
        let (line, col) = (self.line, self.col);
        self.iter.next();
        self.col += 1;
        let start = self.peek().0;
        loop {
            let (offset, ch) = self.peek();
            let ch_col = self.col + (offset - start) as u32;
            match ch {
                '"' => break,
                '\x00' if offset == self.source.text().len() => break,
                '\\' => self.read_escape(line, ch_col)?,
                _ if ch < '\u{0020}' => {
                    return Err(self.source.error(line, ch_col, "invalid character in string"))
                }
                _ => {
                    self.iter.next();
                }
            }
        }

        let (end, close) = self.peek();
        if close != '"' {
            return Err(self.source.error(line, col, "unmatched \""));
        }
        self.iter.next();
        self.col += (end + 1 - start) as u32;

        if let Err(e) = serde_json::from_str::<String>(&self.source.text()[start - 1..end + 1]) {
            bail!(
                "{} {e}",
                self.source.error(line, col, "invalid string literal:")
            );
        }

        Ok(Token::new(TokenKind::String, self.span(line, col + 1, start, end)))
    }

    // Whitespace is the four JSON whitespace characters plus `#` comments.
    fn skip_ws(&mut self) -> Result<()> {
        loop {
            match self.peek().1 {
                ' ' => self.col += 1,
                '\t' => self.col += 4,
                '\r' if self.peek_nth(1) != '\n' => {
                    return Err(self
                        .source
                        .error(self.line, self.col, "\\r must be followed by \\n"));
                }
                '\r' => (),
                '\n' => {
                    self.line += 1;
                    self.col = 1;
                }
                '#' => {
                    self.advance_while(|ch| ch != '\n' && ch != '\x00');
                    continue;
                }
                _ => return Ok(()),
            }
            self.iter.next();
        }
    }

    fn symbol(&mut self, width: usize) -> Token {
        let (start, col) = (self.peek().0, self.col);
        for _ in 0..width {
            self.iter.next();
        }
        self.col += width as u32;
        Token::new(TokenKind::Symbol, self.span(self.line, col, start, start + width))
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_ws()?;

        let (start, ch) = self.peek();
        match ch {
            // A '-' directly followed by a digit is a negative number.
            // A '.' directly followed by a digit is reported as a bad number.
            '-' | '.' if self.peek_nth(1).is_ascii_digit() => self.read_number(),
            '{' | '}' | '[' | ']' | '(' | ')' | '+' | '-' | '*' | '/' | '%' | '&' | '|' | ','
            | ';' | '.' => Ok(self.symbol(1)),
            ':' | '<' | '>' | '=' if self.peek_nth(1) == '=' => Ok(self.symbol(2)),
            ':' | '<' | '>' | '=' => Ok(self.symbol(1)),
            '!' if self.peek_nth(1) == '=' => Ok(self.symbol(2)),
            '"' => self.read_string(),
            '`' => self.read_raw_string(),
            // NUL is also what `peek` reports at the end of input.
            '\x00' if start < self.source.text().len() => {
                Err(self.source.error(self.line, self.col, "invalid character"))
            }
            '\x00' => Ok(Token::new(
                TokenKind::Eof,
                self.span(self.line, self.col, start, start),
            )),
            _ if ch.is_ascii_digit() => self.read_number(),
            _ if ch.is_ascii_alphabetic() || ch == '_' => {
                let mut ident = self.read_ident();
                // `set(` followed by `)` is the empty set literal.
                if ident.span.text() == "set" && self.peek().1 == '(' {
                    let saved = (self.iter.clone(), self.line, self.col);
                    self.iter.next();
                    let closes = self.next_token()?.span.text() == ")";
                    (self.iter, self.line, self.col) = saved;
                    if closes {
                        self.iter.next();
                        self.col += 1;
                        ident.span.end += 1;
                    }
                }
                Ok(ident)
            }
            _ => Err(self.source.error(self.line, self.col, "invalid character")),
        }
    }
}
