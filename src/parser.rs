// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recursive-descent parser for Rego v0 modules.
//!
//! `contains`, `every`, `if` and `in` are ordinary identifiers until a
//! `future.keywords` or `rego.v1` import turns them into keywords. Parsing
//! stops at the first error; there is no recovery.

use crate::ast::*;
use crate::lexer::*;

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use tracing::warn;

pub const FUTURE_KEYWORDS: [&str; 4] = ["contains", "every", "if", "in"];

const KEYWORDS: [&str; 11] = [
    "as", "default", "else", "false", "import", "package", "not", "null", "some", "true", "with",
];

const IMPORT_ROOTS: [&str; 4] = ["data", "future", "input", "rego"];

// Lowest binary operator precedence.
const ANY_OP: u8 = 1;

/// Deepest nesting of terms accepted.
pub const MAX_NESTING: u32 = 128;

/// Read position in the token stream.
struct Cursor<'source> {
    lexer: Lexer<'source>,
    tok: Token,
    // Start line and end offset of the last consumed token.
    prev_line: u32,
    prev_end: u32,
}

pub struct Parser<'source> {
    source: Source,
    cursor: Cursor<'source>,
    // Enabled future keywords, with the import that enabled each.
    future_keywords: BTreeMap<String, Option<Span>>,
    rego_v1: bool,
    nesting: u32,
}

// First element of a collection literal.
enum Opening {
    Comprehension(Expr, Query),
    Item(Expr),
}

// `p[x]` and `p.q` without a value declare v0 partial set rules.
fn v0_set_head(path: Expr) -> (Expr, HeadKind) {
    match path.kind {
        ExprKind::Index { target, index } if target.is_var() => {
            (*target, HeadKind::PartialSet(Some(*index)))
        }
        ExprKind::Field { target, name } if target.is_var() => (
            Expr::new(path.span, ExprKind::Field { target, name }),
            HeadKind::PartialSet(None),
        ),
        kind => (Expr::new(path.span, kind), HeadKind::Complete),
    }
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source Source) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let tok = lexer.next_token()?;
        Ok(Self {
            source: source.clone(),
            cursor: Cursor {
                lexer,
                tok,
                prev_line: 0,
                prev_end: 0,
            },
            future_keywords: BTreeMap::new(),
            rego_v1: false,
            nesting: 0,
        })
    }

    /// Parses as if the module started with `import rego.v1`.
    pub fn enable_rego_v1(&mut self) -> Result<()> {
        self.enable_v1(None)
    }

    /// Splits a reference such as `data.a["b"].c` into its segments.
    pub fn path_components(refr: &Expr) -> Result<Vec<Span>> {
        let mut segments = vec![];
        let mut node = refr;
        loop {
            match &node.kind {
                ExprKind::Field { target, name } => {
                    segments.push(name.clone());
                    node = target.as_ref();
                }
                ExprKind::Index { target, index } => {
                    segments.extend(Self::path_components(index)?.into_iter().rev());
                    node = target.as_ref();
                }
                ExprKind::Var
                | ExprKind::String(_)
                | ExprKind::Number
                | ExprKind::Bool(_)
                | ExprKind::Null => {
                    segments.push(node.span.clone());
                    break;
                }
                _ => bail!(node.span.error("not a valid ref")),
            }
        }
        segments.reverse();
        Ok(segments)
    }

    pub fn parse(&mut self) -> Result<Module> {
        self.expect("package", "Missing package declaration.")?;
        let package = self.reference(false)?;

        let mut imports = vec![];
        while self.text() == "import" {
            let import = self.import(&imports)?;
            imports.push(import);
        }

        let mut rules = vec![];
        while !self.at_eof() {
            rules.push(self.rule()?);
        }

        Ok(Module {
            package,
            imports,
            rules,
            rego_v1: self.rego_v1,
        })
    }

    // Token access.

    // String literals never match punctuation or keywords.
    fn text(&self) -> &str {
        match self.cursor.tok.kind {
            TokenKind::String | TokenKind::RawString => "",
            _ => self.cursor.tok.span.text(),
        }
    }

    fn kind(&self) -> TokenKind {
        self.cursor.tok.kind
    }

    fn here(&self) -> Span {
        self.cursor.tok.span.clone()
    }

    fn at_eof(&self) -> bool {
        self.kind() == TokenKind::Eof
    }

    // From the start of `start` to the end of the last consumed token.
    fn since(&self, start: &Span) -> Span {
        Span {
            end: self.cursor.prev_end,
            ..start.clone()
        }
    }

    fn error(&self, msg: &str) -> anyhow::Error {
        self.cursor.tok.span.error(msg)
    }

    fn bump(&mut self) -> Result<Span> {
        let next = self.cursor.lexer.next_token()?;
        let tok = std::mem::replace(&mut self.cursor.tok, next);
        self.cursor.prev_line = tok.span.line;
        self.cursor.prev_end = tok.span.end;
        Ok(tok.span)
    }

    fn eat(&mut self, text: &str) -> Result<bool> {
        if self.text() != text {
            return Ok(false);
        }
        self.bump()?;
        Ok(true)
    }

    fn expect(&mut self, text: &str, context: &str) -> Result<Span> {
        if self.text() != text {
            bail!(self.error(&format!("expecting `{text}` {context}")));
        }
        self.bump()
    }

    fn on_new_line(&self) -> bool {
        self.cursor.prev_line != self.cursor.tok.span.line
    }

    // `.` and `[` must touch the token before them.
    fn detached(&self) -> bool {
        matches!(self.text(), "." | "[") && self.cursor.tok.span.start != self.cursor.prev_end
    }

    fn detached_error(&self) -> anyhow::Error {
        let span = &self.cursor.tok.span;
        self.source.error(
            span.line,
            span.col.saturating_sub(1),
            &format!("invalid whitespace before {}", self.text()),
        )
    }

    // Future keywords.

    fn keyword_enabled(&self, kw: &str) -> bool {
        self.future_keywords.contains_key(kw)
    }

    fn at_keyword(&self, kw: &str) -> bool {
        self.text() == kw && self.keyword_enabled(kw)
    }

    fn warn_disabled_keyword(&self) {
        let kw = self.text();
        let span = &self.cursor.tok.span;
        warn!(
            file = self.source.name(),
            line = span.line,
            col = span.col,
            "`{kw}` will be treated as identifier due to missing `import future.keywords.{kw}`"
        );
    }

    fn enable_keyword(&mut self, kw: &str, import: Option<&Span>) -> Result<()> {
        if let (Some(import), Some(Some(earlier))) = (import, self.future_keywords.get(kw)) {
            if self.rego_v1 {
                bail!(import.error(&format!(
                    "this import shadows previous import of `{kw}` defined at:{}",
                    earlier.message("", "this import is shadowed.")
                )));
            }
        }

        self.future_keywords.insert(kw.to_string(), import.cloned());
        if kw == "every" && !self.rego_v1 {
            self.future_keywords.insert("in".to_string(), import.cloned());
        }
        Ok(())
    }

    fn enable_v1(&mut self, import: Option<&Span>) -> Result<()> {
        self.rego_v1 = true;
        for kw in FUTURE_KEYWORDS {
            self.enable_keyword(kw, import)?;
        }
        Ok(())
    }

    // Handles `future.keywords[.kw]`; returns whether the path was one.
    fn future_import(&mut self, segments: &[Span]) -> Result<bool> {
        match segments {
            [future, keywords, rest @ ..]
                if future.text() == "future" && keywords.text() == "keywords" =>
            {
                match rest {
                    [] => {
                        for kw in FUTURE_KEYWORDS {
                            self.enable_keyword(kw, Some(keywords))?;
                        }
                    }
                    [kw] if FUTURE_KEYWORDS.contains(&kw.text()) => {
                        self.enable_keyword(kw.text(), Some(kw))?
                    }
                    [kw] => bail!(kw.error("invalid future keyword")),
                    [_, extra, ..] => bail!(self.source.error(
                        extra.line,
                        extra.col.saturating_sub(1),
                        "invalid future keyword"
                    )),
                }
                Ok(true)
            }
            [future, ..] if future.text() == "future" => {
                bail!(future.error("invalid import, must be `future.keywords`"))
            }
            _ => Ok(false),
        }
    }

    // Identifiers and terms.

    /// Consumes an identifier. Enabled future keywords, except `contains`,
    /// are reserved unless `allow_future` is set.
    fn ident(&mut self, allow_future: bool) -> Result<Span> {
        if self.kind() != TokenKind::Ident {
            bail!(self.error("expecting identifier"));
        }
        let text = self.text();
        if KEYWORDS.contains(&text)
            || (!allow_future && text != "contains" && self.keyword_enabled(text))
        {
            bail!(self.error(&format!("unexpected keyword `{text}`")));
        }
        self.bump()
    }

    fn scalar_or_var(&mut self) -> Result<Expr> {
        let span = self.here();
        let kind = match (self.kind(), span.text()) {
            (TokenKind::Number, _) => ExprKind::Number,
            (TokenKind::String, text) => match serde_json::from_str(&format!("\"{text}\"")) {
                Ok(value) => ExprKind::String(value),
                Err(e) => bail!(span.error(&format!("invalid string literal. {e}"))),
            },
            (TokenKind::RawString, _) => ExprKind::RawString,
            (TokenKind::Ident, "null") => ExprKind::Null,
            (TokenKind::Ident, "true") => ExprKind::Bool(true),
            (TokenKind::Ident, "false") => ExprKind::Bool(false),
            (TokenKind::Ident, _) => return Ok(Expr::new(self.ident(false)?, ExprKind::Var)),
            _ => bail!(self.error("expecting expression")),
        };
        self.bump()?;
        Ok(Expr::new(span, kind))
    }

    // Comma separated items up to and including `close`. A trailing comma is allowed.
    fn items(&mut self, mut items: Vec<Expr>, close: &str, context: &str) -> Result<Vec<Expr>> {
        if items.is_empty() && self.text() != close {
            items.push(self.in_expr()?);
        }
        while self.eat(",")? {
            if self.text() == close || self.at_eof() {
                break;
            }
            items.push(self.in_expr()?);
        }
        self.expect(close, context)?;
        Ok(items)
    }

    // Parses the first element of a collection literal. A `|` after a term
    // makes the literal a comprehension.
    fn opening(&mut self, close: &str) -> Result<Opening> {
        let start = self.here();
        // `|` is also set union, so the term stops above that precedence.
        let term = self.binary(BinaryOp::Union.precedence() + 1)?;
        if self.text() == "|" {
            let bar = self.bump()?;
            let body = self.query(bar, close)?;
            return Ok(Opening::Comprehension(term, body));
        }
        let lhs = self.binary_rest(&start, term, ANY_OP)?;
        Ok(Opening::Item(self.membership(&start, lhs, None)?))
    }

    fn comprehension(
        kind: ComprehensionKind,
        key: Option<Expr>,
        term: Expr,
        body: Query,
    ) -> ExprKind {
        ExprKind::Comprehension(Box::new(Comprehension {
            kind,
            key,
            term,
            body,
        }))
    }

    fn bracket_term(&mut self) -> Result<Expr> {
        let start = self.expect("[", "while parsing array comprehension or array")?;
        let kind = if self.eat("]")? {
            ExprKind::Array(vec![])
        } else {
            match self.opening("]")? {
                Opening::Comprehension(term, body) => {
                    Self::comprehension(ComprehensionKind::Array, None, term, body)
                }
                Opening::Item(first) => {
                    ExprKind::Array(self.items(vec![first], "]", "while parsing array")?)
                }
            }
        };
        Ok(Expr::new(self.since(&start), kind))
    }

    fn brace_term(&mut self) -> Result<Expr> {
        let start = self.expect("{", "while parsing set, object or comprehension")?;
        let kind = self.brace_contents()?;
        Ok(Expr::new(self.since(&start), kind))
    }

    fn brace_contents(&mut self) -> Result<ExprKind> {
        if self.eat("}")? {
            return Ok(ExprKind::Object(vec![]));
        }

        let first = match self.opening("}")? {
            Opening::Comprehension(term, body) => {
                return Ok(Self::comprehension(ComprehensionKind::Set, None, term, body))
            }
            Opening::Item(first) => first,
        };
        if !self.eat(":")? {
            return Ok(ExprKind::Set(self.items(vec![first], "}", "while parsing set")?));
        }

        let value = match self.opening("}")? {
            Opening::Comprehension(term, body) => {
                return Ok(Self::comprehension(
                    ComprehensionKind::Object,
                    Some(first),
                    term,
                    body,
                ))
            }
            Opening::Item(value) => value,
        };

        let mut fields = vec![(first, value)];
        while self.eat(",")? {
            if self.text() == "}" || self.at_eof() {
                break;
            }
            let key = self.in_expr()?;
            self.expect(":", "while parsing object item")?;
            fields.push((key, self.in_expr()?));
        }
        self.expect("}", "while parsing object")?;
        Ok(ExprKind::Object(fields))
    }

    fn dot_field(&mut self, allow_future: bool) -> Result<Span> {
        let dot = self.bump()?;
        let name = self.ident(allow_future)?;
        if name.start != dot.end {
            bail!(self.source.error(
                name.line,
                name.col.saturating_sub(1),
                "invalid whitespace between . and identifier"
            ));
        }
        Ok(name)
    }

    // A term followed by any number of `.field`, `[index]` and call suffixes.
    fn postfix(&mut self) -> Result<Expr> {
        if self.nesting >= MAX_NESTING {
            bail!(self.error(&format!("terms nested deeper than {MAX_NESTING} levels")));
        }
        self.nesting += 1;
        let term = self.suffixed_term();
        self.nesting -= 1;
        term
    }

    fn suffixed_term(&mut self) -> Result<Expr> {
        let start = self.here();
        let mut expr = match self.text() {
            "[" => self.bracket_term()?,
            "{" => self.brace_term()?,
            "set(" => {
                self.bump()?;
                self.expect(")", "while parsing empty set")?;
                Expr::new(self.since(&start), ExprKind::Set(vec![]))
            }
            "(" => {
                self.bump()?;
                let inner = self.expr()?;
                self.expect(")", "while parsing parenthesized expression")?;
                return Ok(inner);
            }
            "-" => {
                self.bump()?;
                let operand = self.in_expr()?;
                return Ok(Expr::new(self.since(&start), ExprKind::Neg(Box::new(operand))));
            }
            _ => self.scalar_or_var()?,
        };

        // Only `.field` and `["string"]` chains rooted at a variable name a function.
        let mut callable = expr.is_var();
        loop {
            if self.detached() {
                // A new line starts the next literal.
                if self.on_new_line() {
                    break;
                }
                bail!(self.error(&format!("invalid whitespace before {}", self.text())));
            }

            let kind = match self.text() {
                "." => {
                    let name = self.dot_field(false)?;
                    ExprKind::Field {
                        target: Box::new(expr),
                        name,
                    }
                }
                "[" => {
                    self.bump()?;
                    let index = self.in_expr()?;
                    callable = callable && matches!(index.kind, ExprKind::String(_));
                    self.expect("]", "while parsing bracketed reference")?;
                    ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    }
                }
                "(" if callable => {
                    self.bump()?;
                    let args = self.items(vec![], ")", "while parsing call expr")?;
                    callable = false;
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    }
                }
                _ => break,
            };
            expr = Expr::new(self.since(&start), kind);
        }

        Ok(expr)
    }

    // Expressions.

    fn binary_op(&self) -> Option<BinaryOp> {
        match self.kind() {
            TokenKind::Symbol => BinaryOp::from_symbol(self.text()),
            _ => None,
        }
    }

    fn binary(&mut self, min_prec: u8) -> Result<Expr> {
        let start = self.here();
        let lhs = self.postfix()?;
        self.binary_rest(&start, lhs, min_prec)
    }

    fn binary_rest(&mut self, start: &Span, mut lhs: Expr, min_prec: u8) -> Result<Expr> {
        let sub = BinaryOp::Sub.precedence();
        loop {
            let (op, rhs) = match self.binary_op() {
                Some(op) if op.precedence() >= min_prec => {
                    self.bump()?;
                    (op, self.binary(op.precedence() + 1)?)
                }
                // `x -1` lexes as `x` followed by the number `-1`.
                None if sub >= min_prec
                    && self.kind() == TokenKind::Number
                    && self.text().starts_with('-')
                    && !self.on_new_line() =>
                {
                    let mut number = self.bump()?;
                    number.start += 1;
                    number.col += 1;
                    let operand = Expr::new(number.clone(), ExprKind::Number);
                    (BinaryOp::Sub, self.binary_rest(&number, operand, sub + 1)?)
                }
                _ => return Ok(lhs),
            };
            lhs = Expr::new(
                self.since(start),
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            );
        }
    }

    // Chains `in` onto `lhs`. With `value`, the first link is `lhs, value in c`.
    fn membership(&mut self, start: &Span, mut lhs: Expr, mut value: Option<Expr>) -> Result<Expr> {
        if value.is_some() && !self.at_keyword("in") {
            bail!(self.error("expecting `in` while parsing membership expression"));
        }
        while self.at_keyword("in") {
            self.bump()?;
            let collection = self.binary(ANY_OP)?;
            let (key, item) = match value.take() {
                Some(item) => (Some(Box::new(lhs)), item),
                None => (None, lhs),
            };
            lhs = Expr::new(
                self.since(start),
                ExprKind::Membership {
                    key,
                    value: Box::new(item),
                    collection: Box::new(collection),
                },
            );
        }
        Ok(lhs)
    }

    fn in_expr(&mut self) -> Result<Expr> {
        let start = self.here();
        let lhs = self.binary(ANY_OP)?;
        self.membership(&start, lhs, None)
    }

    /// Parses one expression, including `key, value in collection`.
    pub fn expr(&mut self) -> Result<Expr> {
        let start = self.here();
        let term = self.postfix()?;
        self.expr_rest(&start, term)
    }

    fn expr_rest(&mut self, start: &Span, term: Expr) -> Result<Expr> {
        let lhs = self.binary_rest(start, term, ANY_OP)?;
        let value = match self.eat(",")? {
            true => Some(self.binary(ANY_OP)?),
            false => None,
        };
        self.membership(start, lhs, value)
    }

    fn reject_shadowing(target: &Expr, at: &Span) -> Result<()> {
        match target.var_name() {
            Some(name @ ("input" | "data")) => bail!(at.error(&format!("{name} cannot be shadowed"))),
            _ => Ok(()),
        }
    }

    fn assign_or_expr(&mut self) -> Result<Expr> {
        let start = self.here();
        let lhs = self.postfix()?;
        match self.text() {
            "=" => (),
            ":=" if self.rego_v1 => Self::reject_shadowing(&lhs, &self.here())?,
            ":=" => (),
            _ => return self.expr_rest(&start, lhs),
        }

        self.bump()?;
        let rhs = self.expr()?;
        Ok(Expr::new(
            self.since(&start),
            ExprKind::Assign {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        ))
    }

    // Statements.

    fn with_modifiers(&mut self) -> Result<Vec<With>> {
        let mut modifiers = vec![];
        while self.text() == "with" {
            let start = self.bump()?;
            let target = self.reference(false)?;
            self.expect("as", "while parsing with-modifier expression")?;
            let value = self.in_expr()?;
            modifiers.push(With {
                span: self.since(&start),
                target,
                value,
            });
        }
        Ok(modifiers)
    }

    fn every(&mut self) -> Result<StmtKind> {
        let context = "while parsing `every` statement";
        let start = self.bump()?;

        let first = self.ident(false)?;
        let (key, value) = match self.eat(",")? {
            true => match self.ident(false) {
                Ok(value) => (Some(first), value),
                Err(e) => bail!(start.error(&format!("Failed to parse `every` statement.\n{e}"))),
            },
            false => (None, first),
        };

        if !self.at_keyword("in") {
            bail!(self.error(&format!("expecting `in` {context}")));
        }
        self.bump()?;
        let domain = self.binary(ANY_OP)?;
        let brace = self.expect("{", context)?;
        let body = self.query(brace, "}")?;

        Ok(StmtKind::Every {
            key,
            value,
            domain,
            body,
        })
    }

    fn some(&mut self) -> Result<StmtKind> {
        self.expect("some", "while parsing some-decl")?;

        let mut terms = vec![];
        loop {
            let start = self.here();
            let term = self.postfix()?;
            terms.push((self.since(&start), term));
            if !self.eat(",")? {
                break;
            }
        }

        if !self.at_keyword("in") {
            if self.text() == "in" {
                self.warn_disabled_keyword();
            }
            let vars = terms
                .into_iter()
                .map(|(span, term)| match term.kind {
                    ExprKind::Var => Ok(span),
                    _ => bail!(span.error(&format!(
                        "encountered `{}` while expecting identifier",
                        span.text()
                    ))),
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(StmtKind::SomeVars(vars));
        }

        if let Some((extra, _)) = terms.get(2) {
            bail!(extra.error(&format!("encountered `{}` while expecting `in`", extra.text())));
        }
        self.bump()?;
        let collection = self.binary(ANY_OP)?;

        let mut terms = terms.into_iter().map(|(_, term)| term);
        let (key, value) = match (terms.next(), terms.next()) {
            (Some(key), Some(value)) => (Some(key), value),
            (Some(value), None) => (None, value),
            _ => bail!(self.error("expecting identifier")),
        };
        Ok(StmtKind::SomeIn {
            key,
            value,
            collection,
        })
    }

    fn stmt(&mut self) -> Result<Stmt> {
        let start = self.here();
        let kind = match self.text() {
            "some" => self.some()?,
            "every" if self.keyword_enabled("every") => self.every()?,
            "not" => {
                self.bump()?;
                StmtKind::Not(self.assign_or_expr()?)
            }
            text => {
                if text == "every" {
                    self.warn_disabled_keyword();
                }
                StmtKind::Expr(self.assign_or_expr()?)
            }
        };
        let with = self.with_modifiers()?;
        Ok(Stmt {
            span: self.since(&start),
            kind,
            with,
        })
    }

    // Literals up to `close`, separated by `;` or a new line.
    fn query(&mut self, start: Span, close: &str) -> Result<Query> {
        let mut stmts = vec![self.stmt()?];
        while self.text() != close && !self.at_eof() {
            if !self.eat(";")? && !self.on_new_line() {
                break;
            }
            stmts.push(self.stmt()?);
        }

        self.expect(close, "while parsing query")?;
        Ok(Query {
            span: self.since(&start),
            stmts,
        })
    }

    // References.

    // Package, import and `with` paths take `["string"]` segments only. Rule
    // heads take any index and reserve enabled future keywords after a dot.
    fn reference(&mut self, rule_head: bool) -> Result<Expr> {
        let start = self.here();
        if rule_head && self.kind() != TokenKind::Ident {
            bail!(self.error("expecting identifier. Failed to parse rule-ref."));
        }
        let mut refr = Expr::new(self.ident(false)?, ExprKind::Var);
        if rule_head && self.rego_v1 {
            Self::reject_shadowing(&refr, &start)?;
        }

        loop {
            if self.detached() {
                bail!(self.detached_error());
            }
            let kind = match self.text() {
                "." => {
                    let name = self.dot_field(!rule_head)?;
                    ExprKind::Field {
                        target: Box::new(refr),
                        name,
                    }
                }
                "[" => {
                    self.bump()?;
                    let index = if rule_head {
                        self.expr()?
                    } else if self.kind() == TokenKind::String {
                        self.scalar_or_var()?
                    } else {
                        bail!(self.error("expected string"));
                    };
                    self.expect("]", "while parsing bracketed reference")?;
                    ExprKind::Index {
                        target: Box::new(refr),
                        index: Box::new(index),
                    }
                }
                _ => return Ok(refr),
            };
            refr = Expr::new(self.since(&start), kind);
        }
    }

    // Rules.

    fn rule_value(&mut self) -> Result<Option<Expr>> {
        if !matches!(self.text(), "=" | ":=") {
            return Ok(None);
        }
        self.bump()?;
        Ok(Some(self.expr()?))
    }

    fn rule_head(&mut self) -> Result<(Expr, HeadKind, Option<Expr>)> {
        let path = self.reference(true)?;
        match self.text() {
            "(" => {
                self.bump()?;
                let mut args = vec![];
                if self.text() != ")" {
                    args.push(self.postfix()?);
                    while self.eat(",")? {
                        if self.text() == ")" || self.at_eof() {
                            break;
                        }
                        args.push(self.postfix()?);
                    }
                }
                self.expect(")", "while parsing function rule args")?;
                let value = self.rule_value()?;
                Ok((path, HeadKind::Function(args), value))
            }
            "contains" => {
                self.bump()?;
                let key = self.expr()?;
                Ok((path, HeadKind::PartialSet(Some(key)), None))
            }
            _ => {
                let value = self.rule_value()?;
                let next = self.text();
                if value.is_none() && !KEYWORDS.contains(&next) && !self.keyword_enabled(next) {
                    let (path, head) = v0_set_head(path);
                    return Ok((path, head, None));
                }
                Ok((path, HeadKind::Complete, value))
            }
        }
    }

    // `if` followed by a braced query or a single literal.
    fn if_body(&mut self, start: Span, value: Option<Expr>) -> Result<RuleBody> {
        self.bump()?;

        let query = match self.text() {
            "{" => {
                let brace = self.bump()?;
                self.query(brace, "}")?
            }
            _ => {
                let query_start = self.here();
                let stmt = self.stmt()?;
                Query {
                    span: self.since(&query_start),
                    stmts: vec![stmt],
                }
            }
        };

        Ok(RuleBody {
            span: self.since(&start),
            value,
            query,
        })
    }

    fn braced_body(&mut self, start: Span, value: Option<Expr>) -> Result<RuleBody> {
        if self.rego_v1 {
            bail!(start.error("`if` keyword is required before rule body"));
        }
        self.bump()?;
        let query = self.query(start.clone(), "}")?;
        Ok(RuleBody {
            span: self.since(&start),
            value,
            query,
        })
    }

    fn rule_bodies(&mut self) -> Result<Vec<RuleBody>> {
        let start = self.here();
        let first = match self.text() {
            "if" if self.keyword_enabled("if") => self.if_body(start, None)?,
            "{" => self.braced_body(start, None)?,
            "if" => {
                self.warn_disabled_keyword();
                return Ok(vec![]);
            }
            _ => return Ok(vec![]),
        };

        let mut bodies = vec![first];
        match self.text() {
            "{" => {
                while self.text() == "{" {
                    let start = self.here();
                    bodies.push(self.braced_body(start, None)?);
                }
            }
            "else" => self.else_bodies(&mut bodies)?,
            _ => (),
        }
        Ok(bodies)
    }

    fn else_bodies(&mut self, bodies: &mut Vec<RuleBody>) -> Result<()> {
        loop {
            let start = self.here();
            match self.text() {
                "else" => {
                    self.bump()?;
                }
                "{" => bail!(self.error("expected `else` keyword")),
                _ => return Ok(()),
            }

            let value = self.rule_value()?;
            match self.text() {
                "if" if self.keyword_enabled("if") => bodies.push(self.if_body(start, value)?),
                "{" => bodies.push(self.braced_body(start, value)?),
                text if value.is_none() => {
                    if text == "if" {
                        self.warn_disabled_keyword();
                    }
                    bail!(self.error("expected assignment or query after `else`"));
                }
                _ => {
                    // `else = value` without a body always applies.
                    let query = Query {
                        span: Span {
                            end: start.start,
                            ..start.clone()
                        },
                        stmts: vec![],
                    };
                    bodies.push(RuleBody {
                        span: self.since(&start),
                        value,
                        query,
                    });
                    return Ok(());
                }
            }
        }
    }

    fn default_rule(&mut self) -> Result<Rule> {
        let start = self.expect("default", "while parsing default rule")?;
        let path = self.reference(true)?;

        let mut params: Vec<Span> = vec![];
        if self.eat("(")? {
            while self.text() != ")" && !self.at_eof() {
                let param = self.ident(true)?;
                if param.text() != "_" && params.iter().any(|p| p.text() == param.text()) {
                    bail!(param.error("repeating parameter name"));
                }
                params.push(param);
                if self.text() != ")" {
                    self.expect(",", "while parsing default rule parameters")?;
                }
            }
            self.expect(")", "while parsing default rule parameters")?;
        }

        if !matches!(self.text(), "=" | ":=") {
            bail!(self.error("expecting `:=` while parsing default rule"));
        }
        self.bump()?;
        let value = self.postfix()?;

        Ok(Rule {
            span: self.since(&start),
            path,
            head: HeadKind::Default(params),
            value: Some(value),
            bodies: vec![],
        })
    }

    fn rule(&mut self) -> Result<Rule> {
        if self.text() == "default" {
            return self.default_rule();
        }

        let start = self.here();
        let (path, head, value) = self.rule_head()?;
        let bodies = self.rule_bodies()?;
        let span = self.since(&start);

        if self.rego_v1 && bodies.is_empty() && value.is_none() {
            match &head {
                HeadKind::PartialSet(None) if Self::path_components(&path)?.len() == 2 => {
                    bail!(span.error("`contains` keyword is required for partial set rules"))
                }
                HeadKind::Complete | HeadKind::Function(_) | HeadKind::PartialSet(None) => {
                    bail!(span.error("rule must have a body or assignment"))
                }
                _ => (),
            }
        }

        Ok(Rule {
            span,
            path,
            head,
            value,
            bodies,
        })
    }

    // Imports.

    fn import(&mut self, earlier: &[Import]) -> Result<Import> {
        let start = self.bump()?;
        let path = self.reference(false)?;

        let segments = Self::path_components(&path)?;
        let Some(root) = segments.first() else {
            bail!(path.span.error("not a valid ref"));
        };
        if !IMPORT_ROOTS.contains(&root.text()) {
            bail!(root.error("import path must begin with one of: {data, future, input, rego}"));
        }

        let enables_keywords = match segments.as_slice() {
            [rego, v1] if rego.text() == "rego" && v1.text() == "v1" => {
                let span = self.since(&start);
                self.enable_v1(Some(&span))?;
                true
            }
            _ => self.future_import(&segments)?,
        };

        let mut alias = None;
        if self.text() == "as" {
            if enables_keywords {
                bail!(self.error("`future` imports cannot be aliased"));
            }
            self.bump()?;
            let name = self.ident(false)?;
            if name.text() == "_" {
                bail!(name.error("`_` cannot be used as alias"));
            }
            alias = Some(name);
        }

        let import = Import {
            span: self.since(&start),
            path,
            alias,
        };
        if !enables_keywords {
            Self::check_shadowing(&import, &segments, earlier)?;
        }
        Ok(import)
    }

    fn check_shadowing(import: &Import, segments: &[Span], earlier: &[Import]) -> Result<()> {
        let texts: Vec<&str> = segments.iter().map(Span::text).collect();
        for previous in earlier {
            let shadows = match (&previous.alias, &import.alias) {
                (Some(a), Some(b)) => a.text() == b.text(),
                (None, None) => {
                    let other = Self::path_components(&previous.path)?;
                    other.iter().map(Span::text).eq(texts.iter().copied())
                }
                _ => false,
            };
            if shadows {
                bail!(import.span.error(&format!(
                    "import shadows following import defined earlier:{}",
                    previous.span.message("", "this import is shadowed")
                )));
            }
        }
        Ok(())
    }
}
