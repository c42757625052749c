// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Expr, ExprKind, Module};
use crate::builtins;
use crate::lexer::Source;
use crate::parser::Parser;
use crate::visitor;

use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use thiserror::Error;
use tracing::debug;

/// Largest policy source accepted, in characters.
pub const MAX_REGO_CHARS: usize = 65_536;

const SOURCE_NAME: &str = "policy.rego";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("The rego path was provided but no content was found.")]
    Empty,

    #[error("The Rego code must be 1-{MAX_REGO_CHARS} characters. Current length: {len}. Please shorten the policy or split into multiple modules.")]
    TooLong { len: usize },

    #[error("The Rego code contains syntax errors. {0}")]
    Syntax(String),

    #[error("The Rego code uses operations that are not allowed: {}", .0.join(", "))]
    Disallowed(Vec<String>),
}

impl ValidationError {
    /// Short title used when the error is surfaced as a diagnostic.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Empty => "Empty Rego",
            Self::TooLong { .. } => "Rego Code Too Long",
            Self::Syntax(_) => "Invalid Rego Syntax",
            Self::Disallowed(_) => "Disallowed Rego Operations",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}: {}", .path.display())]
pub struct RegoPathError {
    pub path: PathBuf,
    pub reason: &'static str,
}

#[derive(Debug, Error)]
pub enum RegoFileError {
    #[error("Invalid Rego Path. The rego field must be the full (absolute) path to a .rego file. {0}")]
    Path(#[from] RegoPathError),

    #[error("Rego File Not Found. Cannot read Rego file: {}. {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}. {}", .0.title(), .0)]
    Invalid(#[from] ValidationError),
}

/// Checks policy source against the size limit, the parser and the built-in allow-list.
pub fn validate(source: &str) -> Result<(), ValidationError> {
    if source.is_empty() {
        return Err(ValidationError::Empty);
    }

    let len = source.chars().count();
    if len > MAX_REGO_CHARS {
        return Err(ValidationError::TooLong { len });
    }

    let module = parse_module(source).map_err(|e| ValidationError::Syntax(e.to_string()))?;

    let disallowed = find_disallowed_calls(&module);
    if !disallowed.is_empty() {
        debug!(operations = ?disallowed, "policy source uses disallowed operations");
        return Err(ValidationError::Disallowed(disallowed));
    }
    Ok(())
}

/// Parses policy source with the Rego v0 grammar.
pub fn parse_module(source: &str) -> anyhow::Result<Module> {
    let source = Source::new(SOURCE_NAME, source)?;
    let mut parser = Parser::new(&source)?;
    parser.parse()
}

/// Joins the path of a called reference, e.g. `http.send` or `object["get"]`.
/// Returns `None` when the callee is not a plain reference.
pub fn call_name(callee: &Expr) -> Option<String> {
    let mut segments = vec![];
    let mut expr = callee;
    loop {
        match &expr.kind {
            ExprKind::Var => {
                segments.push(expr.span.text().to_string());
                break;
            }
            ExprKind::Field { target, name } => {
                segments.push(name.text().to_string());
                expr = target.as_ref();
            }
            ExprKind::Index { target, index } => {
                match &index.kind {
                    ExprKind::String(value) => segments.push(value.clone()),
                    _ => return None,
                }
                expr = target.as_ref();
            }
            _ => return None,
        }
    }
    segments.reverse();
    Some(segments.join("."))
}

fn is_allowed_call(name: &str) -> bool {
    if builtins::is_allowed(name) {
        return true;
    }
    match name.rsplit_once('.') {
        Some((_, last)) => builtins::is_allowed(last),
        None => false,
    }
}

/// Names of every call in `module` that is not an allowed built-in.
/// Each name appears once, in order of first use.
pub fn find_disallowed_calls(module: &Module) -> Vec<String> {
    let mut found = IndexSet::new();
    let walked = visitor::walk_module(module, &mut |expr| {
        if let ExprKind::Call { callee, .. } = &expr.kind {
            if let Some(name) = call_name(callee) {
                if !is_allowed_call(&name) {
                    found.insert(name);
                }
            }
        }
        Ok(true)
    });
    // The callback never fails.
    debug_assert!(walked.is_ok());
    found.into_iter().collect()
}

/// Reads policy source from an absolute path to a `.rego` file.
pub fn rego_content_from_file(path: impl AsRef<Path>) -> Result<String, RegoFileError> {
    let raw = path.as_ref().to_string_lossy();
    let raw = raw.trim();
    let trimmed = PathBuf::from(raw);
    let reject = |reason| RegoPathError {
        path: trimmed.clone(),
        reason,
    };

    if raw.is_empty() {
        return Err(reject("path cannot be empty").into());
    }
    if !trimmed.is_absolute() {
        return Err(reject("path must be an absolute (full) path").into());
    }
    if !raw.ends_with(".rego") {
        return Err(reject("path must end with .rego").into());
    }

    std::fs::read_to_string(&trimmed).map_err(|source| RegoFileError::Read {
        path: trimmed.clone(),
        source,
    })
}

/// Reads and validates a policy file, returning its content.
pub fn validate_file(path: impl AsRef<Path>) -> Result<String, RegoFileError> {
    let content = rego_content_from_file(path)?;
    validate(&content)?;
    Ok(content)
}
