// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Depth-first traversal over every expression of a parsed module.
//!
//! The callback is invoked on a node before its children. Returning
//! `Ok(false)` skips the children of that node.

use crate::ast::*;

use anyhow::Result;

pub type ExprCallback<'a> = dyn FnMut(&Expr) -> Result<bool> + 'a;

pub fn walk_module(module: &Module, f: &mut ExprCallback<'_>) -> Result<()> {
    walk_expr(&module.package, f)?;
    for import in &module.imports {
        walk_expr(&import.path, f)?;
    }
    for rule in &module.rules {
        walk_rule(rule, f)?;
    }
    Ok(())
}

pub fn walk_rule(rule: &Rule, f: &mut ExprCallback<'_>) -> Result<()> {
    walk_expr(&rule.path, f)?;
    match &rule.head {
        HeadKind::PartialSet(Some(key)) => walk_expr(key, f)?,
        HeadKind::Function(args) => walk_exprs(args, f)?,
        HeadKind::Default(_) | HeadKind::Complete | HeadKind::PartialSet(None) => (),
    }
    if let Some(value) = &rule.value {
        walk_expr(value, f)?;
    }
    for body in &rule.bodies {
        if let Some(value) = &body.value {
            walk_expr(value, f)?;
        }
        walk_query(&body.query, f)?;
    }
    Ok(())
}

pub fn walk_query(query: &Query, f: &mut ExprCallback<'_>) -> Result<()> {
    for stmt in &query.stmts {
        match &stmt.kind {
            StmtKind::SomeVars(_) => (),
            StmtKind::SomeIn {
                key,
                value,
                collection,
            } => {
                if let Some(key) = key {
                    walk_expr(key, f)?;
                }
                walk_expr(value, f)?;
                walk_expr(collection, f)?;
            }
            StmtKind::Expr(expr) | StmtKind::Not(expr) => walk_expr(expr, f)?,
            StmtKind::Every { domain, body, .. } => {
                walk_expr(domain, f)?;
                walk_query(body, f)?;
            }
        }
        for with in &stmt.with {
            walk_expr(&with.target, f)?;
            walk_expr(&with.value, f)?;
        }
    }
    Ok(())
}

fn walk_exprs(exprs: &[Expr], f: &mut ExprCallback<'_>) -> Result<()> {
    exprs.iter().try_for_each(|expr| walk_expr(expr, f))
}

pub fn walk_expr(expr: &Expr, f: &mut ExprCallback<'_>) -> Result<()> {
    if !f(expr)? {
        return Ok(());
    }

    match &expr.kind {
        ExprKind::Null
        | ExprKind::Bool(_)
        | ExprKind::Number
        | ExprKind::String(_)
        | ExprKind::RawString
        | ExprKind::Var => Ok(()),

        ExprKind::Array(items) | ExprKind::Set(items) => walk_exprs(items, f),

        ExprKind::Object(fields) => fields.iter().try_for_each(|(key, value)| {
            walk_expr(key, f)?;
            walk_expr(value, f)
        }),

        ExprKind::Comprehension(compr) => {
            if let Some(key) = &compr.key {
                walk_expr(key, f)?;
            }
            walk_expr(&compr.term, f)?;
            walk_query(&compr.body, f)
        }

        ExprKind::Call { callee, args } => {
            walk_expr(callee, f)?;
            walk_exprs(args, f)
        }

        ExprKind::Neg(operand) => walk_expr(operand, f),

        ExprKind::Field { target, .. } => walk_expr(target, f),

        ExprKind::Index { target, index } => {
            walk_expr(target, f)?;
            walk_expr(index, f)
        }

        ExprKind::Binary { lhs, rhs, .. } | ExprKind::Assign { lhs, rhs } => {
            walk_expr(lhs, f)?;
            walk_expr(rhs, f)
        }

        ExprKind::Membership {
            key,
            value,
            collection,
        } => {
            if let Some(key) = key {
                walk_expr(key, f)?;
            }
            walk_expr(value, f)?;
            walk_expr(collection, f)
        }
    }
}
