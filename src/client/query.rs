// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Filters for the list endpoints, rendered as repeated query pairs.

use crate::model::{ActionType, Category, DataSourceType, Gate, Mode, ScannerType, ScopeType};

type Pairs = Vec<(&'static str, String)>;

/// `many` wins over `one` when both are given.
fn push_multi(pairs: &mut Pairs, key: &'static str, many: &[String], one: &Option<String>) {
    if !many.is_empty() {
        pairs.extend(many.iter().map(|v| (key, v.clone())));
    } else if let Some(v) = one {
        pairs.push((key, v.clone()));
    }
}

fn push_opt(pairs: &mut Pairs, key: &'static str, value: Option<impl ToString>) {
    if let Some(v) = value {
        pairs.push((key, v.to_string()));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paging {
    /// Sent as `offset`.
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl Paging {
    fn push(&self, pairs: &mut Pairs) {
        push_opt(pairs, "offset", self.page);
        push_opt(pairs, "limit", self.limit);
        push_opt(pairs, "sort_by", self.sort_by.as_ref());
        push_opt(pairs, "sort_order", self.sort_order.as_ref());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateQuery {
    pub id: Option<String>,
    pub ids: Vec<String>,
    pub name: Option<String>,
    pub names: Vec<String>,
    pub category: Option<Category>,
    pub paging: Paging,
}

impl TemplateQuery {
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![];
        push_multi(&mut pairs, "id", &self.ids, &self.id);
        push_multi(&mut pairs, "name", &self.names, &self.name);
        push_opt(&mut pairs, "category", self.category);
        self.paging.push(&mut pairs);
        pairs
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleQuery {
    pub id: Option<String>,
    pub ids: Vec<String>,
    pub name: Option<String>,
    pub names: Vec<String>,
    pub scanner_types: Vec<ScannerType>,
    pub template_data_source: Option<DataSourceType>,
    pub template_category: Option<Category>,
    pub expand: Option<String>,
    pub paging: Paging,
}

impl RuleQuery {
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![];
        push_multi(&mut pairs, "id", &self.ids, &self.id);
        push_multi(&mut pairs, "name", &self.names, &self.name);
        pairs.extend(
            self.scanner_types
                .iter()
                .map(|s| ("scanner_types", s.to_string())),
        );
        push_opt(&mut pairs, "template_data_source", self.template_data_source);
        push_opt(&mut pairs, "template_category", self.template_category);
        push_opt(&mut pairs, "expand", self.expand.as_ref());
        self.paging.push(&mut pairs);
        pairs
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyQuery {
    pub id: Option<String>,
    pub ids: Vec<String>,
    pub name: Option<String>,
    pub names: Vec<String>,
    pub stage_keys: Vec<String>,
    pub stage_gates: Vec<Gate>,
    pub application_keys: Vec<String>,
    pub enabled: Option<bool>,
    pub mode: Option<Mode>,
    pub action_type: Option<ActionType>,
    pub scope_type: Option<ScopeType>,
    pub project_key: Option<String>,
    /// `rules` embeds rule objects in each listed policy.
    pub expand: Option<String>,
    pub paging: Paging,
}

impl PolicyQuery {
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![];
        push_multi(&mut pairs, "id", &self.ids, &self.id);
        push_multi(&mut pairs, "name", &self.names, &self.name);
        pairs.extend(self.stage_keys.iter().map(|k| ("stage_key", k.clone())));
        pairs.extend(self.stage_gates.iter().map(|g| ("stage_gate", g.to_string())));
        pairs.extend(
            self.application_keys
                .iter()
                .map(|k| ("application_key", k.clone())),
        );
        push_opt(&mut pairs, "enabled", self.enabled);
        push_opt(&mut pairs, "mode", self.mode);
        push_opt(&mut pairs, "action_type", self.action_type);
        push_opt(&mut pairs, "scope_type", self.scope_type);
        push_opt(&mut pairs, "project_key", self.project_key.as_ref());
        push_opt(&mut pairs, "expand", self.expand.as_ref());
        self.paging.push(&mut pairs);
        pairs
    }
}
