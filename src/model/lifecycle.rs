// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{wire_enum, Audit, MappingError, Text};

use serde::{Deserialize, Serialize};

wire_enum! {
    Mode {
        Block => "block",
        Warning => "warning",
    }
}

wire_enum! {
    ActionType {
        CertifyToGate => "certify_to_gate",
    }
}

wire_enum! {
    Gate {
        Entry => "entry",
        Exit => "exit",
        Release => "release",
    }
}

wire_enum! {
    ScopeType {
        Project => "project",
        Application => "application",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub gate: Option<Gate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionType,
    #[serde(default)]
    pub stage: Option<Stage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationLabel {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(rename = "type")]
    pub kind: ScopeType,
    #[serde(default)]
    pub project_keys: Vec<String>,
    #[serde(default)]
    pub application_keys: Vec<String>,
    #[serde(default)]
    pub application_labels: Vec<ApplicationLabel>,
}

/// Binds rules to a lifecycle gate for a project or a set of applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecyclePolicy {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Text,
    pub enabled: bool,
    pub mode: Mode,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub rule_ids: Vec<String>,
    #[serde(default)]
    pub audit: Audit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageWire {
    pub key: String,
    pub gate: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionWire {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub stage: Option<StageWire>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeWire {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub project_keys: Vec<String>,
    #[serde(default)]
    pub application_keys: Vec<String>,
    #[serde(default)]
    pub application_labels: Vec<ApplicationLabel>,
}

/// Rule summary embedded in list responses requested with `expand=rules`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandedRule {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecyclePolicyWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    pub mode: String,
    #[serde(default)]
    pub action: Option<ActionWire>,
    #[serde(default)]
    pub scope: Option<ScopeWire>,
    #[serde(default)]
    pub rule_ids: Vec<String>,

    #[serde(default, skip_serializing)]
    pub rules: Vec<ExpandedRule>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_by: Option<String>,
}

impl LifecyclePolicyWire {
    /// Fills `rule_ids` from expanded rule objects when the server sent only those.
    pub fn resolve_expanded_rules(&mut self) {
        if self.rule_ids.is_empty() && !self.rules.is_empty() {
            self.rule_ids = self.rules.iter().map(|r| r.id.clone()).collect();
        }
    }
}

fn reject_empty_keys(field: &'static str, keys: &[String]) -> Result<(), MappingError> {
    if keys.iter().any(|k| k.trim().is_empty()) {
        return Err(MappingError::InvalidField {
            field,
            reason: "keys must not be empty".to_string(),
        });
    }
    Ok(())
}

impl Scope {
    fn check(&self) -> Result<(), MappingError> {
        match self.kind {
            ScopeType::Project => {
                if self.project_keys.is_empty() {
                    return Err(MappingError::InvalidScope(
                        "Scope type 'project' requires project_keys with exactly one project key.",
                    ));
                }
                if self.project_keys.len() > 1 {
                    return Err(MappingError::InvalidScope(
                        "project_keys must contain exactly one project key (API validation).",
                    ));
                }
            }
            ScopeType::Application => {
                if self.application_keys.is_empty() && self.application_labels.is_empty() {
                    return Err(MappingError::InvalidScope(
                        "Scope type 'application' requires application_keys and/or application_labels.",
                    ));
                }
            }
        }
        reject_empty_keys("scope.project_keys", &self.project_keys)?;
        reject_empty_keys("scope.application_keys", &self.application_keys)
    }
}

impl LifecyclePolicy {
    pub fn to_wire(&self) -> Result<LifecyclePolicyWire, MappingError> {
        if self.name.is_empty() {
            return Err(MappingError::MissingField("name is required."));
        }

        let Some(action) = &self.action else {
            return Err(MappingError::MissingField(
                "action is required. The API requires an action block with type and stage (key and gate).",
            ));
        };
        let Some(scope) = &self.scope else {
            return Err(MappingError::MissingField(
                "scope is required. The API requires a scope block with type and project_keys or application_keys/application_labels.",
            ));
        };
        let Some(stage) = &action.stage else {
            return Err(MappingError::MissingField(
                "action.stage is required when action is specified. Both stage.key and stage.gate must be provided.",
            ));
        };
        let (Some(key), Some(gate)) = (&stage.key, stage.gate) else {
            return Err(MappingError::MissingField(
                "action.stage.key and action.stage.gate are both required when action is specified.",
            ));
        };
        if key.is_empty() {
            return Err(MappingError::InvalidField {
                field: "action.stage.key",
                reason: "must not be empty".to_string(),
            });
        }

        scope.check()?;

        match self.rule_ids.len() {
            0 => {
                return Err(MappingError::RuleCount(
                    "rule_ids must contain at least one rule ID.",
                ))
            }
            1 => (),
            _ => {
                return Err(MappingError::RuleCount(
                    "rule_ids must contain maximum 1 item (API allows only one rule per policy).",
                ))
            }
        }
        reject_empty_keys("rule_ids", &self.rule_ids)?;

        Ok(LifecyclePolicyWire {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.to_wire(),
            enabled: self.enabled,
            mode: self.mode.as_str().to_string(),
            action: Some(ActionWire {
                kind: action.kind.as_str().to_string(),
                stage: Some(StageWire {
                    key: key.clone(),
                    gate: gate.as_str().to_string(),
                }),
            }),
            scope: Some(ScopeWire {
                kind: scope.kind.as_str().to_string(),
                project_keys: scope.project_keys.clone(),
                application_keys: scope.application_keys.clone(),
                application_labels: scope.application_labels.clone(),
            }),
            rule_ids: self.rule_ids.clone(),
            rules: vec![],
            created_at: self.audit.created_at.clone(),
            created_by: self.audit.created_by.clone(),
            updated_at: self.audit.updated_at.clone(),
            updated_by: self.audit.updated_by.clone(),
        })
    }

    /// Builds the local policy from a response. Application labels absent
    /// from the response are taken from `previous`.
    pub fn from_wire(
        wire: LifecyclePolicyWire,
        previous: Option<&LifecyclePolicy>,
    ) -> Result<Self, MappingError> {
        let action = match wire.action {
            Some(a) => Some(Action {
                kind: ActionType::from_wire("action.type", &a.kind)?,
                stage: match a.stage {
                    Some(s) => Some(Stage {
                        gate: Some(Gate::from_wire("action.stage.gate", &s.gate)?),
                        key: Some(s.key),
                    }),
                    None => None,
                },
            }),
            None => None,
        };

        let previous_labels = previous
            .and_then(|p| p.scope.as_ref())
            .map(|s| &s.application_labels);
        let scope = match wire.scope {
            Some(s) => {
                let application_labels = match (s.application_labels.is_empty(), previous_labels) {
                    (true, Some(labels)) => labels.clone(),
                    _ => s.application_labels,
                };
                Some(Scope {
                    kind: ScopeType::from_wire("scope.type", &s.kind)?,
                    project_keys: s.project_keys,
                    application_keys: s.application_keys,
                    application_labels,
                })
            }
            None => None,
        };

        Ok(LifecyclePolicy {
            id: wire.id,
            name: wire.name,
            description: Text::from_wire_or(wire.description, previous.map(|p| &p.description)),
            enabled: wire.enabled,
            mode: Mode::from_wire("mode", &wire.mode)?,
            action,
            scope,
            rule_ids: wire.rule_ids,
            audit: Audit {
                created_at: wire.created_at,
                created_by: wire.created_by,
                updated_at: wire.updated_at,
                updated_by: wire.updated_by,
            },
        })
    }
}
