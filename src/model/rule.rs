// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{Audit, MappingError, Text};

use serde::{Deserialize, Serialize};

/// Value bound to a template parameter. Values are opaque strings; they are
/// not checked against the parameter type declared by the template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleParameter {
    pub name: String,
    pub value: String,
}

/// A template instantiated with concrete parameter values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Text,
    #[serde(default)]
    pub is_custom: bool,
    pub template_id: String,
    #[serde(default)]
    pub parameters: Vec<RuleParameter>,
    #[serde(default)]
    pub audit: Audit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub template_id: String,
    #[serde(default)]
    pub parameters: Vec<RuleParameter>,

    #[serde(default, skip_serializing)]
    pub is_custom: bool,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_by: Option<String>,
}

impl Rule {
    pub fn to_wire(&self) -> Result<RuleWire, MappingError> {
        if self.name.is_empty() {
            return Err(MappingError::MissingField("name is required."));
        }
        if self.template_id.is_empty() {
            return Err(MappingError::MissingField(
                "template_id is required. A rule must reference the template it is based on.",
            ));
        }
        if let Some(p) = self.parameters.iter().find(|p| p.name.is_empty()) {
            return Err(MappingError::InvalidField {
                field: "parameters.name",
                reason: format!("parameter with value '{}' has an empty name", p.value),
            });
        }

        Ok(RuleWire {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.to_wire(),
            template_id: self.template_id.clone(),
            parameters: self.parameters.clone(),
            is_custom: self.is_custom,
            created_at: self.audit.created_at.clone(),
            created_by: self.audit.created_by.clone(),
            updated_at: self.audit.updated_at.clone(),
            updated_by: self.audit.updated_by.clone(),
        })
    }

    pub fn from_wire(wire: RuleWire, previous: Option<&Rule>) -> Result<Self, MappingError> {
        Ok(Rule {
            id: wire.id,
            name: wire.name,
            description: Text::from_wire_or(wire.description, previous.map(|p| &p.description)),
            is_custom: wire.is_custom,
            template_id: wire.template_id,
            parameters: wire.parameters,
            audit: Audit {
                created_at: wire.created_at,
                created_by: wire.created_by,
                updated_at: wire.updated_at,
                updated_by: wire.updated_by,
            },
        })
    }
}
