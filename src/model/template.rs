// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{check_length, wire_enum, Audit, MappingError, Text};
use crate::validator;

use std::path::PathBuf;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MAX_TEMPLATE_PARAMETERS: usize = 20;

lazy_static! {
    static ref PARAMETER_NAME: Regex = Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9._-]*[a-zA-Z0-9])?$")
        .expect("parameter name pattern is valid");
}

wire_enum! {
    Category {
        Security => "security",
        Legal => "legal",
        Operational => "operational",
        Quality => "quality",
        Audit => "audit",
        Workflow => "workflow",
    }
}

wire_enum! {
    /// `Xray` only appears on system templates read back from the server.
    DataSourceType {
        Noop => "noop",
        Evidence => "evidence",
        Xray => "xray",
    }
}

wire_enum! {
    ParameterType {
        String => "string",
        Bool => "bool",
        Int => "int",
        Float => "float",
        Object => "object",
    }
}

wire_enum! {
    ScannerType {
        Secrets => "secrets",
        Sca => "sca",
        Exposures => "exposures",
        ContextualAnalysis => "contextual_analysis",
        MaliciousPackage => "malicious_package",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterType,
}

/// A reusable unit of policy logic written in Rego.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Text,
    pub version: String,
    pub category: Category,
    pub data_source_type: DataSourceType,
    #[serde(default)]
    pub parameters: Vec<TemplateParameter>,
    /// Absolute path of the `.rego` file. The server only ever sees its content.
    pub rego: PathBuf,
    #[serde(default)]
    pub scanners: Vec<ScannerType>,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default)]
    pub audit: Audit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateParameterWire {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: String,
    pub category: String,
    pub data_source_type: String,
    #[serde(default)]
    pub parameters: Vec<TemplateParameterWire>,
    #[serde(default)]
    pub rego: String,
    #[serde(default)]
    pub scanners: Vec<String>,

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

impl TemplateParameter {
    fn check(&self) -> Result<(), MappingError> {
        check_length("parameters.name", &self.name, 1, 100)?;
        if !PARAMETER_NAME.is_match(&self.name) {
            return Err(MappingError::InvalidField {
                field: "parameters.name",
                reason: format!(
                    "'{}' must begin and end with alphanumeric characters and contain only alphanumerics, dots, dashes and underscores",
                    self.name
                ),
            });
        }
        Ok(())
    }
}

impl Template {
    /// Validates the template and reads its Rego file into the request body.
    pub fn to_wire(&self) -> Result<TemplateWire, MappingError> {
        check_length("name", &self.name, 1, 255)?;
        if self.description.char_len() > 2048 {
            return Err(MappingError::InvalidField {
                field: "description",
                reason: format!(
                    "must be at most 2048 characters, got {}",
                    self.description.char_len()
                ),
            });
        }
        check_length("version", &self.version, 1, 100)?;

        if self.data_source_type == DataSourceType::Xray {
            return Err(MappingError::InvalidField {
                field: "data_source_type",
                reason: "only 'noop' and 'evidence' can be used when creating or updating a template"
                    .to_string(),
            });
        }

        if self.parameters.len() > MAX_TEMPLATE_PARAMETERS {
            return Err(MappingError::InvalidField {
                field: "parameters",
                reason: format!(
                    "at most {MAX_TEMPLATE_PARAMETERS} parameters are allowed, got {}",
                    self.parameters.len()
                ),
            });
        }
        for p in &self.parameters {
            p.check()?;
        }

        let rego = validator::validate_file(&self.rego)?;

        Ok(TemplateWire {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.to_wire(),
            version: self.version.clone(),
            category: self.category.as_str().to_string(),
            data_source_type: self.data_source_type.as_str().to_string(),
            parameters: self
                .parameters
                .iter()
                .map(|p| TemplateParameterWire {
                    name: p.name.clone(),
                    kind: p.kind.as_str().to_string(),
                })
                .collect(),
            rego,
            scanners: self
                .scanners
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
            is_custom: self.is_custom,
            created_at: self.audit.created_at.clone(),
            created_by: self.audit.created_by.clone(),
            updated_at: self.audit.updated_at.clone(),
            updated_by: self.audit.updated_by.clone(),
        })
    }

    /// Builds the local template from a response. The Rego path is taken from
    /// `previous`; an imported template has none until the caller sets it.
    pub fn from_wire(wire: TemplateWire, previous: Option<&Template>) -> Result<Self, MappingError> {
        let parameters = wire
            .parameters
            .into_iter()
            .map(|p| {
                Ok(TemplateParameter {
                    kind: ParameterType::from_wire("parameters.type", &p.kind)?,
                    name: p.name,
                })
            })
            .collect::<Result<Vec<_>, MappingError>>()?;

        let scanners = wire
            .scanners
            .iter()
            .map(|s| ScannerType::from_wire("scanners", s))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Template {
            id: wire.id,
            name: wire.name,
            description: Text::from_wire(wire.description),
            version: wire.version,
            category: Category::from_wire("category", &wire.category)?,
            data_source_type: DataSourceType::from_wire(
                "data_source_type",
                &wire.data_source_type,
            )?,
            parameters,
            rego: previous.map(|p| p.rego.clone()).unwrap_or_default(),
            scanners,
            is_custom: wire.is_custom,
            audit: Audit {
                created_at: wire.created_at,
                created_by: wire.created_by,
                updated_at: wire.updated_at,
                updated_by: wire.updated_by,
            },
        })
    }
}
