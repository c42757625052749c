// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Local (caller-side) models of Unified Policy entities and their JSON wire
//! counterparts.

pub mod lifecycle;
pub mod rule;
pub mod template;

pub use lifecycle::*;
pub use rule::*;
pub use template::*;

use crate::validator::RegoFileError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Optional free text that keeps "never set" apart from "set to empty".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Text {
    #[default]
    Unset,
    Empty,
    Value(String),
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            Self::Empty
        } else {
            Self::Value(text)
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Unset => None,
            Self::Empty => Some(""),
            Self::Value(v) => Some(v),
        }
    }

    /// `None` is omitted from the request body; `Some("")` is sent as is.
    pub fn to_wire(&self) -> Option<String> {
        self.as_str().map(str::to_string)
    }

    pub fn from_wire(value: Option<String>) -> Self {
        value.map_or(Self::Unset, Self::new)
    }

    /// Like [`Text::from_wire`], but an omitted value keeps a previous
    /// explicit empty string. The API drops empty descriptions.
    pub fn from_wire_or(value: Option<String>, previous: Option<&Text>) -> Self {
        match (value, previous) {
            (None, Some(Self::Empty)) => Self::Empty,
            (value, _) => Self::from_wire(value),
        }
    }

    pub(crate) fn char_len(&self) -> usize {
        self.as_str().map_or(0, |s| s.chars().count())
    }
}

impl From<&str> for Text {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<Option<String>> for Text {
    fn from(text: Option<String>) -> Self {
        Self::from_wire(text)
    }
}

/// Server-assigned bookkeeping fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Missing Required Field. {0}")]
    MissingField(&'static str),

    #[error("Invalid Scope Configuration. {0}")]
    InvalidScope(&'static str),

    #[error("Invalid Rule IDs. {0}")]
    RuleCount(&'static str),

    #[error("Invalid Attribute Value. {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Unexpected API Value. `{field}` has unexpected value '{value}'")]
    UnexpectedValue { field: &'static str, value: String },

    #[error(transparent)]
    Rego(#[from] RegoFileError),
}

pub(crate) fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), MappingError> {
    let len = value.chars().count();
    if len < min || len > max {
        let reason = match min {
            0 => format!("must be at most {max} characters, got {len}"),
            _ => format!("must be {min}-{max} characters, got {len}"),
        };
        return Err(MappingError::InvalidField { field, reason });
    }
    Ok(())
}

/// Declares a closed set of string values exchanged with the API.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            pub fn from_wire(
                field: &'static str,
                value: &str,
            ) -> Result<Self, $crate::model::MappingError> {
                match value {
                    $($text => Ok($name::$variant),)+
                    _ => Err($crate::model::MappingError::UnexpectedValue {
                        field,
                        value: value.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use wire_enum;
