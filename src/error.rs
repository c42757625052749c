// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[cfg(feature = "client")]
use crate::client::ApiError;
use crate::config::ConfigError;
use crate::model::MappingError;
use crate::validator::{RegoFileError, ValidationError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    RegoFile(#[from] RegoFileError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[cfg(feature = "client")]
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Missing Rego. The 'rego' field is required and must be the full (absolute) path to a .rego file.")]
    MissingRego,

    #[error("Missing ID. The {0} ID is required but was not set.")]
    MissingId(&'static str),

    #[error("Cannot import {resource}. No {resource} with ID '{id}' exists.")]
    NotFound { resource: &'static str, id: String },

    #[error("Rule Name Conflict. A rule with name '{0}' already exists. Please use a different name.")]
    RuleNameConflict(String),

    #[error("Rule In Use. The rule is still referenced by one or more active policies. Remove the rule from all policies before deleting it.")]
    RuleInUse,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
