// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

mod ast;
pub mod builtins;
pub mod config;
mod error;
mod lexer;
pub mod model;
mod parser;
pub mod validator;
mod visitor;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "client")]
pub mod resource;

pub use config::{ConfigError, ProviderConfig, ResolvedConfig};
pub use error::{Error, Result};
pub use model::{LifecyclePolicy, MappingError, Rule, Template, Text};
pub use validator::{validate, validate_file, RegoFileError, ValidationError};

#[cfg(feature = "client")]
pub use client::{ApiError, Client};

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::ast::*;
    pub use crate::lexer::*;
    pub use crate::parser::*;
    pub use crate::visitor::*;
}
