// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Classification of a non-success HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    Authentication,
    PermissionDenied,
    NotFound,
    Conflict,
    Server,
    Unexpected,
}

impl ErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidRequest,
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            409 => Self::Conflict,
            500 | 502 | 503 => Self::Server,
            _ => Self::Unexpected,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "Invalid Request",
            Self::Authentication => "Authentication Failed",
            Self::PermissionDenied => "Permission Denied",
            Self::NotFound => "Resource Not Found",
            Self::Conflict => "Resource Conflict",
            Self::Server => "Server Error",
            Self::Unexpected => "API Error",
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("{}. {}", .kind.title(), status_message(.kind, .status, .operation, .resource, .detail))]
    Status {
        kind: ErrorKind,
        status: u16,
        operation: &'static str,
        resource: &'static str,
        detail: String,
    },

    #[error("Policy Already Exists. A policy with name '{0}' already exists. Please use a different name.")]
    PolicyExists(String),
}

impl ApiError {
    pub fn status(status: u16, operation: &'static str, resource: &'static str, body: &str) -> Self {
        Self::Status {
            kind: ErrorKind::from_status(status),
            status,
            operation,
            resource,
            detail: error_detail(body),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Status { kind, .. } => Some(*kind),
            Self::PolicyExists(_) => Some(ErrorKind::Conflict),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == Some(ErrorKind::NotFound)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

fn status_message(
    kind: &ErrorKind,
    status: &u16,
    operation: &str,
    resource: &str,
    detail: &str,
) -> String {
    if !detail.is_empty() {
        return match *kind {
            ErrorKind::InvalidRequest => format!("Failed to {operation} {resource}: {detail}"),
            ErrorKind::Server => format!("Server error (Status: {status}): {detail}"),
            ErrorKind::Unexpected => format!("Unexpected error (Status: {status}): {detail}"),
            _ => detail.to_string(),
        };
    }
    match *kind {
        ErrorKind::InvalidRequest => format!(
            "Failed to {operation} {resource}: The request was invalid (no details from server)."
        ),
        ErrorKind::Authentication => "Invalid credentials (no details from server).".to_string(),
        ErrorKind::PermissionDenied => {
            format!("You do not have permission to {operation} {resource}.")
        }
        ErrorKind::NotFound => format!("The {resource} was not found during {operation}."),
        ErrorKind::Conflict => format!("A conflict occurred during {operation} {resource}."),
        ErrorKind::Server => {
            format!("Server error during {operation} {resource} (Status: {status}).")
        }
        ErrorKind::Unexpected => {
            format!("Unexpected error during {operation} {resource} (Status: {status}).")
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FieldError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    field: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.field.is_empty() {
            write!(f, "{}: {} ({})", self.field, self.message, self.code)
        } else if !self.code.is_empty() {
            write!(f, "{} - {}", self.code, self.message)
        } else {
            f.write_str(&self.message)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorsBody {
    #[serde(default)]
    errors: Vec<FieldError>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    error: String,
    #[serde(default)]
    detail: String,
}

#[derive(Debug, Default, Deserialize)]
struct DetailsBody {
    #[serde(default)]
    details: Option<Value>,
    #[serde(default)]
    validation_errors: Option<Value>,
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}... (truncated)", &text[..end]),
        None => text.to_string(),
    }
}

fn details_from_body(body: &str) -> Option<String> {
    let extra: DetailsBody = serde_json::from_str(body).ok()?;
    let mut parts = vec![];
    match extra.details {
        None | Some(Value::Null) => (),
        Some(Value::String(s)) if s.is_empty() => (),
        Some(Value::String(s)) => parts.push(format!("details: {s}")),
        Some(v) => parts.push(format!("details: {v}")),
    }
    match extra.validation_errors {
        None | Some(Value::Null) => (),
        Some(v) => parts.push(format!("validation_errors: {v}")),
    }
    (!parts.is_empty()).then(|| parts.join("\n"))
}

/// Best user-facing message found in an error body.
fn user_message(body: &str) -> String {
    if body.is_empty() {
        return String::new();
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorsBody>(body) {
        if !parsed.errors.is_empty() {
            let mut out = parsed
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            if let Some(details) = details_from_body(body) {
                out.push('\n');
                out.push_str(&details);
            }
            return out;
        }
    }

    if let Ok(parsed) = serde_json::from_str::<MessageBody>(body) {
        for candidate in [parsed.message, parsed.error, parsed.detail] {
            if !candidate.is_empty() {
                return candidate;
            }
        }
    }

    if let Ok(parsed) = serde_json::from_str::<Vec<FieldError>>(body) {
        let messages = parsed
            .into_iter()
            .filter_map(|e| match (e.message.is_empty(), e.code.is_empty()) {
                (false, _) => Some(e.message),
                (true, false) => Some(e.code),
                (true, true) => None,
            })
            .collect::<Vec<_>>();
        if !messages.is_empty() {
            return messages.join("; ");
        }
    }

    format!("API returned: {}", truncate(body, 500))
}

fn is_generic_validation_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("failed validation")
        || lower.contains("validation failed")
        || lower.trim() == "invalid request"
}

/// Extracts the message shown to the user from an error response body.
/// Generic validation messages are replaced by the raw body, which carries
/// the field-level details.
pub fn error_detail(body: &str) -> String {
    let message = user_message(body);
    if is_generic_validation_message(&message) && !body.is_empty() {
        return truncate(body, 2000);
    }
    message
}
