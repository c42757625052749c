// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{ApiError, Client};

use semver::Version;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

pub const MIN_ARTIFACTORY_VERSION: &str = "7.125.0";
pub const MIN_XRAY_VERSION: &str = "3.130.5";

const ARTIFACTORY_VERSION_ENDPOINT: &str = "artifactory/api/system/version";
const XRAY_VERSION_ENDPOINT: &str = "xray/api/v1/system/version";

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("Incompatible {product} version. Unified Policy requires {product} version {required} or higher. Current version: {current}")]
    Incompatible {
        product: &'static str,
        required: &'static str,
        current: String,
    },

    #[error("Error getting Artifactory version. Unified Policy requires Artifactory to be accessible. {0}")]
    ArtifactoryUnavailable(#[source] ApiError),

    #[error("Error getting Xray version. Unified Policy requires Xray to be installed and accessible. {0}")]
    XrayUnavailable(#[source] ApiError),
}

/// Platform versions found by [`Client::check_compatibility`]. Problems that
/// do not block the provider are reported as warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compatibility {
    pub artifactory: String,
    pub xray: String,
    pub warnings: Vec<String>,
}

#[derive(Deserialize)]
struct ArtifactoryVersion {
    version: String,
}

#[derive(Deserialize)]
struct XrayVersion {
    xray_version: String,
}

/// Parses versions such as `7.125`, `v3.130.5` or `7.125.0-rc.1`.
pub fn parse_version(raw: &str) -> Result<Version, semver::Error> {
    let raw = raw.trim();
    let raw = raw.strip_prefix('v').unwrap_or(raw);
    let (core, rest) = match raw.find(|c: char| c == '-' || c == '+') {
        Some(at) => raw.split_at(at),
        None => (raw, ""),
    };
    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{rest}"),
        2 => format!("{core}.0{rest}"),
        _ => raw.to_string(),
    };
    Version::parse(&padded)
}

/// Returns `Ok(None)` when `current` meets `minimum`, a warning when it cannot
/// be parsed, and an error when it is too old.
fn check(
    product: &'static str,
    minimum: &'static str,
    current: &str,
) -> Result<Option<String>, VersionError> {
    let required = parse_version(minimum).map_err(|_| VersionError::Incompatible {
        product,
        required: minimum,
        current: current.to_string(),
    })?;
    match parse_version(current) {
        Ok(found) if found < required => Err(VersionError::Incompatible {
            product,
            required: minimum,
            current: current.to_string(),
        }),
        Ok(_) => Ok(None),
        Err(e) => Ok(Some(format!(
            "Unable to parse {product} version '{current}'. Version compatibility check skipped. {e}"
        ))),
    }
}

impl Client {
    pub fn artifactory_version(&self) -> Result<String, ApiError> {
        let v: ArtifactoryVersion = self.get_json(ARTIFACTORY_VERSION_ENDPOINT, "read", "version")?;
        Ok(v.version)
    }

    pub fn xray_version(&self) -> Result<String, ApiError> {
        let v: XrayVersion = self.get_json(XRAY_VERSION_ENDPOINT, "read", "version")?;
        Ok(v.xray_version)
    }

    /// Verifies that Artifactory and Xray are recent enough for Unified Policy.
    pub fn check_compatibility(&self) -> Result<Compatibility, VersionError> {
        let mut compatibility = Compatibility::default();

        let artifactory = self
            .artifactory_version()
            .map_err(VersionError::ArtifactoryUnavailable)?;
        if let Some(w) = check("Artifactory", MIN_ARTIFACTORY_VERSION, &artifactory)? {
            compatibility.warnings.push(w);
        }
        compatibility.artifactory = artifactory;

        let xray = self.xray_version().map_err(VersionError::XrayUnavailable)?;
        if let Some(w) = check("Xray", MIN_XRAY_VERSION, &xray)? {
            compatibility.warnings.push(w);
        }
        compatibility.xray = xray;

        for w in &compatibility.warnings {
            warn!("{w}");
        }
        info!(
            artifactory = %compatibility.artifactory,
            xray = %compatibility.xray,
            "platform versions are compatible with Unified Policy"
        );
        Ok(compatibility)
    }
}
