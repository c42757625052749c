// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Create/read/update/delete orchestration for each entity kind.
//!
//! Every operation maps the local value to the wire model first, so an
//! invalid value never reaches the server. Responses are mapped back with the
//! local value as `previous`, which restores fields the server does not keep
//! (the template Rego path, omitted policy labels and empty descriptions).

use crate::client::{ApiError, Client, Deleted, ErrorKind};
use crate::error::{Error, Result};
use crate::model::{LifecyclePolicy, Rule, Template};

use tracing::{debug, error, info, warn};

fn require_id<'a>(id: &'a Option<String>, resource: &'static str) -> Result<&'a str> {
    match id.as_deref() {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(Error::MissingId(resource)),
    }
}

fn log_failure(operation: &str, resource: &str, e: &ApiError) {
    error!(operation, resource, error = %e, "API returned error during {operation}");
}

pub struct TemplateResource<'a> {
    client: &'a Client,
}

impl<'a> TemplateResource<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn check_rego(plan: &Template) -> Result<()> {
        if plan.rego.as_os_str().is_empty() {
            return Err(Error::MissingRego);
        }
        Ok(())
    }

    pub fn create(&self, plan: &Template) -> Result<Template> {
        Self::check_rego(plan)?;
        info!(name = %plan.name, "Creating template");

        let wire = plan.to_wire()?;
        let created = self.client.create_template(&wire).inspect_err(|e| {
            log_failure("create", "template", e);
        })?;
        let state = Template::from_wire(created, Some(plan))?;

        info!(id = state.id.as_deref().unwrap_or_default(), name = %state.name, "Template created successfully");
        Ok(state)
    }

    /// Returns `None` when the template no longer exists.
    pub fn read(&self, state: &Template) -> Result<Option<Template>> {
        let id = require_id(&state.id, "template")?;
        info!(id, "Reading template");

        match self.client.get_template(id)? {
            Some(wire) => Ok(Some(Template::from_wire(wire, Some(state))?)),
            None => {
                warn!(id, "Template not found, removing from state");
                Ok(None)
            }
        }
    }

    pub fn update(&self, plan: &Template) -> Result<Template> {
        Self::check_rego(plan)?;
        let id = require_id(&plan.id, "template")?;
        info!(id, "Updating template");

        let wire = plan.to_wire()?;
        let updated = self.client.update_template(id, &wire).inspect_err(|e| {
            log_failure("update", "template", e);
        })?;
        let state = Template::from_wire(updated, Some(plan))?;

        info!(id, "Template updated successfully");
        Ok(state)
    }

    pub fn delete(&self, state: &Template) -> Result<()> {
        let id = require_id(&state.id, "template")?;
        info!(id, "Deleting template");

        match self.client.delete_template(id)? {
            Deleted::Removed => info!(id, "Template deleted successfully"),
            Deleted::AlreadyGone => {
                warn!(id, "Template not found during deletion, assuming already deleted")
            }
        }
        Ok(())
    }

    /// Imported templates have no Rego path until the caller supplies one.
    pub fn import(&self, id: &str) -> Result<Template> {
        info!(id, "Importing template");
        match self.client.get_template(id)? {
            Some(wire) => Ok(Template::from_wire(wire, None)?),
            None => Err(Error::NotFound {
                resource: "template",
                id: id.to_string(),
            }),
        }
    }
}

pub struct RuleResource<'a> {
    client: &'a Client,
}

impl<'a> RuleResource<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn name_conflict(plan: &Rule, e: ApiError) -> Error {
        match e.kind() {
            Some(ErrorKind::Conflict) => Error::RuleNameConflict(plan.name.clone()),
            _ => e.into(),
        }
    }

    pub fn create(&self, plan: &Rule) -> Result<Rule> {
        info!(name = %plan.name, template_id = %plan.template_id, "Creating rule");

        let wire = plan.to_wire()?;
        let created = self.client.create_rule(&wire).map_err(|e| {
            log_failure("create", "rule", &e);
            Self::name_conflict(plan, e)
        })?;
        let state = Rule::from_wire(created, Some(plan))?;

        info!(id = state.id.as_deref().unwrap_or_default(), "Rule created successfully");
        Ok(state)
    }

    pub fn read(&self, state: &Rule) -> Result<Option<Rule>> {
        let id = require_id(&state.id, "rule")?;
        info!(id, "Reading rule");

        match self.client.get_rule(id)? {
            Some(wire) => Ok(Some(Rule::from_wire(wire, Some(state))?)),
            None => {
                warn!(id, "Rule not found, removing from state");
                Ok(None)
            }
        }
    }

    pub fn update(&self, plan: &Rule) -> Result<Rule> {
        let id = require_id(&plan.id, "rule")?;
        info!(id, "Updating rule");

        let wire = plan.to_wire()?;
        let updated = self.client.update_rule(id, &wire).map_err(|e| {
            log_failure("update", "rule", &e);
            Self::name_conflict(plan, e)
        })?;
        let state = Rule::from_wire(updated, Some(plan))?;

        info!(id, "Rule updated successfully");
        Ok(state)
    }

    /// Fails with [`Error::RuleInUse`] while a policy still references the rule.
    pub fn delete(&self, state: &Rule) -> Result<()> {
        let id = require_id(&state.id, "rule")?;
        info!(id, "Deleting rule");

        let deleted = self.client.delete_rule(id).map_err(|e| {
            log_failure("delete", "rule", &e);
            match e.kind() {
                Some(ErrorKind::Conflict) => Error::RuleInUse,
                _ => e.into(),
            }
        })?;
        match deleted {
            Deleted::Removed => info!(id, "Rule deleted successfully"),
            Deleted::AlreadyGone => warn!(id, "Rule not found during deletion, assuming already deleted"),
        }
        Ok(())
    }

    pub fn import(&self, id: &str) -> Result<Rule> {
        info!(id, "Importing rule");
        match self.client.get_rule(id)? {
            Some(wire) => Ok(Rule::from_wire(wire, None)?),
            None => Err(Error::NotFound {
                resource: "rule",
                id: id.to_string(),
            }),
        }
    }
}

pub struct LifecyclePolicyResource<'a> {
    client: &'a Client,
}

impl<'a> LifecyclePolicyResource<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub fn create(&self, plan: &LifecyclePolicy) -> Result<LifecyclePolicy> {
        info!(name = %plan.name, "Creating lifecycle policy");

        let wire = plan.to_wire()?;
        debug!(
            endpoint = crate::client::POLICIES_ENDPOINT,
            method = "POST",
            name = %wire.name,
            body = %serde_json::to_string(&wire).unwrap_or_default(),
            "API request details"
        );
        let created = self.client.create_policy(&wire).inspect_err(|e| {
            log_failure("create", "lifecycle policy", e);
        })?;
        let state = LifecyclePolicy::from_wire(created, Some(plan))?;

        info!(
            policy_id = state.id.as_deref().unwrap_or_default(),
            name = %state.name,
            "Lifecycle policy created successfully"
        );
        Ok(state)
    }

    pub fn read(&self, state: &LifecyclePolicy) -> Result<Option<LifecyclePolicy>> {
        let id = require_id(&state.id, "policy")?;
        info!(policy_id = id, "Reading lifecycle policy");

        let found = self.client.get_policy(id).inspect_err(|e| {
            log_failure("read", "lifecycle policy", e);
        })?;
        match found {
            Some(wire) => Ok(Some(LifecyclePolicy::from_wire(wire, Some(state))?)),
            None => {
                warn!(policy_id = id, "Lifecycle policy not found, removing from state");
                Ok(None)
            }
        }
    }

    pub fn update(&self, plan: &LifecyclePolicy) -> Result<LifecyclePolicy> {
        let id = require_id(&plan.id, "policy")?;
        info!(policy_id = id, "Updating lifecycle policy");

        let wire = plan.to_wire()?;
        let updated = self.client.update_policy(id, &wire).inspect_err(|e| {
            log_failure("update", "lifecycle policy", e);
        })?;
        let state = LifecyclePolicy::from_wire(updated, Some(plan))?;

        info!(policy_id = id, "Lifecycle policy updated successfully");
        Ok(state)
    }

    pub fn delete(&self, state: &LifecyclePolicy) -> Result<()> {
        let id = require_id(&state.id, "policy")?;
        info!(policy_id = id, "Deleting lifecycle policy");

        let deleted = self.client.delete_policy(id).inspect_err(|e| {
            log_failure("delete", "lifecycle policy", e);
        })?;
        match deleted {
            Deleted::Removed => info!(policy_id = id, "Lifecycle policy deleted successfully"),
            Deleted::AlreadyGone => warn!(
                policy_id = id,
                "Lifecycle policy not found during deletion, assuming already deleted"
            ),
        }
        Ok(())
    }

    pub fn import(&self, id: &str) -> Result<LifecyclePolicy> {
        info!(policy_id = id, "Importing lifecycle policy");
        match self.client.get_policy(id)? {
            Some(wire) => Ok(LifecyclePolicy::from_wire(wire, None)?),
            None => Err(Error::NotFound {
                resource: "lifecycle policy",
                id: id.to_string(),
            }),
        }
    }
}
