// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use unified_policy::model::*;
use unified_policy::validator::{RegoFileError, ValidationError};

const POLICY: &str = r#"package curation

default allow := false

allow {
  count(input.data.evidence) >= to_number(input.params.min_count)
}
"#;

fn write_rego(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::File::create(&path)?.write_all(content.as_bytes())?;
    Ok(path)
}

fn template(rego: PathBuf) -> Template {
    Template {
        id: None,
        name: "evidence-count".to_string(),
        description: Text::from("Requires a minimum number of evidence entries"),
        version: "1.0.0".to_string(),
        category: Category::Workflow,
        data_source_type: DataSourceType::Evidence,
        parameters: vec![TemplateParameter {
            name: "min_count".to_string(),
            kind: ParameterType::Int,
        }],
        rego,
        scanners: vec![],
        is_custom: false,
        audit: Audit::default(),
    }
}

fn rule() -> Rule {
    Rule {
        name: "at-least-two".to_string(),
        template_id: "tmpl-1".to_string(),
        parameters: vec![RuleParameter {
            name: "min_count".to_string(),
            value: "2".to_string(),
        }],
        ..Rule::default()
    }
}

fn policy() -> LifecyclePolicy {
    LifecyclePolicy {
        id: None,
        name: "gate-prod".to_string(),
        description: Text::Unset,
        enabled: true,
        mode: Mode::Block,
        action: Some(Action {
            kind: ActionType::CertifyToGate,
            stage: Some(Stage {
                key: Some("PROD".to_string()),
                gate: Some(Gate::Entry),
            }),
        }),
        scope: Some(Scope {
            kind: ScopeType::Project,
            project_keys: vec!["proj1".to_string()],
            application_keys: vec![],
            application_labels: vec![],
        }),
        rule_ids: vec!["rule-1".to_string()],
        audit: Audit::default(),
    }
}

fn invalid_field(err: MappingError) -> Result<(&'static str, String)> {
    match err {
        MappingError::InvalidField { field, reason } => Ok((field, reason)),
        other => bail!("expected an invalid field error, got {other:?}"),
    }
}

#[test]
fn text_states() {
    assert_eq!(Text::new(""), Text::Empty);
    assert_eq!(Text::new("x"), Text::Value("x".to_string()));
    assert_eq!(Text::Unset.to_wire(), None);
    assert_eq!(Text::Empty.to_wire(), Some(String::new()));
    assert_eq!(Text::from_wire(None), Text::Unset);
    assert_eq!(Text::from_wire(Some(String::new())), Text::Empty);

    // An omitted value only keeps a previous explicit empty string.
    assert_eq!(Text::from_wire_or(None, Some(&Text::Empty)), Text::Empty);
    assert_eq!(
        Text::from_wire_or(None, Some(&Text::Value("old".to_string()))),
        Text::Unset
    );
    assert_eq!(
        Text::from_wire_or(Some("new".to_string()), Some(&Text::Empty)),
        Text::Value("new".to_string())
    );
}

#[test]
fn wire_enum_values() -> Result<()> {
    assert_eq!(Gate::from_wire("gate", "release")?, Gate::Release);
    assert_eq!(ScannerType::ContextualAnalysis.as_str(), "contextual_analysis");
    assert_eq!(Category::ALL.len(), 6);
    assert_eq!(Mode::Warning.to_string(), "warning");
    assert_eq!(serde_json::to_string(&ParameterType::Float)?, "\"float\"");

    let err = Mode::from_wire("mode", "audit").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unexpected API Value. `mode` has unexpected value 'audit'"
    );
    Ok(())
}

#[test]
fn template_to_wire_reads_rego() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_rego(dir.path(), "evidence.rego", POLICY)?;
    let wire = template(path).to_wire()?;

    assert_eq!(wire.rego, POLICY);
    assert_eq!(wire.category, "workflow");
    assert_eq!(wire.data_source_type, "evidence");
    assert_eq!(wire.parameters[0].kind, "int");

    let json = serde_json::to_value(&wire)?;
    assert_eq!(json["parameters"][0]["type"], "int");
    assert_eq!(json["scanners"], serde_json::json!([]));
    assert!(json.get("id").is_none());
    assert!(json.get("is_custom").is_none());
    assert!(json.get("created_at").is_none());
    Ok(())
}

#[test]
fn template_field_limits() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_rego(dir.path(), "t.rego", POLICY)?;

    let mut t = template(path.clone());
    t.name = String::new();
    let (field, reason) = invalid_field(t.to_wire().unwrap_err())?;
    assert_eq!((field, reason.as_str()), ("name", "must be 1-255 characters, got 0"));

    let mut t = template(path.clone());
    t.description = Text::new("d".repeat(2049));
    let (field, reason) = invalid_field(t.to_wire().unwrap_err())?;
    assert_eq!(field, "description");
    assert_eq!(reason, "must be at most 2048 characters, got 2049");

    // Limits count characters, not bytes.
    let mut t = template(path.clone());
    t.description = Text::new("é".repeat(2048));
    t.to_wire()?;

    let mut t = template(path.clone());
    t.version = "v".repeat(101);
    assert_eq!(invalid_field(t.to_wire().unwrap_err())?.0, "version");

    let mut t = template(path.clone());
    t.data_source_type = DataSourceType::Xray;
    assert_eq!(invalid_field(t.to_wire().unwrap_err())?.0, "data_source_type");

    let mut t = template(path.clone());
    t.parameters = (0..=MAX_TEMPLATE_PARAMETERS)
        .map(|i| TemplateParameter {
            name: format!("p{i}"),
            kind: ParameterType::String,
        })
        .collect();
    assert_eq!(invalid_field(t.to_wire().unwrap_err())?.0, "parameters");

    for name in ["", "_lead", "trail.", "has space"] {
        let mut t = template(path.clone());
        t.parameters[0].name = name.to_string();
        assert_eq!(
            invalid_field(t.to_wire().unwrap_err())?.0,
            "parameters.name",
            "{name:?}"
        );
    }

    for name in ["a", "min_count", "x.y-z", "A1"] {
        let mut t = template(path.clone());
        t.parameters[0].name = name.to_string();
        t.to_wire()?;
    }
    Ok(())
}

#[test]
fn template_rego_errors() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let t = template(PathBuf::from("relative/policy.rego"));
    assert!(matches!(
        t.to_wire(),
        Err(MappingError::Rego(RegoFileError::Path(_)))
    ));

    let path = write_rego(dir.path(), "net.rego", "package p\n\nr := http.send({})\n")?;
    match template(path).to_wire() {
        Err(MappingError::Rego(RegoFileError::Invalid(ValidationError::Disallowed(ops)))) => {
            assert_eq!(ops, ["http.send"])
        }
        other => bail!("unexpected result {other:?}"),
    }
    Ok(())
}

#[test]
fn template_from_wire_keeps_rego_path() -> Result<()> {
    let wire: TemplateWire = serde_json::from_value(serde_json::json!({
        "id": "tmpl-7",
        "name": "evidence-count",
        "version": "1.0.0",
        "category": "workflow",
        "data_source_type": "evidence",
        "parameters": [{"name": "min_count", "type": "int"}],
        "rego": "package curation",
        "scanners": ["sca", "secrets"],
        "is_custom": true,
        "created_at": "2025-01-01T00:00:00Z",
        "created_by": "admin"
    }))?;

    let plan = template(PathBuf::from("/policies/evidence.rego"));
    let state = Template::from_wire(wire.clone(), Some(&plan))?;
    assert_eq!(state.id.as_deref(), Some("tmpl-7"));
    assert_eq!(state.rego, PathBuf::from("/policies/evidence.rego"));
    assert_eq!(state.scanners, [ScannerType::Sca, ScannerType::Secrets]);
    assert_eq!(state.description, Text::Unset);
    assert!(state.is_custom);
    assert_eq!(state.audit.created_by.as_deref(), Some("admin"));

    let imported = Template::from_wire(wire, None)?;
    assert_eq!(imported.rego, PathBuf::new());

    let bad: TemplateWire = serde_json::from_value(serde_json::json!({
        "name": "n",
        "version": "1",
        "category": "finance",
        "data_source_type": "noop"
    }))?;
    assert!(matches!(
        Template::from_wire(bad, None),
        Err(MappingError::UnexpectedValue {
            field: "category",
            ..
        })
    ));
    Ok(())
}

#[test]
fn rule_to_wire() -> Result<()> {
    let wire = rule().to_wire()?;
    let json = serde_json::to_value(&wire)?;
    assert_eq!(
        json,
        serde_json::json!({
            "name": "at-least-two",
            "template_id": "tmpl-1",
            "parameters": [{"name": "min_count", "value": "2"}]
        })
    );

    let mut r = rule();
    r.description = Text::Empty;
    r.parameters.clear();
    let json = serde_json::to_value(r.to_wire()?)?;
    assert_eq!(json["description"], "");
    assert_eq!(json["parameters"], serde_json::json!([]));
    Ok(())
}

#[test]
fn rule_required_fields() {
    let mut r = rule();
    r.name.clear();
    assert_eq!(
        r.to_wire().unwrap_err().to_string(),
        "Missing Required Field. name is required."
    );

    let mut r = rule();
    r.template_id.clear();
    assert!(matches!(r.to_wire(), Err(MappingError::MissingField(m)) if m.starts_with("template_id is required.")));

    let mut r = rule();
    r.parameters[0].name.clear();
    assert!(matches!(
        r.to_wire(),
        Err(MappingError::InvalidField {
            field: "parameters.name",
            ..
        })
    ));
}

#[test]
fn rule_from_wire_keeps_empty_description() -> Result<()> {
    let wire: RuleWire = serde_json::from_str(
        r#"{"id": "rule-1", "name": "at-least-two", "template_id": "tmpl-1",
            "parameters": [{"name": "min_count", "value": "2"}], "is_custom": true}"#,
    )?;

    let mut plan = rule();
    plan.description = Text::Empty;
    let state = Rule::from_wire(wire.clone(), Some(&plan))?;
    assert_eq!(state.description, Text::Empty);
    assert_eq!(state.id.as_deref(), Some("rule-1"));
    assert!(state.is_custom);
    assert_eq!(state.parameters, plan.parameters);

    let imported = Rule::from_wire(wire, None)?;
    assert_eq!(imported.description, Text::Unset);
    Ok(())
}

#[test]
fn policy_to_wire() -> Result<()> {
    let json = serde_json::to_value(policy().to_wire()?)?;
    assert_eq!(
        json,
        serde_json::json!({
            "name": "gate-prod",
            "enabled": true,
            "mode": "block",
            "action": {"type": "certify_to_gate", "stage": {"key": "PROD", "gate": "entry"}},
            "scope": {
                "type": "project",
                "project_keys": ["proj1"],
                "application_keys": [],
                "application_labels": []
            },
            "rule_ids": ["rule-1"]
        })
    );
    Ok(())
}

#[test]
fn policy_action_is_required() {
    let mut p = policy();
    p.action = None;
    assert!(matches!(p.to_wire(), Err(MappingError::MissingField(m)) if m.starts_with("action is required.")));

    let mut p = policy();
    p.scope = None;
    assert!(matches!(p.to_wire(), Err(MappingError::MissingField(m)) if m.starts_with("scope is required.")));

    let mut p = policy();
    if let Some(action) = p.action.as_mut() {
        action.stage = None;
    }
    assert!(matches!(p.to_wire(), Err(MappingError::MissingField(m)) if m.starts_with("action.stage is required")));

    let mut p = policy();
    if let Some(stage) = p.action.as_mut().and_then(|a| a.stage.as_mut()) {
        stage.gate = None;
    }
    assert!(matches!(p.to_wire(), Err(MappingError::MissingField(m)) if m.starts_with("action.stage.key and action.stage.gate")));

    let mut p = policy();
    if let Some(stage) = p.action.as_mut().and_then(|a| a.stage.as_mut()) {
        stage.key = Some(String::new());
    }
    assert!(matches!(
        p.to_wire(),
        Err(MappingError::InvalidField {
            field: "action.stage.key",
            ..
        })
    ));
}

#[test]
fn policy_scope_rules() {
    let with_scope = |scope: Scope| {
        let mut p = policy();
        p.scope = Some(scope);
        p.to_wire()
    };
    let project = |keys: &[&str]| Scope {
        kind: ScopeType::Project,
        project_keys: keys.iter().map(|k| k.to_string()).collect(),
        application_keys: vec![],
        application_labels: vec![],
    };

    let err = with_scope(project(&[])).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid Scope Configuration. Scope type 'project' requires project_keys with exactly one project key."
    );
    assert!(matches!(
        with_scope(project(&["a", "b"])),
        Err(MappingError::InvalidScope(m)) if m.starts_with("project_keys must contain exactly one")
    ));
    assert!(matches!(
        with_scope(project(&[" "])),
        Err(MappingError::InvalidField {
            field: "scope.project_keys",
            ..
        })
    ));

    let application = Scope {
        kind: ScopeType::Application,
        project_keys: vec![],
        application_keys: vec![],
        application_labels: vec![],
    };
    assert!(matches!(
        with_scope(application.clone()),
        Err(MappingError::InvalidScope(m)) if m.starts_with("Scope type 'application'")
    ));

    let labelled = Scope {
        application_labels: vec![ApplicationLabel {
            key: "tier".to_string(),
            value: "gold".to_string(),
        }],
        ..application.clone()
    };
    assert!(with_scope(labelled).is_ok());

    let keyed = Scope {
        application_keys: vec!["app-1".to_string(), "app-2".to_string()],
        ..application
    };
    assert!(with_scope(keyed).is_ok());
}

#[test]
fn policy_takes_exactly_one_rule() {
    let mut p = policy();
    p.rule_ids.clear();
    assert_eq!(
        p.to_wire().unwrap_err().to_string(),
        "Invalid Rule IDs. rule_ids must contain at least one rule ID."
    );

    p.rule_ids = vec!["r1".to_string(), "r2".to_string()];
    assert!(matches!(p.to_wire(), Err(MappingError::RuleCount(m)) if m.contains("maximum 1 item")));

    p.rule_ids = vec![String::new()];
    assert!(matches!(
        p.to_wire(),
        Err(MappingError::InvalidField {
            field: "rule_ids",
            ..
        })
    ));
}

#[test]
fn policy_from_wire_restores_omitted_fields() -> Result<()> {
    let labels = vec![ApplicationLabel {
        key: "tier".to_string(),
        value: "gold".to_string(),
    }];
    let mut plan = policy();
    plan.description = Text::Empty;
    plan.scope = Some(Scope {
        kind: ScopeType::Application,
        project_keys: vec![],
        application_keys: vec![],
        application_labels: labels.clone(),
    });

    let wire: LifecyclePolicyWire = serde_json::from_value(serde_json::json!({
        "id": "pol-1",
        "name": "gate-prod",
        "enabled": true,
        "mode": "warning",
        "action": {"type": "certify_to_gate", "stage": {"key": "PROD", "gate": "release"}},
        "scope": {"type": "application"},
        "rule_ids": ["rule-1"],
        "updated_by": "ci"
    }))?;

    let state = LifecyclePolicy::from_wire(wire.clone(), Some(&plan))?;
    assert_eq!(state.id.as_deref(), Some("pol-1"));
    assert_eq!(state.mode, Mode::Warning);
    assert_eq!(state.description, Text::Empty);
    assert_eq!(
        state.scope.as_ref().map(|s| &s.application_labels),
        Some(&labels)
    );
    assert_eq!(
        state.action.and_then(|a| a.stage).and_then(|s| s.gate),
        Some(Gate::Release)
    );
    assert_eq!(state.audit.updated_by.as_deref(), Some("ci"));

    let imported = LifecyclePolicy::from_wire(wire, None)?;
    assert_eq!(imported.description, Text::Unset);
    assert!(imported
        .scope
        .map(|s| s.application_labels.is_empty())
        .unwrap_or_default());
    Ok(())
}

#[test]
fn expanded_rules_fill_rule_ids() -> Result<()> {
    let mut wire: LifecyclePolicyWire = serde_json::from_value(serde_json::json!({
        "name": "p",
        "mode": "block",
        "rules": [{"id": "rule-9", "name": "nine"}]
    }))?;
    assert!(wire.rule_ids.is_empty());
    wire.resolve_expanded_rules();
    assert_eq!(wire.rule_ids, ["rule-9"]);

    // Expanded rules are never sent back.
    let json = serde_json::to_value(&wire)?;
    assert!(json.get("rules").is_none());
    Ok(())
}

fn descriptions() -> [Text; 3] {
    [Text::Unset, Text::Empty, Text::from("Gate releases on evidence")]
}

fn audit() -> Audit {
    Audit {
        created_at: Some("2025-01-02T03:04:05Z".to_string()),
        created_by: Some("admin".to_string()),
        updated_at: Some("2025-02-03T04:05:06Z".to_string()),
        updated_by: Some("ci".to_string()),
    }
}

#[test]
fn template_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rego = write_rego(dir.path(), "policy.rego", POLICY)?;

    let full = Template {
        id: Some("tmpl-7".to_string()),
        category: Category::Security,
        data_source_type: DataSourceType::Noop,
        parameters: vec![
            TemplateParameter {
                name: "min_count".to_string(),
                kind: ParameterType::Int,
            },
            TemplateParameter {
                name: "labels.allowed-list".to_string(),
                kind: ParameterType::Object,
            },
        ],
        scanners: vec![ScannerType::Sca, ScannerType::ContextualAnalysis],
        is_custom: true,
        audit: audit(),
        ..template(rego.clone())
    };
    let bare = Template {
        parameters: vec![],
        scanners: vec![],
        ..template(rego)
    };

    for base in [full, bare] {
        for description in descriptions() {
            let local = Template {
                description,
                ..base.clone()
            };
            let back = Template::from_wire(local.to_wire()?, Some(&local))?;
            assert_eq!(back, local);
        }
    }
    Ok(())
}

#[test]
fn rule_round_trip() -> Result<()> {
    let full = Rule {
        id: Some("rule-9".to_string()),
        is_custom: true,
        parameters: vec![
            RuleParameter {
                name: "min_count".to_string(),
                value: "2".to_string(),
            },
            RuleParameter {
                name: "labels".to_string(),
                value: r#"{"team": "core"}"#.to_string(),
            },
        ],
        audit: audit(),
        ..rule()
    };
    let bare = Rule {
        parameters: vec![],
        ..rule()
    };

    for base in [full, bare] {
        for description in descriptions() {
            let local = Rule {
                description,
                ..base.clone()
            };
            let back = Rule::from_wire(local.to_wire()?, Some(&local))?;
            assert_eq!(back, local);
        }
    }
    Ok(())
}

#[test]
fn policy_round_trip() -> Result<()> {
    let project = LifecyclePolicy {
        id: Some("pol-3".to_string()),
        audit: audit(),
        ..policy()
    };
    let application = LifecyclePolicy {
        enabled: false,
        mode: Mode::Warning,
        action: Some(Action {
            kind: ActionType::CertifyToGate,
            stage: Some(Stage {
                key: Some("QA".to_string()),
                gate: Some(Gate::Release),
            }),
        }),
        scope: Some(Scope {
            kind: ScopeType::Application,
            project_keys: vec![],
            application_keys: vec!["app-a".to_string(), "app-b".to_string()],
            application_labels: vec![ApplicationLabel {
                key: "tier".to_string(),
                value: "gold".to_string(),
            }],
        }),
        ..policy()
    };
    let labels_only = LifecyclePolicy {
        scope: Some(Scope {
            kind: ScopeType::Application,
            project_keys: vec![],
            application_keys: vec![],
            application_labels: vec![ApplicationLabel {
                key: "env".to_string(),
                value: "prod".to_string(),
            }],
        }),
        ..policy()
    };

    for base in [project, application, labels_only] {
        for description in descriptions() {
            let local = LifecyclePolicy {
                description,
                ..base.clone()
            };
            let back = LifecyclePolicy::from_wire(local.to_wire()?, Some(&local))?;
            assert_eq!(back, local);
        }
    }
    Ok(())
}
