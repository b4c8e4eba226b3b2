use content_validate::constants::FRAMEWORK_ERROR_CODE;
use content_validate::docker::{DockerHubClient, StaticDockerHub};
use content_validate::validate::{render_human, render_json, Outcome};
use content_validate::{run_validation, ContentError, ExecutionMode, RunOutcome, ValidateConfig, ValidatorRegistry};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn write_file(root: &Path, path: &str, content: &str) {
    let full_path = root.join(path);
    if let Some(parent) = full_path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(full_path, content).expect("write file");
}

fn content_repo() -> TempDir {
    let temp = TempDir::new().expect("tempdir");
    write_file(
        temp.path(),
        "Packs/Hello/pack_metadata.json",
        r#"{"name": "Hello", "currentVersion": "1.0.0", "support": "xsoar"}"#,
    );
    temp
}

fn root_of(temp: &TempDir) -> PathBuf {
    temp.path().canonicalize().expect("canonical root")
}

fn config(root: &Path, select: &[&str]) -> ValidateConfig {
    ValidateConfig {
        select: select.iter().map(|code| code.to_string()).collect(),
        docker_checks: false,
        workers: 2,
        ..ValidateConfig::for_root(root)
    }
}

fn run(config: &ValidateConfig) -> RunOutcome {
    let registry = ValidatorRegistry::with_defaults().expect("registry");
    run_validation(config, &registry, None).expect("run")
}

fn codes(outcome: &RunOutcome) -> Vec<&str> {
    outcome.results.iter().map(|result| result.error_code.as_str()).collect()
}

fn script(name: &str) -> String {
    format!("commonfields:\n  id: {name}\n  version: -1\nname: {name}\ntype: python\nsubtype: python3\nscript: ''\n")
}

#[test]
fn incident_alert_script_names_collide() {
    let temp = content_repo();
    write_file(temp.path(), "Packs/Hello/Scripts/GetIncidentData/GetIncidentData.yml", &script("GetIncidentData"));
    write_file(temp.path(), "Packs/Hello/Scripts/GetAlertData/GetAlertData.yml", &script("GetAlertData"));
    write_file(temp.path(), "Packs/Hello/Scripts/PrintData/PrintData.yml", &script("PrintData"));

    let outcome = run(&config(&root_of(&temp), &["GR106"]));
    assert_eq!(codes(&outcome), vec!["GR106"]);
    let result = &outcome.results[0];
    assert_eq!(result.path, PathBuf::from("Packs/Hello/Scripts/GetAlertData/GetAlertData.yml"));
    assert!(result
        .message
        .starts_with("Cannot create a script with the name GetAlertData, because a script with the name GetIncidentData already exists."));
    assert_eq!(outcome.exit_code(), 1);
}

#[test]
fn duplicate_ids_are_reported_on_both_items() {
    let temp = content_repo();
    write_file(
        temp.path(),
        "Packs/Other/pack_metadata.json",
        r#"{"name": "Other", "currentVersion": "1.0.0"}"#,
    );
    write_file(temp.path(), "Packs/Hello/Playbooks/playbook-Dup.yml", "id: Dup\nname: Dup\n");
    write_file(temp.path(), "Packs/Other/Playbooks/playbook-Dup.yml", "id: Dup\nname: Dup\n");

    let outcome = run(&config(&root_of(&temp), &["GR105"]));
    let paths = outcome.results.iter().map(|result| result.path.clone()).collect::<Vec<_>>();
    assert_eq!(
        paths,
        vec![
            PathBuf::from("Packs/Hello/Playbooks/playbook-Dup.yml"),
            PathBuf::from("Packs/Other/Playbooks/playbook-Dup.yml"),
        ]
    );
    assert_eq!(
        outcome.results[0].message,
        "The Playbook id 'Dup' is also used by Packs/Other/Playbooks/playbook-Dup.yml. Content item ids must be unique."
    );
}

#[test]
fn invalid_hidden_values_fail_the_run() {
    let temp = content_repo();
    write_file(
        temp.path(),
        "Packs/Hello/Integrations/Hello/Hello.yml",
        "commonfields:\n  id: Hello\nname: Hello\ndisplay: Hello\ncategory: Utilities\nconfiguration:\n- name: url\n  type: 0\n  hidden: [xsoar, moon]\nscript:\n  type: python\n  subtype: python3\n  commands:\n  - name: hello\n",
    );

    let outcome = run(&config(&root_of(&temp), &["IN156"]));
    assert_eq!(codes(&outcome), vec!["IN156"]);
    assert!(outcome.results[0].message.contains("moon"));
    assert!(!outcome.is_valid());
}

#[test]
fn mcp_integration_is_fixed_to_platform() {
    let temp = TempDir::new().expect("tempdir");
    write_file(
        temp.path(),
        "Packs/Mcp/pack_metadata.json",
        r#"{"name": "Mcp", "currentVersion": "1.0.0", "marketplaces": ["platform", "xsoar"]}"#,
    );
    let descriptor = "Packs/Mcp/Integrations/Mcp/Mcp.yml";
    write_file(
        temp.path(),
        descriptor,
        "commonfields:\n  id: Mcp\nname: Mcp\ndisplay: Mcp\ncategory: Utilities\nismcp: true\nscript:\n  type: python\n  subtype: python3\n  commands:\n  - name: mcp-list\n",
    );
    let root = root_of(&temp);

    let before = run(&config(&root, &["IN168"]));
    assert_eq!(codes(&before), vec!["IN168"]);
    assert!(before.results[0].message.contains("but it ships to: platform, xsoar."));

    let fixing = ValidateConfig {
        fix: true,
        ..config(&root, &["IN168"])
    };
    let fixed = run(&fixing);
    assert_eq!(fixed.results.len(), 1);
    assert_eq!(fixed.results[0].outcome, Outcome::Fixed);
    assert_eq!(fixed.fixes_applied, 1);
    assert_eq!(fixed.exit_code(), 0);

    let written: serde_yaml::Value =
        serde_yaml::from_str(&fs::read_to_string(root.join(descriptor)).expect("read")).expect("yaml");
    assert_eq!(written["marketplaces"], serde_yaml::from_str::<serde_yaml::Value>("[platform]").expect("yaml"));
    assert!(run(&config(&root, &["IN168"])).results.is_empty());
}

#[test]
fn unresolved_fix_is_reported_next_to_the_violation() {
    let temp = TempDir::new().expect("tempdir");
    write_file(
        temp.path(),
        "Packs/Mcp/pack_metadata.json",
        r#"{"name": "Mcp", "currentVersion": "1.0.0", "marketplaces": ["xsoar"]}"#,
    );
    let descriptor = "Packs/Mcp/Integrations/Mcp/Mcp.yml";
    write_file(
        temp.path(),
        descriptor,
        "commonfields:\n  id: Mcp\nname: Mcp\ndisplay: Mcp\ncategory: Utilities\nismcp: true\nscript:\n  type: python\n  subtype: python3\n  commands:\n  - name: mcp-list\n",
    );
    let root = root_of(&temp);

    let outcome = run(&ValidateConfig {
        fix: true,
        ..config(&root, &["IN168"])
    });
    assert_eq!(outcome.fixes_applied, 0);
    assert_eq!(outcome.exit_code(), 1);
    let violation = outcome
        .results
        .iter()
        .find(|result| result.outcome == Outcome::Violation)
        .expect("violation kept");
    assert!(violation.message.contains("but it ships to: xsoar."));
    assert!(outcome.results.iter().any(|result| result.outcome == Outcome::FixFailed));

    let printed = render_human(&outcome);
    assert!(printed.contains(&format!(
        "IN168: {descriptor}: FIX FAILED: The fix of IN168 did not resolve the violation"
    )));
}

#[test]
fn graph_rules_only_report_the_selected_files() {
    let temp = content_repo();
    write_file(
        temp.path(),
        "Packs/Other/pack_metadata.json",
        r#"{"name": "Other", "currentVersion": "1.0.0"}"#,
    );
    let selected = "Packs/Hello/Playbooks/playbook-Dup.yml";
    write_file(temp.path(), selected, "id: Dup\nname: Dup\n");
    write_file(temp.path(), "Packs/Other/Playbooks/playbook-Dup.yml", "id: Dup\nname: Dup\n");
    let alert = "Packs/Hello/Scripts/GetAlertData/GetAlertData.yml";
    write_file(temp.path(), "Packs/Hello/Scripts/GetIncidentData/GetIncidentData.yml", &script("GetIncidentData"));
    write_file(temp.path(), alert, &script("GetAlertData"));
    let root = root_of(&temp);

    let specific = |paths: &[&str]| ValidateConfig {
        execution_mode: ExecutionMode::SpecificFiles,
        file_paths: paths.iter().map(PathBuf::from).collect(),
        ..config(&root, &["GR105", "GR106"])
    };

    let outcome = run(&specific(&[selected]));
    assert_eq!(codes(&outcome), vec!["GR105"]);
    assert_eq!(outcome.results[0].path, PathBuf::from(selected));

    let outcome = run(&specific(&["Packs/Hello/Scripts/GetIncidentData/GetIncidentData.yml"]));
    assert!(outcome.results.is_empty());

    let outcome = run(&specific(&[alert]));
    assert_eq!(codes(&outcome), vec!["GR106"]);
    assert_eq!(outcome.results[0].path, PathBuf::from(alert));
}

#[test]
fn latest_docker_tag_is_replaced() {
    let temp = content_repo();
    let descriptor = "Packs/Hello/Scripts/Hello/Hello.yml";
    write_file(
        temp.path(),
        descriptor,
        "commonfields:\n  id: Hello\nname: Hello\ntype: python\nsubtype: python3\ndockerimage: demisto/python3:latest\nscript: ''\n",
    );
    write_file(
        temp.path(),
        "Packs/Hello/Scripts/Legacy/Legacy.yml",
        "commonfields:\n  id: Legacy\nname: Legacy\ntype: javascript\ndockerimage: demisto/python3:latest\nscript: ''\n",
    );
    let root = root_of(&temp);
    let hub: Arc<dyn DockerHubClient> =
        Arc::new(StaticDockerHub::new().with_tags("demisto/python3", &["3.10.13.1", "3.11.1.5", "latest"]));
    let registry = ValidatorRegistry::with_defaults().expect("registry");
    let config = ValidateConfig {
        docker_checks: true,
        fix: true,
        ..config(&root, &["DO100"])
    };

    let outcome = run_validation(&config, &registry, Some(hub)).expect("run");
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].path, PathBuf::from(descriptor));
    assert_eq!(outcome.results[0].outcome, Outcome::Fixed);
    assert_eq!(
        outcome.results[0].message,
        "docker image demisto/python3 has been updated to demisto/python3:3.11.1.5"
    );
    let written = fs::read_to_string(root.join(descriptor)).expect("read");
    assert!(written.contains("demisto/python3:3.11.1.5"));
}

#[test]
fn unknown_pack_files_become_framework_errors() {
    let temp = content_repo();
    write_file(temp.path(), "Packs/Hello/Unknown/thing.yml", "a: 1\n");
    let root = root_of(&temp);
    let config = ValidateConfig {
        execution_mode: ExecutionMode::SpecificFiles,
        file_paths: vec![root.join("Packs/Hello/Unknown/thing.yml")],
        ..config(&root, &["BA113"])
    };

    let outcome = run(&config);
    assert_eq!(codes(&outcome), vec![FRAMEWORK_ERROR_CODE]);
    assert_eq!(outcome.results[0].path, PathBuf::from("Packs/Hello/Unknown/thing.yml"));
    assert_eq!(outcome.exit_code(), 1);
}

#[test]
fn unknown_codes_abort_the_run() {
    let temp = content_repo();
    let registry = ValidatorRegistry::with_defaults().expect("registry");
    let error = run_validation(&config(&root_of(&temp), &["ZZ999"]), &registry, None).expect_err("unknown code");
    assert!(matches!(error, ContentError::UnknownErrorCode(code) if code == "ZZ999"));
}

#[test]
fn warnings_do_not_fail_the_run() {
    let temp = content_repo();
    write_file(temp.path(), "Packs/Hello/Playbooks/playbook-Name.yml", "id: 'Name '\nname: 'Name '\n");
    let root = root_of(&temp);
    let config = ValidateConfig {
        warning: vec!["BA113".to_string()],
        ..config(&root, &["BA113"])
    };

    let outcome = run(&config);
    assert_eq!(codes(&outcome), vec!["BA113"]);
    assert!(outcome.is_valid());

    let rendered: serde_json::Value = serde_json::from_str(&render_json(&outcome).expect("json")).expect("parse");
    assert_eq!(rendered["valid"], serde_json::Value::Bool(true));
    assert_eq!(rendered["results"][0]["error code"], "BA113");
    assert_eq!(rendered["results"][0]["file path"], "Packs/Hello/Playbooks/playbook-Name.yml");
    assert_eq!(rendered["results"][0]["warning"], serde_json::Value::Bool(true));
}
