//! Tests for the command-line surface that need no network access

mod common;
use common::*;

#[test]
fn no_arguments() {
    repometrics_failure!().stderr(contains("Usage:"));
}

#[test]
fn help_lists_commands() {
    repometrics_success!("--help")
        .stdout(contains("collect"))
        .stdout(contains("serve"))
        .stdout(contains("report"))
        .stdout(contains("datastore"));
}

#[test]
fn version() {
    repometrics_success!("--version").stdout(is_match(r"^repometrics \S+"));
}

#[test]
fn datastore_init_creates_database() {
    let env = MetricsEnv::new();
    repometrics_success!("datastore", "init", "-d", env.datastore_path())
        .stdout(is_empty());
    env.datastore.assert(predicates::path::is_file());

    // initializing again is harmless
    repometrics_success!("datastore", "init", "-d", env.datastore_path());
}

#[test]
fn datastore_from_environment() {
    let env = MetricsEnv::new();
    repometrics!("datastore", "init")
        .env("REPOMETRICS_DATASTORE", env.datastore_path())
        .assert()
        .success();
    env.datastore.assert(predicates::path::is_file());
}

#[test]
fn report_empty_datastore_csv() {
    let env = MetricsEnv::new();
    repometrics_success!("report", "-d", env.datastore_path(), "-m", "prs", "-f", "csv")
        .stdout("author,prs,avg_merge_time,repo\n");
}

#[test]
fn report_empty_datastore_json() {
    let env = MetricsEnv::new();
    repometrics_success!("report", "-d", env.datastore_path(), "-m", "commits", "-f", "json")
        .stdout("[]\n");
}

#[test]
fn report_empty_datastore_human() {
    let env = MetricsEnv::new();
    repometrics_success!("report", "-d", env.datastore_path(), "-m", "releases")
        .stdout("No releases found\n");
}

#[test]
fn report_to_file() {
    let env = MetricsEnv::new();
    let output = env.root.child("releases.csv");
    repometrics_success!(
        "report",
        "-d",
        env.datastore_path(),
        "-m",
        "releases",
        "-f",
        "csv",
        "-o",
        output.path()
    )
    .stdout(is_empty());
    output.assert("repo,releases\n");
}

#[test]
fn report_rejects_bad_dates() {
    let env = MetricsEnv::new();
    repometrics_failure!(
        "report",
        "-d",
        env.datastore_path(),
        "-m",
        "commits",
        "--start-date",
        "2024-13-01"
    )
    .stderr(contains("invalid start_date"));
}

#[test]
fn report_rejects_unknown_metric() {
    let env = MetricsEnv::new();
    repometrics_failure!("report", "-d", env.datastore_path(), "-m", "issues")
        .stderr(contains("issues"));
}

#[test]
fn collect_missing_config() {
    let env = MetricsEnv::new();
    let config = env.root.child("nonexistent.json");
    repometrics_failure!("collect", "-d", env.datastore_path(), "-c", config.path())
        .stderr(contains("Failed to load configuration"));
}

#[test]
fn collect_config_without_repositories() {
    let env = MetricsEnv::new();
    let config = env.config_file("config.json", r#"{"github_token": "t", "repositories": []}"#);
    repometrics_failure!("collect", "-d", env.datastore_path(), "-c", config.path())
        .stderr(contains("no repositories are configured"));
}

#[test]
fn collect_requires_token() {
    let env = MetricsEnv::new();
    let config = env.config_file(
        "config.yaml",
        "repositories:\n  - owner: octo\n    repo: hello\n",
    );
    repometrics_failure!("collect", "-d", env.datastore_path(), "-c", config.path())
        .stderr(contains("No GitHub token"));
}
