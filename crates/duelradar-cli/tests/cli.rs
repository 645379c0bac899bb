// Integration tests for the duelradar binary, run against the sample data
// shipped in the workspace's data/ directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Create a base directory whose config points at the sample datasets.
fn base_dir(name: &str) -> PathBuf {
    let base = std::env::temp_dir().join(name);
    let _ = fs::remove_dir_all(&base);
    fs::create_dir_all(base.join("config")).unwrap();
    let data = workspace_root().join("data");
    let text = format!(
        r#"
[datasets.players]
path = {:?}
identifier = "Player"
filter_attributes = ["Pos", "Comp"]

[datasets.teams]
path = {:?}
identifier = "Squad"
filter_attributes = ["Comp"]
"#,
        data.join("players.csv").display().to_string(),
        data.join("teams.csv").display().to_string()
    );
    fs::write(base.join("config/duelradar.toml"), text).unwrap();
    base
}

fn run(base: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_duelradar"))
        .arg("--config")
        .arg(base)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run duelradar")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn compare_midfielders_as_json() {
    let base = base_dir("duelradar_cli_json");
    let output = run(
        &base,
        &[
            "compare",
            "Pedri",
            "Jude Bellingham",
            "-m",
            "Gls",
            "-m",
            "Ast",
            "-m",
            "xG",
            "-f",
            "Pos=MF",
            "--json",
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let metrics = &value["comparison"]["metrics"];
    assert_eq!(value["comparison"]["population_size"], 4);
    assert_eq!(metrics[0]["metric"], "Gls");
    assert_eq!(metrics[0]["percentile_a"], 75);
    assert_eq!(metrics[0]["percentile_b"], 100);
    assert_eq!(metrics[0]["delta"], -1.0);
    assert_eq!(metrics[1]["percentile_a"], 75);
    assert_eq!(metrics[1]["percentile_b"], 25);
    assert_eq!(value["cyclic"]["metrics"].as_array().unwrap().len(), 4);

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn compare_prints_table() {
    let base = base_dir("duelradar_cli_table");
    let output = run(&base, &["compare", "Erling Haaland", "Kylian Mbappé", "-f", "Pos=FW"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.starts_with("Erling Haaland vs Kylian Mbappé"));
    // Default selection: the first six eligible metrics.
    let rows: Vec<&str> = text.lines().skip(4).take_while(|l| !l.is_empty()).collect();
    assert_eq!(rows.len(), 6);
    assert!(rows[0].starts_with("Gls"));
    assert!(rows[5].starts_with("PrgC"));

    // Exact figures follow the ranked table.
    let raw: Vec<&str> = text.lines().skip(4 + rows.len() + 1).collect();
    assert!(raw[0].starts_with("Metric"));
    assert!(raw[0].contains("Erling Haaland"));
    assert!(raw[1].starts_with("Gls"));
    assert!(raw[1].contains("15") && raw[1].contains("13"));
    assert!(!text.contains("note:"));

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn two_metrics_fail() {
    let base = base_dir("duelradar_cli_two_metrics");
    let output = run(&base, &["compare", "Pedri", "Declan Rice", "-m", "Gls", "-m", "Ast"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("at least 3 metrics are required, got 2"));

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn unknown_entity_fails() {
    let base = base_dir("duelradar_cli_unknown_entity");
    let output = run(&base, &["compare", "Pedri", "Nobody", "-m", "Gls", "-m", "Ast", "-m", "xG"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no record with Player = 'Nobody'"));

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn duplicate_players_reported() {
    let base = base_dir("duelradar_cli_duplicates");
    let output = run(&base, &["duplicates"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "Danilo (2 records)\n");

    let output = run(&base, &["compare", "Danilo", "Alessandro Bastoni", "-m", "Gls", "-m", "Tkl", "-m", "Int"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("note: Danilo matched several records"));

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn metrics_for_teams_exclude_denylist() {
    let base = base_dir("duelradar_cli_team_metrics");
    let output = run(&base, &["metrics", "--dataset", "teams"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let metrics: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    assert_eq!(
        metrics,
        vec!["Poss", "Gls", "Ast", "xG", "npxG", "xAG", "PrgC", "PrgP"]
    );

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn entities_and_rivals() {
    let base = base_dir("duelradar_cli_entities");
    let output = run(&base, &["entities", "-f", "Comp=Premier League"]);
    assert_eq!(
        stdout(&output),
        "Declan Rice\nErling Haaland\nBukayo Saka\n"
    );

    let output = run(&base, &["entities", "-f", "Pos=DF", "-f", "Comp=Serie A", "--rival-of", "Danilo"]);
    assert_eq!(stdout(&output), "Alessandro Bastoni\n");

    // A lone candidate leaves nobody to compare against.
    let output = run(&base, &["entities", "-f", "Squad=Manchester City", "--rival-of", "Erling Haaland"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no other entity"));

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn filters_listed() {
    let base = base_dir("duelradar_cli_filters");
    let output = run(&base, &["filters"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "Pos: FW, MF, DF (default: FW)\nComp: La Liga, Premier League, Serie A (default: La Liga)\n"
    );

    let _ = fs::remove_dir_all(&base);
}
