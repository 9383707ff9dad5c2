use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::tempdir;

fn arcs_sim(db: &Path, args: &[&str]) -> Value {
    let output = Command::new(env!("CARGO_BIN_EXE_arcs-sim"))
        .arg("--db")
        .arg(db)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("run arcs-sim");
    assert!(
        output.status.success(),
        "arcs-sim {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let body = String::from_utf8(output.stdout).expect("utf8");
    if args.first() == Some(&"import") {
        return Value::String(body);
    }
    serde_json::from_str(&body).expect("json")
}

#[test]
fn import_cluster_analyze_group() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("class.sqlite");
    let csv = dir.path().join("responses.csv");
    let mut body = String::from("student_id,attention,relevance,confidence,satisfaction\n");
    for (idx, base) in [1.2, 1.4, 1.3, 1.1, 3.0, 3.2, 2.9, 3.1, 4.6, 4.8, 4.7, 4.9]
        .iter()
        .enumerate()
    {
        body.push_str(&format!("s{idx:02},{base},{base},{base},{base}\n"));
    }
    fs::write(&csv, body).unwrap();

    let imported = arcs_sim(&db, &["import", "--csv", csv.to_str().unwrap()]);
    assert!(imported.as_str().unwrap().contains("imported 12 students"));

    let clustered = arcs_sim(&db, &["cluster"]);
    assert_eq!(clustered["total"], 12);

    let analysis = arcs_sim(&db, &["analyze"]);
    assert_eq!(analysis["metrics"]["analyzed"], 12);
    assert!(analysis["recommendation"]["mode"].is_string());

    let out = dir.path().join("reports").join("groups.json");
    let status = Command::new(env!("CARGO_BIN_EXE_arcs-sim"))
        .arg("--db")
        .arg(&db)
        .args(["group", "--priority", "balanced", "--seed", "11", "--out"])
        .arg(&out)
        .env("RUST_LOG", "warn")
        .status()
        .expect("run arcs-sim group");
    assert!(status.success());
    let grouped: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    let groups = grouped["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 3);
    let members: usize = groups.iter().map(|g| g.as_array().unwrap().len()).sum();
    assert_eq!(members, 12);
    assert_eq!(grouped["seed"], 11);
}

#[test]
fn grouping_without_coverage_fails() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("empty.sqlite");
    let status = Command::new(env!("CARGO_BIN_EXE_arcs-sim"))
        .arg("--db")
        .arg(&db)
        .arg("group")
        .env("RUST_LOG", "off")
        .status()
        .expect("run arcs-sim group");
    assert!(!status.success());
}
