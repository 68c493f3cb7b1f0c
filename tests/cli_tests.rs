//! Command-line tests for the `kmer-classify` binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn setup(dir: &std::path::Path) {
    fs::write(dir.join("sample.tsv"), "AAAAA\t5\nAAAAC\t2\nTTTTG\t9\nTTTTT\t1\n").unwrap();
    fs::write(dir.join("x.tsv"), "AAAAA\t3\nAAAAC\t1\n").unwrap();
    fs::write(dir.join("y.tsv"), "TTTTG\t2\n").unwrap();
    fs::write(
        dir.join("viruses_5"),
        "Virus X\t10\tspecies\tx.tsv\nVirus Y\t20\tspecies\ty.tsv\n",
    )
    .unwrap();
}

#[test]
fn classify_writes_results_and_matches() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    setup(dir);

    Command::cargo_bin("kmer-classify")
        .unwrap()
        .current_dir(dir)
        .args([
            "classify",
            "--sample",
            "sample.tsv",
            "--database",
            "viruses_5",
            "--prefix-len",
            "2",
            "--entropy",
            "0",
            "--work-dir",
            "work",
            "--output",
            "results.txt",
            "--matches",
            "matches.tsv",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Organisms found: 2"))
        .stdout(predicate::str::contains("Virus Y\t20\tspecies\t1\t9"));

    assert_eq!(
        fs::read_to_string(dir.join("results.txt")).unwrap(),
        "Virus Y: 20: 1: 2: 1: 9: species\nVirus X: 10: 2: 4: 2: 7: species\n"
    );
    assert_eq!(
        fs::read_to_string(dir.join("matches.tsv")).unwrap(),
        "AAAAA\t5\t10:3\nAAAAC\t2\t10:1\nTTTTG\t9\t20:2\n"
    );
}

#[test]
fn classify_json_output() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    setup(dir);

    Command::cargo_bin("kmer-classify")
        .unwrap()
        .current_dir(dir)
        .args([
            "--format", "json", "classify", "--sample", "sample.tsv", "--database", "viruses_5",
            "--prefix-len", "2", "--entropy", "0", "--work-dir", "work",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_matched_count\": 9"));
}

#[test]
fn missing_database_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    setup(dir);

    Command::cargo_bin("kmer-classify")
        .unwrap()
        .current_dir(dir)
        .args(["classify", "--sample", "sample.tsv", "--library", "absent", "--k", "5", "--db-dir", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("database source not found"));
}

#[test]
fn report_reads_saved_results() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("results.txt");
    fs::write(&path, "Virus Y: 20: 1: 2: 1: 9: species\n").unwrap();

    Command::cargo_bin("kmer-classify")
        .unwrap()
        .args(["report", path.to_str().unwrap(), "--good-distinct", "3", "--good-total", "18"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Virus Y\t20\tspecies\t1\t9\t33.3333\t50.0000"));
}
