mod common;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

use common::TestWorkspace;

fn bin() -> Command {
    Command::cargo_bin("csv-reconcile").expect("binary exists")
}

#[test]
fn join_reports_unmatched_left_keys() {
    let ws = TestWorkspace::new();
    let left = ws.write(
        "left.csv",
        "ta_code_str,ta_name\n001,Far North\n002,Whangarei\n003,Kaipara\n",
    );
    let right = ws.write(
        "right.csv",
        "ta_code_str,radiance_mean\n001,0.8\n003,1.2\n",
    );
    let output = ws.path().join("merged.csv");

    bin()
        .args([
            "join",
            "--left",
            left.to_str().unwrap(),
            "--right",
            right.to_str().unwrap(),
            "--left-key",
            "ta_code_str",
            "--right-key",
            "ta_code_str",
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stderr(contains("unmatched left key(s)").and(contains("'002'")));

    let merged = ws.read("merged.csv");
    assert!(merged.contains("\"001\",\"Far North\",\"0.8\""));
    assert!(merged.contains("\"002\",\"Whangarei\",\"\""));
    assert!(merged.contains("\"003\",\"Kaipara\",\"1.2\""));
}

#[test]
fn join_strict_fails_on_duplicate_right_keys() {
    let ws = TestWorkspace::new();
    let left = ws.write("left.csv", "k,name\na,x\n");
    let right = ws.write("right.csv", "k,v\na,1\na,2\n");

    bin()
        .args([
            "join",
            "--left",
            left.to_str().unwrap(),
            "--right",
            right.to_str().unwrap(),
            "--left-key",
            "k",
            "--right-key",
            "k",
        ])
        .assert()
        .failure()
        .stderr(contains("matches 2 right-side rows"));
}

#[test]
fn join_normalizes_code_keys_before_matching() {
    let ws = TestWorkspace::new();
    // Left codes are bare integers, right codes are float-formatted.
    let left = ws.write("left.csv", "ta_code,pop\n1,5000\n76,100000\n");
    let right = ws.write("right.csv", "ta_code,area\n1.0,120\n76.0,530\n");
    let output = ws.path().join("out.csv");

    bin()
        .args([
            "join",
            "--left",
            left.to_str().unwrap(),
            "--right",
            right.to_str().unwrap(),
            "--left-key",
            "ta_code",
            "--right-key",
            "ta_code",
            "--code-width",
            "3",
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();

    let merged = ws.read("out.csv");
    assert!(merged.contains("\"001\",\"5000\",\"120\""));
    assert!(merged.contains("\"076\",\"100000\",\"530\""));
}

#[test]
fn join_writes_unmatched_side_file() {
    let ws = TestWorkspace::new();
    let left = ws.write("left.csv", "k,v\na,1\nb,2\n");
    let right = ws.write("right.csv", "k,w\na,9\n");
    let output = ws.path().join("out.csv");
    let unmatched = ws.path().join("unmatched.csv");

    bin()
        .args([
            "join",
            "--left",
            left.to_str().unwrap(),
            "--right",
            right.to_str().unwrap(),
            "--left-key",
            "k",
            "--right-key",
            "k",
            "-o",
            output.to_str().unwrap(),
            "--unmatched",
            unmatched.to_str().unwrap(),
        ])
        .assert()
        .success();

    let side = ws.read("unmatched.csv");
    assert!(side.contains("\"k\""));
    assert!(side.contains("\"b\""));
    assert!(!side.contains("\"a\""));
}

#[test]
fn normalize_filters_and_canonicalizes() {
    let ws = TestWorkspace::new();
    let input = ws.write(
        "obesity.csv",
        "Health Service Area,indicator,sex,estimate\n\
         Midland (Te Manawa Taki),overw_obese,All,33.1\n\
         Midland (Te Manawa Taki),daily_smoker,All,12.0\n\
         Northern Region,overw_obese,All,30.2\n",
    );
    let output = ws.path().join("clean.csv");

    bin()
        .args([
            "normalize",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--name",
            "Health Service Area",
            "--aliases",
            "health-regions",
            "--filter",
            "indicator contains obese",
        ])
        .assert()
        .success();

    let clean = ws.read("clean.csv");
    assert!(clean.contains("\"Te Manawa Taki\",\"overw_obese\""));
    assert!(clean.contains("\"Taitokerau\",\"overw_obese\""));
    assert!(!clean.contains("daily_smoker"));
}

#[test]
fn normalize_lenient_excludes_bad_codes_with_report() {
    let ws = TestWorkspace::new();
    let input = ws.write("codes.csv", "ta_code,name\n1,A\nnope,B\n76,C\n");
    let output = ws.path().join("out.csv");

    bin()
        .args([
            "normalize",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--code",
            "ta_code",
            "--into",
            "ta_code_str",
        ])
        .assert()
        .success()
        .stderr(contains("uncoercible code").and(contains("'nope'")));

    let out = ws.read("out.csv");
    assert!(out.contains("\"ta_code\",\"name\",\"ta_code_str\""));
    assert!(out.contains("\"1\",\"A\",\"001\""));
    assert!(out.contains("\"76\",\"C\",\"076\""));
    assert!(!out.contains("nope"));
}

#[test]
fn normalize_strict_aborts_on_bad_code() {
    let ws = TestWorkspace::new();
    let input = ws.write("codes.csv", "ta_code\nnope\n");

    bin()
        .args([
            "normalize",
            "-i",
            input.to_str().unwrap(),
            "--code",
            "ta_code",
            "--mode",
            "strict",
        ])
        .assert()
        .failure()
        .stderr(contains("cannot be normalized to an integer code"));
}

#[test]
fn latest_keeps_most_recent_year_per_group() {
    let ws = TestWorkspace::new();
    let input = ws.write(
        "rates.csv",
        "health_region,ethnicity,year,rate\n\
         Taitokerau,Pacific,2018/19,0.31\n\
         Taitokerau,Pacific,2020/21,0.34\n\
         Te Ikaroa,Pacific,2020/21,0.29\n",
    );
    let output = ws.path().join("latest.csv");

    bin()
        .args([
            "latest",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "-g",
            "health_region,ethnicity",
            "-t",
            "year",
        ])
        .assert()
        .success();

    let latest = ws.read("latest.csv");
    assert!(latest.contains("\"Taitokerau\",\"Pacific\",\"2020/21\",\"0.34\""));
    assert!(!latest.contains("2018/19"));
}

#[test]
fn aggregate_means_per_group() {
    let ws = TestWorkspace::new();
    let input = ws.write(
        "brightness.csv",
        "health_region,radiance_mean\nTaitokerau,2.0\nTaitokerau,4.0\nTe Ikaroa,1.0\n",
    );
    let output = ws.path().join("agg.csv");

    bin()
        .args([
            "aggregate",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "-g",
            "health_region",
            "-v",
            "radiance_mean",
        ])
        .assert()
        .success();

    let agg = ws.read("agg.csv");
    assert!(agg.contains("\"Taitokerau\",\"3\""));
    assert!(agg.contains("\"Te Ikaroa\",\"1\""));
}

#[test]
fn roles_prints_resolution_table() {
    let ws = TestWorkspace::new();
    let input = ws.write(
        "extract.csv",
        "Health Service Area,Estimate,Year ending June\nNorthern,31.5,2021\n",
    );

    bin()
        .args(["roles", "-i", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(
            contains("region")
                .and(contains("Health Service Area"))
                .and(contains("Estimate")),
        );
}

#[test]
fn roles_require_fails_on_unresolvable_role() {
    let ws = TestWorkspace::new();
    let input = ws.write("extract.csv", "a,b\n1,2\n");

    bin()
        .args([
            "roles",
            "-i",
            input.to_str().unwrap(),
            "-r",
            "rate",
            "--require",
        ])
        .assert()
        .failure()
        .stderr(contains("no column found for role 'rate'"));
}

#[test]
fn roles_output_renames_resolved_columns() {
    let ws = TestWorkspace::new();
    let input = ws.write(
        "extract.csv",
        "Health Service Area,Estimate\nNorthern,31.5\n",
    );
    let output = ws.path().join("renamed.csv");

    bin()
        .args([
            "roles",
            "-i",
            input.to_str().unwrap(),
            "-r",
            "region",
            "-r",
            "rate",
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();

    let renamed = ws.read("renamed.csv");
    assert!(renamed.starts_with("\"region\",\"rate\""));
    assert!(renamed.contains("\"Northern\",\"31.5\""));
}

#[test]
fn geojson_properties_join_like_csv() {
    let ws = TestWorkspace::new();
    let left = ws.write("pop.csv", "ta_code_str,pop\n001,5000\n002,9000\n");
    let right = ws.write(
        "areas.geojson",
        r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"ta_code_str":"001","AREA_SQ_KM":102.5},"geometry":null},
            {"type":"Feature","properties":{"ta_code_str":"002","AREA_SQ_KM":88.0},"geometry":null}
        ]}"#,
    );
    let output = ws.path().join("out.csv");

    bin()
        .args([
            "join",
            "--left",
            left.to_str().unwrap(),
            "--right",
            right.to_str().unwrap(),
            "--left-key",
            "ta_code_str",
            "--right-key",
            "ta_code_str",
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();

    let merged = ws.read("out.csv");
    assert!(merged.contains("\"001\",\"5000\",\"102.5\""));
    assert!(merged.contains("\"002\",\"9000\",\"88.0\""));
}
