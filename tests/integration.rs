use std::{
    collections::HashMap,
    env, fs,
    path::PathBuf,
    process::{Command, Output},
};

fn run_bin(args: &[&str]) -> Output {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_amav"));

    Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command")
}

fn run_bin_ok(args: &[&str]) {
    let output = run_bin(args);

    let stdout_str =
        std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
    let stderr_str =
        std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

    assert!(
        output.status.success(),
        "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
    );
}

fn create_test_dir(name: &str) -> PathBuf {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir_all(test_dir.join("data")).expect("failed to create test directory");

    test_dir
}

#[test]
fn basic_workflow() {
    let test_dir = create_test_dir("basic_workflow");

    let config_contents = String::new()
        + "[aggregation]\n"
        + "mode = \"prev\"\n"
        + "include_negative = true\n"
        + "epsilon = 1e-12\n"
        + "\n"
        + "[selection]\n"
        + "min_points_linear = 2\n"
        + "min_points_exp = 3\n"
        + "min_points_cv = 5\n"
        + "aic_margin = 4.0\n"
        + "rmse_ratio = 0.98\n";
    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    let table_contents = String::new()
        + "Phenotype,Citation,2000,2001,2002,2003,2004,2005,2006,2007,2008,2009,2010\n"
        + "Asthma,Smith 2011,1.0,,,,,2.0,,,,,\"4,5\"\n"
        + "Asthma,Roe 2009,,,1.5,,,,,,3.0,,\n"
        + "Obesity,Doe 2012,1.0,,1.2,,1.8,,3.0,,5.5,,10.0\n"
        + "Measles,Poe 2011,5.0,,,2.0,,,3.0,,,,6.0\n"
        + "Gout,Lee 2002,100%,200%,,,,,,,,,\n";
    fs::write(
        test_dir.join("data").join("Supplemental_Table_1.csv"),
        table_contents,
    )
    .expect("failed to write study table");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");
    let output_dir = test_dir.join("output");

    run_bin_ok(&["--work-dir", test_dir_str, "build"]);

    let amav = fs::read_to_string(output_dir.join("amav.csv")).expect("failed to read AMAV table");
    let mut lines = amav.lines();
    assert_eq!(lines.next(), Some("Year,Asthma,Gout,Measles,Obesity"));
    assert_eq!(lines.count(), 11);
    for file in ["fold_yearly.csv", "fold_relative.csv"] {
        assert!(output_dir.join(file).is_file(), "missing {file}");
    }
    let trends_log =
        fs::read_to_string(output_dir.join("trends_log.csv")).expect("failed to read trends log");
    assert!(trends_log.lines().any(|line| line == "Asthma,2"));

    run_bin_ok(&["--work-dir", test_dir_str, "select"]);

    let choices = fs::read_to_string(output_dir.join("model_choice.csv"))
        .expect("failed to read model choices");
    let mut lines = choices.lines();
    assert_eq!(
        lines.next(),
        Some(
            "Disease,model,n_all,n_pos,AIC_linear,AIC_exponential,\
             BIC_linear,BIC_exponential,RMSEcv_linear,RMSEcv_exponential"
        )
    );
    let models: HashMap<&str, &str> = lines
        .map(|line| {
            let mut fields = line.split(',');
            let name = fields.next().expect("missing disease");
            let model = fields.next().expect("missing model");
            (name, model)
        })
        .collect();
    assert_eq!(models.len(), 4);
    assert_eq!(models["Asthma"], "LINEAR");
    assert_eq!(models["Gout"], "INSUFFICIENT_DATA");
    assert_eq!(models["Measles"], "LINEAR");
    assert_eq!(models["Obesity"], "EXPONENTIAL");

    run_bin_ok(&["--work-dir", test_dir_str, "summarize"]);

    let summary_dir = output_dir.join("summaries");
    let measles =
        fs::read_to_string(summary_dir.join("Measles.csv")).expect("failed to read summary");
    assert_eq!(
        measles.lines().next(),
        Some("Year,DataPoints,MAV,AMAV,AMAV-POS,LinearFit,PValue")
    );
    assert_eq!(measles.lines().count(), 5);
    assert!(summary_dir.join("Obesity.csv").is_file());
    assert!(!summary_dir.join("Gout.csv").exists());

    run_bin_ok(&["--work-dir", test_dir_str, "clean"]);
    assert!(!output_dir.exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn malformed_table_aborts() {
    let test_dir = create_test_dir("malformed_table_aborts");

    fs::write(
        test_dir.join("data").join("Supplementary_Table_1.csv"),
        "Disease,2000,2001\nAsthma,1.0,2.0\n",
    )
    .expect("failed to write study table");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    let output = run_bin(&["--work-dir", test_dir_str, "build"]);
    assert!(!output.status.success());
    assert!(!test_dir.join("output").join("amav.csv").exists());

    let output = run_bin(&["--work-dir", test_dir_str, "select"]);
    assert!(!output.status.success());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn colliding_summary_names_abort() {
    let test_dir = create_test_dir("colliding_summary_names_abort");

    fs::write(
        test_dir.join("data").join("Supplementary_Table_1.csv"),
        "Phenotype,2000,2001,2002
A B,1.0,2.0,4.0
A/B,3.0,2.0,1.0
",
    )
    .expect("failed to write study table");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    let output = run_bin(&["--work-dir", test_dir_str, "summarize"]);
    assert!(!output.status.success());

    let stderr_str =
        std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");
    assert!(stderr_str.contains("A_B.csv"), "stderr:\n{stderr_str}");

    fs::remove_dir_all(&test_dir).ok();
}
