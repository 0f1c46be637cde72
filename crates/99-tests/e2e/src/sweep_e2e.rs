#![cfg(test)]

use std::path::{Path, PathBuf};

use device::{Direction, Memory};
use pattern::{Mode, PatternKind};
use results::ResultsRecorder;
use sim_device::SimDevice;
use sweep::{SweepConfig, SweepController};

fn base_config(results: &Path) -> SweepConfig {
    SweepConfig {
        bitfiles_path: PathBuf::from("bitfiles"),
        results_path: results.to_path_buf(),
        result_sep: ";".into(),
        headers: None,
        modes: vec![Mode::Bit32],
        directions: vec![Direction::Read, Direction::Write],
        memories: vec![Memory::BlockRam],
        depths: vec![1024],
        pattern_kinds: vec![PatternKind::Counter32],
        pattern_sizes: vec![1024],
        block_sizes: vec![16, 64, 256, 1024],
        iterations: 10,
        statistic_iter: 1,
    }
}

fn run_sweep(cfg: &SweepConfig) -> (SimDevice, Vec<String>) {
    let mut dev = SimDevice::new();
    let recorder = ResultsRecorder::new(&cfg.results_path, cfg.result_sep.clone());
    recorder.write_header().expect("header");
    SweepController::new(&mut dev, cfg, &recorder)
        .run()
        .expect("sweep");
    let lines = std::fs::read_to_string(&cfg.results_path)
        .expect("read results")
        .lines()
        .map(str::to_string)
        .collect();
    (dev, lines)
}

#[test]
fn single_write_case_produces_exactly_one_clean_row() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = base_config(&dir.path().join("results.csv"));
    cfg.directions = vec![Direction::Write];

    let (dev, lines) = run_sweep(&cfg);
    assert_eq!(lines.len(), 2, "header plus one data row");
    assert_eq!(
        dev.configured_bitstreams(),
        ["write_32bit_fifo_blockram_1024.bit"]
    );

    let fields: Vec<&str> = lines[1].split(';').collect();
    assert_eq!(fields[1], "32bit");
    assert_eq!(fields[2], "write");
    assert_eq!(fields[3], "blockram");
    assert_eq!(fields[4], "1024");
    assert_eq!(fields[5], "1024", "pattern size");
    assert_eq!(fields[6], "1024", "block size equals pattern size");
    assert_eq!(fields[7], "counter_32bit");
    assert_eq!(fields[8], "10");
    assert_eq!(fields[9], "1");
    // Write direction reads the error tally from the device wire; a clean
    // burst leaves it at zero.
    assert_eq!(fields[17], "0");

    let host_speed: f64 = fields[15].parse().expect("host speed");
    let device_speed: f64 = fields[16].parse().expect("device speed");
    assert!(host_speed.is_finite() && host_speed > 0.0);
    assert!(device_speed.is_finite() && device_speed > 0.0);
}

#[test]
fn mixed_sweep_covers_every_mode_without_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = base_config(&dir.path().join("results.csv"));
    cfg.modes = vec![Mode::Bit32, Mode::NonSym, Mode::Duplex];
    cfg.memories = vec![Memory::BlockRam, Memory::DistributedRam];
    cfg.depths = vec![16, 64];
    cfg.pattern_sizes = vec![64, 256];
    cfg.pattern_kinds = PatternKind::ALL.to_vec();
    cfg.iterations = 2;

    let (dev, lines) = run_sweep(&cfg);

    // 32bit: 2 directions x 2 memories x 2 depths x 2 sizes x 4 patterns.
    // nonsym: memory restricted to blockram -> 2 x 1 x 2 x 2 x 4.
    // duplex: bidir only, fixed depth; sizes 64 and 256 admit 2 and 3 block
    // sizes -> 2 memories x 5 x 4 patterns.
    let expected = 64 + 32 + 40;
    assert_eq!(lines.len(), expected + 1);

    for line in &lines[1..] {
        let fields: Vec<&str> = line.split(';').collect();
        assert_eq!(fields.len(), 18);
        assert_eq!(fields[17], "0", "unexpected errors in row: {line}");
    }

    // Depth 16 never reaches the device for nonsym write images.
    assert!(dev
        .configured_bitstreams()
        .iter()
        .all(|name| name != "write_nonsym_fifo_blockram_16.bit"));

    // Every duplex load uses the synthesized direction and fixed depth.
    for name in dev
        .configured_bitstreams()
        .iter()
        .filter(|name| name.contains("duplex"))
    {
        assert!(name.starts_with("bidir_duplex_fifo_"));
        assert!(name.ends_with(&format!("_{}.bit", sweep::DUPLEX_DEPTH)));
    }
}

#[test]
fn sweep_runs_from_a_configuration_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let results_dir = dir.path().join("out");
    std::fs::create_dir(&results_dir).expect("results dir");
    let config_path = dir.path().join("fifobench.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
bitfiles_path = "bitfiles"

[output]
results_path = {:?}
resultfile_name = "fifo.csv"
result_sep = ";"

[params]
mode = ["32bit"]
direction = ["read"]
memory = ["blockram"]
depth = [64]
pattern = ["counter_8bit", "asic"]
pattern_size = [256]
iterations = 3
statistic_iter = 2
"#,
            results_dir.display()
        ),
    )
    .expect("write config");

    let cfg = SweepConfig::load(&config_path).expect("load config");
    let (_dev, lines) = run_sweep(&cfg);
    // 2 patterns x 2 statistical iterations, plus header.
    assert_eq!(lines.len(), 5);
}
