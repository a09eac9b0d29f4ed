
use fixtures::*;

use assert_cmd::prelude::*;
use flate2::Compression;
use flate2::write::GzEncoder;
use predicates::prelude::*;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn sample_stream() -> Vec<u8> {
    vec![0xEC, 0xCF, 0x01, 0x04, 0x7F, 0x00, 0x00, 0x01]
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn write_sample(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, data).unwrap();
    path
}

fn fortilog_dump() -> Command {
    Command::new(assert_cmd::cargo_bin!("fortilog_dump"))
}

#[test]
fn it_decodes_a_raw_stream_to_stdout() {
    let d = tempdir().unwrap();
    let sample = write_sample(d.path(), "elog.log", &sample_stream());

    let mut cmd = fortilog_dump();
    cmd.args(["--log-file", "-", sample.to_str().unwrap()]);

    cmd.assert()
        .success()
        .stdout("src_ip=\"127.0.0.1\"\n");
}

#[test]
fn it_decodes_gzip_containers() {
    let d = tempdir().unwrap();
    let data = traffic_record(StreamBuilder::aa01(), 1).build();
    let sample = write_sample(d.path(), "tlog.log.gz", &gzip(&data));

    let mut cmd = fortilog_dump();
    cmd.args(["--log-file", "-", sample.to_str().unwrap()]);

    cmd.assert().success().stdout(
        "src_ip=\"192.168.1.2\" dst_ip=\"8.8.8.8\" src_port=40001 dst_port=443 \
         proto=6 action=\"accept\" event_time=1707918605\n",
    );
}

#[test]
fn it_supports_stdin_input_with_dash() {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo_bin!("fortilog_dump"));
    cmd.args(["--log-file", "-", "-"]).write_stdin(gzip(&sample_stream()));

    cmd.assert()
        .success()
        .stdout("src_ip=\"127.0.0.1\"\n");
}

#[test]
fn it_renders_json_lines_and_rfc3339() {
    let d = tempdir().unwrap();
    let data = StreamBuilder::eccf()
        .chunk(0x01, &[10, 0, 0, 1])
        .chunk(0x09, &1_707_918_604_u32.to_be_bytes())
        .terminator()
        .build();
    let sample = write_sample(d.path(), "elog.log", &data);

    let mut cmd = fortilog_dump();
    cmd.args([
        "--log-file",
        "-",
        "-o",
        "jsonl",
        "--timestamps",
        "rfc3339",
        sample.to_str().unwrap(),
    ]);

    cmd.assert()
        .success()
        .stdout("{\"src_ip\":\"10.0.0.1\",\"event_time\":\"2024-02-14T13:50:04Z\"}\n");
}

#[test]
fn it_exits_with_failure_on_unknown_magic() {
    let d = tempdir().unwrap();
    let sample = write_sample(d.path(), "not_a_log.zip", &[0x50, 0x4B, 0x03, 0x04]);

    let mut cmd = fortilog_dump();
    cmd.args(["--log-file", "-", sample.to_str().unwrap()]);

    cmd.assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Unknown log header magic `504B`"));
}

#[test]
fn it_logs_fatal_header_errors_to_the_log_file() {
    let d = tempdir().unwrap();
    let log_file = d.path().join("fortilog_decoder.log");
    let sample = write_sample(d.path(), "bad.log", &[0x50, 0x4B, 0x03, 0x04]);

    let mut cmd = fortilog_dump();
    cmd.args([
        "--log-file",
        log_file.to_str().unwrap(),
        sample.to_str().unwrap(),
    ]);

    cmd.assert().failure().code(1);

    let log = fs::read_to_string(&log_file).unwrap();
    assert!(log.contains("Failed to decode file"), "log was {}", log);
    assert!(log.contains("Unknown log header magic `504B`"), "log was {}", log);
}

#[test]
fn it_keeps_the_output_file_when_the_header_is_invalid() {
    let d = tempdir().unwrap();
    let fresh = d.path().join("fresh.out");
    let existing = d.path().join("existing.out");
    fs::write(&existing, b"previous run").unwrap();
    let sample = write_sample(d.path(), "bad.log", &[0x50, 0x4B, 0x03, 0x04]);

    for target in [&fresh, &existing] {
        let mut cmd = fortilog_dump();
        cmd.args([
            "--log-file",
            "-",
            "-f",
            &target.to_string_lossy(),
            "--no-confirm-overwrite",
            sample.to_str().unwrap(),
        ]);
        cmd.assert().failure().code(1);
    }

    assert!(!fresh.exists());
    assert_eq!(fs::read(&existing).unwrap(), b"previous run");
}

#[test]
fn it_writes_diagnostics_to_the_log_file() {
    let d = tempdir().unwrap();
    let log_file = d.path().join("fortilog_decoder.log");
    let data = StreamBuilder::eccf()
        .chunk_with_len(0x01, 3, &[0x7F, 0x00, 0x00])
        .chunk(0x01, &[0x7F, 0x00, 0x00, 0x01])
        .terminator()
        .build();
    let sample = write_sample(d.path(), "elog.log", &data);

    let mut cmd = fortilog_dump();
    cmd.args([
        "--log-file",
        log_file.to_str().unwrap(),
        sample.to_str().unwrap(),
    ]);

    cmd.assert()
        .success()
        .stdout("src_ip=\"127.0.0.1\"\n");

    let log = fs::read_to_string(&log_file).unwrap();
    assert!(log.contains("Offset 2: LengthMismatch"), "log was {}", log);
}

#[test]
fn it_prints_the_report() {
    let d = tempdir().unwrap();
    let sample = write_sample(d.path(), "elog.log", &sample_stream());

    let mut cmd = fortilog_dump();
    cmd.args(["--log-file", "-", "--report", sample.to_str().unwrap()]);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("\"records_decoded\":1"));
}

#[test]
fn it_respects_file_output() {
    let d = tempdir().unwrap();
    let f = d.as_ref().join("out").join("test.out");
    let sample = write_sample(d.path(), "elog.log", &sample_stream());

    let mut cmd = fortilog_dump();
    cmd.args([
        "--log-file",
        "-",
        "-f",
        &f.to_string_lossy(),
        sample.to_str().unwrap(),
    ]);

    assert!(
        cmd.output().unwrap().stdout.is_empty(),
        "Expected output to be printed to file, but was printed to stdout"
    );

    let mut expected = String::new();
    File::open(&f)
        .unwrap()
        .read_to_string(&mut expected)
        .unwrap();
    assert_eq!(expected, "src_ip=\"127.0.0.1\"\n");
}

#[test]
fn test_it_refuses_to_overwrite_directory() {
    let d = tempdir().unwrap();
    let sample = write_sample(d.path(), "elog.log", &sample_stream());

    let mut cmd = fortilog_dump();
    cmd.args([
        "--log-file",
        "-",
        "-f",
        &d.path().to_string_lossy(),
        sample.to_str().unwrap(),
    ]);

    cmd.assert().failure().code(1);
}

#[test]
fn test_it_overwrites_file_anyways_if_passed_flag() {
    let d = tempdir().unwrap();
    let f = d.as_ref().join("test.out");
    fs::write(&f, b"I'm a file!").unwrap();
    let sample = write_sample(d.path(), "elog.log", &sample_stream());

    let mut cmd = fortilog_dump();
    cmd.args([
        "--log-file",
        "-",
        "-f",
        &f.to_string_lossy(),
        "--no-confirm-overwrite",
        sample.to_str().unwrap(),
    ]);

    cmd.assert().success();
    assert_eq!(fs::read_to_string(&f).unwrap(), "src_ip=\"127.0.0.1\"\n");
}

#[test]
fn it_decodes_a_directory_in_batch_mode() {
    let source = tempdir().unwrap();
    let target = tempdir().unwrap();

    write_sample(source.path(), "tlog.1.log.gz", &gzip(&sample_stream()));
    write_sample(
        source.path(),
        "tlog.2.log.gz",
        &gzip(&traffic_record(StreamBuilder::eccf(), 3).build()),
    );
    write_sample(source.path(), "notes.txt", b"not a log");
    write_sample(source.path(), "tlog.3.log.gz", &gzip(b"PK\x03\x04"));

    let mut cmd = fortilog_dump();
    cmd.args([
        "--pattern",
        "*.log.gz",
        "--gzip",
        "-t",
        "2",
        source.path().to_str().unwrap(),
        target.path().to_str().unwrap(),
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("tlog.1.log.gz 1 logs"))
        .stdout(predicate::str::contains("tlog.2.log.gz 1 logs"));

    let mut outputs: Vec<String> = fs::read_dir(target.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    outputs.sort();
    assert_eq!(outputs, vec!["tlog.1.log.gz.csv.gz", "tlog.2.log.gz.csv.gz"]);

    let mut decoded = String::new();
    flate2::read::GzDecoder::new(File::open(target.path().join("tlog.1.log.gz.csv.gz")).unwrap())
        .read_to_string(&mut decoded)
        .unwrap();
    assert_eq!(decoded, "src_ip=\"127.0.0.1\"\n");

    // A second run leaves existing outputs alone.
    fs::write(target.path().join("tlog.1.log.gz.csv.gz"), b"kept").unwrap();
    let mut cmd = fortilog_dump();
    cmd.args([
        "--pattern",
        "*.log.gz",
        "--gzip",
        source.path().to_str().unwrap(),
        target.path().to_str().unwrap(),
    ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("output already exists"));
    assert_eq!(
        fs::read(target.path().join("tlog.1.log.gz.csv.gz")).unwrap(),
        b"kept"
    );
}
