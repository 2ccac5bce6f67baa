// CLI integration tests for encode/decode and the set/get/list flow.
use std::io::Write;
use std::process::{Command, Stdio};

use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_tagwire");
    let mut command = Command::new(exe);
    command.env_remove("TAGWIRE_DIR").env_remove("TAGWIRE_LOG");
    command
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).expect("valid json")
}

fn parse_json_line(output: &[u8]) -> Value {
    let text = String::from_utf8_lossy(output);
    let line = text.lines().next().expect("json line");
    parse_json(line)
}

#[test]
fn encode_prints_wire_text() {
    let plain = cmd().args(["encode", "42"]).output().expect("encode");
    assert!(plain.status.success());
    assert_eq!(
        String::from_utf8_lossy(&plain.stdout).trim_end(),
        r#"{"__type__": "default", "__value__": 42}"#
    );

    let typed = cmd()
        .args(["encode", "2024-03-01", "--type", "date"])
        .output()
        .expect("encode");
    assert!(typed.status.success());
    assert_eq!(
        String::from_utf8_lossy(&typed.stdout).trim_end(),
        r#"{"__type__": "date", "__value__": "2024-03-01"}"#
    );

    let compact = cmd()
        .args(["--style", "compact", "encode", "[1, true]"])
        .output()
        .expect("encode");
    assert_eq!(String::from_utf8_lossy(&compact.stdout).trim_end(), "[1,true]");
}

#[test]
fn decode_reads_argument_and_stdin() {
    let arg = cmd()
        .args(["decode", r#"{"__type__": "timedelta", "__value__": 90.5}"#])
        .output()
        .expect("decode");
    assert!(arg.status.success());
    let described = parse_json_line(&arg.stdout);
    assert_eq!(described["type"], "timedelta");
    assert_eq!(described["value"], 90.5);

    let mut child = cmd()
        .arg("decode")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"\x80\x02}q\x00X\x01\x00\x00\x00aq\x01K\x01s.")
        .expect("write");
    let output = child.wait_with_output().expect("wait");
    assert!(output.status.success());
    let described = parse_json_line(&output.stdout);
    assert_eq!(described["type"], "map");
    assert_eq!(described["value"]["a"], 1);
}

#[test]
fn set_get_list_flow() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path().join("values");
    let dir = dir.to_str().unwrap();

    let set = cmd()
        .args(["--dir", dir, "set", "LAUNCH", "2024-03-01T09:30:00", "--type", "datetime"])
        .output()
        .expect("set");
    assert!(set.status.success(), "{}", String::from_utf8_lossy(&set.stderr));
    let set_json = parse_json_line(&set.stdout);
    assert_eq!(set_json["key"], "LAUNCH");
    assert_eq!(set_json["type"], "datetime");

    let stored = std::fs::read_to_string(temp.path().join("values").join("LAUNCH.value"))
        .expect("stored file");
    assert_eq!(
        stored,
        r#"{"__type__": "datetime", "__value__": "2024-03-01T09:30:00"}"#
    );

    let get = cmd()
        .args(["--dir", dir, "get", "LAUNCH"])
        .output()
        .expect("get");
    assert!(get.status.success());
    let get_json = parse_json_line(&get.stdout);
    assert_eq!(get_json["type"], "datetime");
    assert_eq!(get_json["value"], "2024-03-01T09:30:00");

    let list = cmd().args(["--dir", dir, "list"]).output().expect("list");
    assert!(list.status.success());
    assert_eq!(parse_json_line(&list.stdout)["keys"][0], "LAUNCH");
}

#[test]
fn markers_lists_builtins_in_order() {
    let markers = cmd().arg("markers").output().expect("markers");
    assert!(markers.status.success());
    let value = parse_json_line(&markers.stdout);
    assert_eq!(
        value["markers"],
        serde_json::json!(["datetime", "date", "time", "decimal", "uuid", "timedelta"])
    );
}

#[test]
fn not_found_exit_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path().join("values");

    let get = cmd()
        .args(["--dir", dir.to_str().unwrap(), "get", "ABSENT"])
        .output()
        .expect("get");
    assert_eq!(get.status.code().unwrap(), 3);
    let err = parse_json_line(&get.stderr);
    assert_eq!(err["error"]["kind"], "NotFound");
    assert_eq!(err["error"]["key"], "ABSENT");
}

#[test]
fn unknown_marker_exit_code() {
    let decode = cmd()
        .args(["decode", r#"{"__type__": "bogus", "__value__": 1}"#])
        .output()
        .expect("decode");
    assert_eq!(decode.status.code().unwrap(), 8);
    let err = parse_json_line(&decode.stderr);
    assert_eq!(err["error"]["kind"], "UnsupportedMarker");
    assert_eq!(err["error"]["marker"], "bogus");
}

#[test]
fn malformed_and_legacy_exit_codes() {
    let malformed = cmd()
        .args(["decode", r#"{"__type__": "#])
        .output()
        .expect("decode");
    assert_eq!(malformed.status.code().unwrap(), 10);

    let mut child = cmd()
        .arg("decode")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"\x80\x04garbage")
        .expect("write");
    let output = child.wait_with_output().expect("wait");
    assert_eq!(output.status.code().unwrap(), 11);
    let text = String::from_utf8_lossy(&output.stderr);
    let last = text.lines().last().expect("error line");
    assert_eq!(parse_json(last)["error"]["kind"], "LegacyDecode");
}

#[test]
fn usage_exit_code() {
    let set = cmd().args(["set", "ONLY_KEY"]).output().expect("set");
    assert_eq!(set.status.code().unwrap(), 2);

    let temp = tempfile::tempdir().expect("tempdir");
    let bad_key = cmd()
        .args(["--dir", temp.path().to_str().unwrap(), "set", ".hidden", "1"])
        .output()
        .expect("set");
    assert_eq!(bad_key.status.code().unwrap(), 2);
}

#[test]
fn type_value_rows_flag_unwraps_rows() {
    let row = r#"{"__type__": "Decimal", "value": "1.50"}"#;
    let plain = cmd().args(["decode", row]).output().expect("decode");
    assert!(plain.status.success());
    let described = parse_json_line(&plain.stdout);
    assert_eq!(described["type"], "map");
    assert_eq!(described["value"]["value"], "1.50");

    let unwrapped = cmd()
        .args(["--type-value-rows", "decode", row])
        .output()
        .expect("decode");
    assert!(unwrapped.status.success());
    let described = parse_json_line(&unwrapped.stdout);
    assert_eq!(described["type"], "string");
    assert_eq!(described["value"], "1.50");
}
