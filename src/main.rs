//! Purpose: `tagwire` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: `encode` prints wire text verbatim; every other command prints JSON.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: All persisted values go through `api::Settings` (codec + store).
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value as JsonValue, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod value_json;

use tagwire::api::{
    Codec, CodecOptions, DirStore, Error, ErrorKind, LegacyPolicy, Registry, Settings, TYPE_FIELD,
    TextStyle, VALUE_FIELD, Value, parse_json, to_exit_code,
};
use value_json::describe;

const LOG_ENV: &str = "TAGWIRE_LOG";

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint(clap_error_hint(&err)),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing();

    let color_mode = cli.color;
    let store = cli.dir.map(DirStore::new).unwrap_or_default();
    let options = CodecOptions::new()
        .with_legacy(cli.legacy.into())
        .with_style(cli.style.into())
        .with_type_value_rows(cli.type_value_rows);
    let codec = Codec::new(Registry::global()).with_options(options);
    let settings = Settings::with_codec(store, codec);

    command_dispatch::dispatch_command(cli.command, &settings)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "tagwire",
    version,
    about = "Typed values stored as tagged JSON envelopes",
    long_about = None,
    after_help = r#"EXAMPLES
  $ tagwire encode '"2024-03-01"' --type date
  {"__type__": "date", "__value__": "2024-03-01"}
  $ tagwire set LAUNCH '"2024-03-01T09:30:00"' --type datetime
  $ tagwire get LAUNCH
  $ tagwire markers

LEARN MORE
  $ tagwire <command> --help"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        env = "TAGWIRE_DIR",
        help = "Value directory for set/get/list (default: ~/.tagwire/values)",
        value_hint = ValueHint::DirPath
    )]
    dir: Option<PathBuf>,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,
    #[arg(
        long,
        default_value = "strict",
        value_enum,
        help = "When non-JSON payloads are read as legacy pickles: strict|always|disabled"
    )]
    legacy: LegacyMode,
    #[arg(
        long,
        default_value = "python",
        value_enum,
        help = "Wire text separators: python (\", \" and \": \") or compact"
    )]
    style: StyleMode,
    #[arg(
        long,
        help = "Read top-level {\"__type__\": <python type>, \"value\": v} rows as v"
    )]
    type_value_rows: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LegacyMode {
    Strict,
    Always,
    Disabled,
}

impl From<LegacyMode> for LegacyPolicy {
    fn from(value: LegacyMode) -> Self {
        match value {
            LegacyMode::Strict => LegacyPolicy::Strict,
            LegacyMode::Always => LegacyPolicy::Always,
            LegacyMode::Disabled => LegacyPolicy::Disabled,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum StyleMode {
    Python,
    Compact,
}

impl From<StyleMode> for TextStyle {
    fn from(value: StyleMode) -> Self {
        match value {
            StyleMode::Python => TextStyle::Python,
            StyleMode::Compact => TextStyle::Compact,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Encode a JSON literal into wire text",
        after_help = r#"EXAMPLES
  $ tagwire encode 42
  $ tagwire encode '[1, "x"]'
  $ tagwire encode '"5e0b7c52-0d7b-4bb6-9b3c-0b2e2b6b7a11"' --type uuid

NOTES
  - Text that is not valid JSON is taken as a bare string.
  - With --type, the literal is read through that marker's decoder first."#
    )]
    Encode {
        #[arg(help = "JSON literal to encode")]
        json: String,
        #[arg(long = "type", help = "Registered marker to read the literal as")]
        marker: Option<String>,
    },
    #[command(
        about = "Decode wire text and describe the value",
        after_help = r#"EXAMPLES
  $ tagwire decode '{"__type__": "default", "__value__": 42}'
  $ tagwire decode < stored.value"#
    )]
    Decode {
        #[arg(help = "Wire text (reads stdin when omitted)")]
        text: Option<String>,
    },
    #[command(about = "Store a value under a key")]
    Set {
        #[arg(help = "Key to store under")]
        key: String,
        #[arg(help = "JSON literal to store")]
        json: String,
        #[arg(long = "type", help = "Registered marker to read the literal as")]
        marker: Option<String>,
    },
    #[command(about = "Read and describe the value stored under a key")]
    Get {
        #[arg(help = "Key to read")]
        key: String,
    },
    #[command(about = "List stored keys")]
    List,
    #[command(about = "List registered markers in lookup order")]
    Markers,
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    #[command(about = "Print version info")]
    Version,
}

/// Builds a value from CLI input, optionally through a registered marker.
fn value_from_literal(codec: &Codec, literal: &str, marker: Option<&str>) -> Result<Value, Error> {
    let json = match parse_json(literal) {
        Ok(json) => json,
        Err(err) if err.kind() == ErrorKind::Malformed => JsonValue::String(literal.to_string()),
        Err(err) => return Err(err),
    };
    let json = match marker {
        Some(marker) => {
            let mut map = Map::new();
            map.insert(TYPE_FIELD.to_string(), json!(marker));
            map.insert(VALUE_FIELD.to_string(), json);
            JsonValue::Object(map)
        }
        None => json,
    };
    codec.decode_json(json).map_err(|err| {
        if err.kind() == ErrorKind::UnsupportedMarker && err.hint().is_none() {
            err.with_hint("Run `tagwire markers` to see registered markers.")
        } else {
            err
        }
    })
}

fn read_stdin() -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::new();
    io::stdin().read_to_end(&mut bytes).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read stdin")
            .with_source(err)
    })?;
    Ok(bytes)
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("tagwire {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "tagwire",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

fn emit_json(value: JsonValue) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error",
        ErrorKind::Usage => "usage error",
        ErrorKind::NotFound => "not found",
        ErrorKind::Permission => "permission denied",
        ErrorKind::Io => "i/o error",
        ErrorKind::Registration => "type registration rejected",
        ErrorKind::Unserializable => "value is not serializable",
        ErrorKind::UnsupportedMarker => "unsupported type marker",
        ErrorKind::InvalidValue => "invalid value",
        ErrorKind::Malformed => "malformed payload",
        ErrorKind::LegacyDecode => "legacy payload could not be decoded",
    }
    .to_string()
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> JsonValue {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(marker) = err.marker() {
        inner.insert("marker".to_string(), json!(marker));
    }
    if let Some(type_name) = err.type_name() {
        inner.insert("type".to_string(), json!(type_name));
    }
    if let Some(key) = err.key() {
        inner.insert("key".to_string(), json!(key));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), JsonValue::Object(inner));
    JsonValue::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    let fields = [
        ("hint:", err.hint().map(str::to_string)),
        ("marker:", err.marker().map(str::to_string)),
        ("type:", err.type_name().map(str::to_string)),
        ("key:", err.key().map(str::to_string)),
        ("path:", err.path().map(|path| path.display().to_string())),
        ("caused by:", error_causes(err).into_iter().next()),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            lines.push(format!(
                "{} {value}",
                colorize_label(label, use_color, AnsiColor::Yellow)
            ));
        }
    }

    lines.join("\n")
}

fn add_io_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Io || err.hint().is_some() {
        return err;
    }
    err.with_hint("Check the value directory exists and is writable, or pass --dir.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint("Re-run with TAGWIRE_LOG=debug for more detail.")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `tagwire --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "tagwire") else {
        return "Try `tagwire --help`.".to_string();
    };

    let parts: Vec<&str> = tokens
        .iter()
        .skip(pos + 1)
        .take_while(|token| {
            !(token.starts_with('-') || token.starts_with('<') || token.starts_with('['))
        })
        .copied()
        .collect();

    if parts.is_empty() {
        return "Try `tagwire --help`.".to_string();
    }
    format!("Try `tagwire {} --help`.", parts.join(" "))
}
