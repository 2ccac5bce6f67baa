//! Purpose: Hold top-level CLI command dispatch for `tagwire`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Stored values are written and read only through `Settings`.
//! Invariants: Helpers in `main.rs` remain the source of output formatting.

use super::*;

pub(super) fn dispatch_command(
    command: Command,
    settings: &Settings<DirStore>,
) -> Result<RunOutcome, Error> {
    let codec = settings.codec();
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "tagwire", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::Encode { json, marker } => {
            let value = value_from_literal(codec, &json, marker.as_deref())?;
            println!("{}", codec.encode(&value)?);
            Ok(RunOutcome::ok())
        }
        Command::Decode { text } => {
            let bytes = match text {
                Some(text) => text.into_bytes(),
                None => read_stdin()?,
            };
            let value = codec.decode_bytes(&bytes)?;
            emit_json(describe(codec, &value)?);
            Ok(RunOutcome::ok())
        }
        Command::Set { key, json, marker } => {
            let value = value_from_literal(codec, &json, marker.as_deref())?;
            settings.set(&key, &value)?;
            tracing::info!(key = %key, "value stored");
            emit_json(keyed(&key, describe(codec, &value)?));
            Ok(RunOutcome::ok())
        }
        Command::Get { key } => {
            let value = settings.get(&key)?.ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message("no value stored for key")
                    .with_key(&key)
                    .with_path(settings.store().dir())
                    .with_hint("Use `tagwire list` to see stored keys.")
            })?;
            emit_json(keyed(&key, describe(codec, &value)?));
            Ok(RunOutcome::ok())
        }
        Command::List => {
            let keys = settings.keys()?;
            emit_json(json!({ "keys": keys }));
            Ok(RunOutcome::ok())
        }
        Command::Markers => {
            emit_json(json!({ "markers": codec.registry().markers() }));
            Ok(RunOutcome::ok())
        }
    }
}

fn keyed(key: &str, description: JsonValue) -> JsonValue {
    let mut map = Map::new();
    map.insert("key".to_string(), json!(key));
    if let JsonValue::Object(fields) = description {
        map.extend(fields);
    }
    JsonValue::Object(map)
}
