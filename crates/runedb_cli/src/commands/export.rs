//! Export command implementation.

use super::Target;
use runedb_codec::{to_json, Value};
use runedb_core::{Database, REF_FIELD};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Runs the export command.
pub fn run(
    target: &Target,
    output: Option<&Path>,
    evaluate: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = target.open(false)?;
    let json = export(&db, evaluate)?;
    db.close()?;

    match output {
        Some(path) => {
            fs::write(path, &json)?;
            info!(path = %path.display(), bytes = json.len(), "exported database");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&json)?;
            stdout.write_all(b"\n")?;
        }
    }

    Ok(())
}

/// Renders the root document as pretty JSON.
///
/// With `evaluate`, every `{"$ref": id}` marker is replaced by the value it
/// points to, or `null` once that value is gone.
pub fn export(db: &Database, evaluate: bool) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut root = db.get_data()?;
    if evaluate {
        inline_refs(db, &mut root)?;
    }
    Ok(to_json(&root, true)?)
}

fn inline_refs(db: &Database, value: &mut Value) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(ref_id) = marker_id(value) {
        *value = db.find_ref(&ref_id)?.unwrap_or(Value::Null);
        return Ok(());
    }
    match value {
        Value::Array(items) => items.iter_mut().try_for_each(|v| inline_refs(db, v)),
        Value::Map(fields) => fields.values_mut().try_for_each(|v| inline_refs(db, v)),
        _ => Ok(()),
    }
}

fn marker_id(value: &Value) -> Option<String> {
    let fields = value.as_map()?;
    if fields.len() != 1 {
        return None;
    }
    fields.get(REF_FIELD)?.as_text().map(str::to_string)
}
