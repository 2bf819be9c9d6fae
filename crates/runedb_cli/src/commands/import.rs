//! Import command implementation.

use super::Target;
use runedb_codec::{from_json, Value};
use runedb_core::Database;
use std::fs;
use std::path::Path;
use tracing::info;

/// Runs the import command.
pub fn run(target: &Target, input: &Path, replace: bool) -> Result<(), Box<dyn std::error::Error>> {
    let document = from_json(&fs::read(input)?)?;
    let db = target.open(true)?;
    let stores = import(&db, document, replace)?;
    let version = db.flush()?;
    db.close()?;

    info!(
        input = %input.display(),
        stores,
        version,
        replace,
        "imported document"
    );
    Ok(())
}

/// Loads `document` into `db`. Returns the number of top-level stores
/// written.
///
/// Without `replace`, stores in `document` overwrite stores of the same
/// name and every other store is kept.
pub fn import(
    db: &Database,
    document: Value,
    replace: bool,
) -> Result<usize, Box<dyn std::error::Error>> {
    let Value::Map(incoming) = document else {
        return Err("imported document must be a JSON object".into());
    };
    let stores = incoming.len();

    if replace {
        db.set_data(Value::Map(incoming))?;
    } else {
        let mut root = match db.get_data()? {
            Value::Map(root) => root,
            _ => Default::default(),
        };
        root.extend(incoming);
        db.set_data(Value::Map(root))?;
    }
    Ok(stores)
}
