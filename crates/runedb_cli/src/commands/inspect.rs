//! Inspect command implementation.

use super::Target;
use runedb_core::{Database, STACK_KEY};
use serde::Serialize;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Snapshot file path.
    pub path: String,
    /// Snapshot file size in bytes.
    pub file_size: u64,
    /// Whether the snapshot is sealed.
    pub encrypted: bool,
    /// Number of committed flushes.
    pub version: u64,
    /// Depth of the default stack.
    pub stack_depth: usize,
    /// Number of indexed references.
    pub ref_count: usize,
    /// Per-store statistics.
    pub stores: Vec<StoreStats>,
}

/// Statistics for a single collection or map.
#[derive(Debug, Serialize)]
pub struct StoreStats {
    /// Store name.
    pub name: String,
    /// `collection` or `map`.
    pub kind: &'static str,
    /// Records or entries held.
    pub len: usize,
}

/// Runs the inspect command.
pub fn run(target: &Target, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = target.path()?;
    let db = target.open(false)?;
    let result = inspect(&db, &path)?;
    db.close()?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects statistics for an open database.
pub fn inspect(
    db: &Database,
    path: &std::path::Path,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let mut stores = Vec::new();
    for name in db.collection_names()? {
        let len = db.collection(&name)?.len()?;
        stores.push(StoreStats {
            name,
            kind: "collection",
            len,
        });
    }
    for name in db.map_names()? {
        let len = db.map(&name)?.len()?;
        stores.push(StoreStats {
            name,
            kind: "map",
            len,
        });
    }

    let stack_depth = db
        .get_data()?
        .get(STACK_KEY)
        .and_then(|stack| stack.as_array().map(Vec::len))
        .unwrap_or(0);

    Ok(InspectResult {
        path: path.display().to_string(),
        file_size: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        encrypted: db.is_encrypted(),
        version: db.version(),
        stack_depth,
        ref_count: db.ref_count()?,
        stores,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("RuneDB Database Inspection");
    println!("==========================");
    println!();
    println!("Path:      {}", result.path);
    println!("Size:      {}", format_size(result.file_size));
    println!("Encrypted: {}", if result.encrypted { "yes" } else { "no" });
    println!("Version:   {}", result.version);
    println!();
    println!("Stack depth: {}", result.stack_depth);
    println!("References:  {}", result.ref_count);

    if !result.stores.is_empty() {
        println!();
        println!("Stores:");
        for store in &result.stores {
            println!("  {:<24} {:<10} {}", store.name, store.kind, store.len);
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
