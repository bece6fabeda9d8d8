use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::assemble::{Assembly, BuildReport};
use crate::error::GhostDataError;
use crate::model::SiteData;

/// Version of the output document layout.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
pub struct SnapshotFile<'a> {
    pub schema_version: u32,
    pub generated_at: String,
    #[serde(flatten)]
    pub data: &'a SiteData,
    pub report: &'a BuildReport,
}

pub fn materialize_snapshot(assembly: &Assembly) -> SnapshotFile<'_> {
    SnapshotFile {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        generated_at: Utc::now().to_rfc3339(),
        data: &assembly.data,
        report: &assembly.report,
    }
}

/// Write the snapshot as pretty JSON, replacing `path` only once the file is complete.
pub fn write_snapshot(path: &Path, snapshot: &SnapshotFile<'_>) -> Result<(), GhostDataError> {
    let serialized = serde_json::to_string_pretty(snapshot)?;
    let temp_path = build_temp_path(path);
    fs::write(&temp_path, format!("{serialized}\n"))?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn build_temp_path(path: &Path) -> PathBuf {
    let mut temp_path = path.to_path_buf();
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => {
            temp_path.set_extension(format!("{ext}.tmp"));
        }
        _ => {
            temp_path.set_extension("tmp");
        }
    }
    temp_path
}
