//! Overwrite checks for exported files.
//!
//! The matrix export writes next to catalog files, so the output path is
//! validated before anything is created or truncated.

use anyhow::{bail, Result};
use std::path::Path;

/// File name fragments of catalog sources that must never be written over
const SOURCE_PATTERNS: [&str; 3] = ["clean_data", "catalog", "tracks"];

/// Extensions an export is never allowed to take
const SOURCE_EXTENSIONS: [&str; 4] = ["csv", "sqlite", "sqlite3", "db"];

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output filename must contain the required pattern (e.g., "normalized")
/// - Output cannot be the same as any of the provided source paths
/// - Output cannot carry a catalog extension or look like a catalog source
pub fn validate_output_path(
    output: &Path,
    required_pattern: &str,
    source_paths: &[&Path],
) -> Result<()> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if !output_name.contains(required_pattern) {
        bail!(
            "Safety check failed: output file '{}' must contain '{}' in the name",
            output.display(),
            required_pattern
        );
    }

    for source in source_paths {
        if output == *source {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    if let Some(ext) = ext.as_deref() {
        if SOURCE_EXTENSIONS.contains(&ext) {
            bail!(
                "Safety check failed: output '{}' has catalog extension '.{}'",
                output.display(),
                ext
            );
        }
    }

    for pattern in SOURCE_PATTERNS {
        if output_name.starts_with(pattern) {
            bail!(
                "Safety check failed: output '{}' matches catalog source pattern '{}'",
                output.display(),
                pattern
            );
        }
    }

    Ok(())
}
