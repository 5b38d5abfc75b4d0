use crate::StorageError;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Bytes copied to the destination.
    Copied(u64),
    /// Destination existed and the operator declined to overwrite it.
    Declined,
}

/// Copies a finished record to an operator-chosen destination.
///
/// `confirm_overwrite` is only consulted when `dest` already exists.
pub fn export_record(
    src: &Path,
    dest: &Path,
    confirm_overwrite: impl FnOnce(&Path) -> bool,
) -> Result<ExportOutcome, StorageError> {
    if !src.is_file() {
        return Err(StorageError::MissingRecord(src.to_path_buf()));
    }
    let export_err = |reason: String| StorageError::Export {
        from: src.to_path_buf(),
        to: dest.to_path_buf(),
        reason,
    };

    if dest.exists() {
        if dest.is_dir() {
            return Err(export_err("destination is a directory".to_string()));
        }
        let same_file = match (src.canonicalize(), dest.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if same_file {
            return Err(export_err(
                "source and destination are the same file".to_string(),
            ));
        }
        if !confirm_overwrite(dest) {
            log::info!("export to {} declined", dest.display());
            return Ok(ExportOutcome::Declined);
        }
    }

    let bytes = std::fs::copy(src, dest).map_err(|err| export_err(err.to_string()))?;
    log::info!(
        "exported {} ({} bytes) to {}",
        src.display(),
        bytes,
        dest.display()
    );
    Ok(ExportOutcome::Copied(bytes))
}
