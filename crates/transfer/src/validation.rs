use std::path::{Component, Path};

use crate::TransferError;

/// Rejects files larger than `max` bytes.
pub fn validate_file_size(size: u64, max: u64) -> Result<(), TransferError> {
    if size > max {
        return Err(TransferError::FileTooLarge { size, max });
    }
    Ok(())
}

/// Normalizes a remote directory path.
///
/// Remote paths are `/`-rooted. An empty path means the root. Backslashes
/// are treated as separators, `.` and empty segments are dropped, and parent
/// directory traversal (`..`) is rejected.
pub fn normalize_remote_path(remote_path: &str) -> Result<String, TransferError> {
    let unified = remote_path.replace('\\', "/");
    let mut segments = Vec::new();

    for component in Path::new(&unified).components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::InvalidPath(format!(
                    "parent directory traversal not allowed: {remote_path}"
                )));
            }
            Component::Prefix(_) => {
                return Err(TransferError::InvalidPath(format!(
                    "path prefix not allowed: {remote_path}"
                )));
            }
            Component::Normal(seg) => match seg.to_str() {
                Some(s) => segments.push(s),
                None => {
                    return Err(TransferError::InvalidPath(format!(
                        "non UTF-8 segment in: {remote_path}"
                    )));
                }
            },
            Component::RootDir | Component::CurDir => {}
        }
    }

    Ok(format!("/{}", segments.join("/")))
}
