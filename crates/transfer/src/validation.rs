use std::path::{Component, Path};

use crate::TransferError;

/// Longest file name accepted, in bytes.
const MAX_FILE_NAME_LEN: usize = 255;

/// Validates a declared file name before it is sent to the server.
///
/// The name must be a single plain path component. Rejects:
/// - Empty names and names longer than 255 bytes
/// - Control characters (including NUL)
/// - Path separators of either platform
/// - `.` and `..`
/// - Absolute paths and Windows prefixes (`C:`, `\\server`)
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.trim().is_empty() {
        return Err(TransferError::InvalidPath("empty file name".into()));
    }

    if name.len() > MAX_FILE_NAME_LEN {
        return Err(TransferError::InvalidPath(format!(
            "file name longer than {MAX_FILE_NAME_LEN} bytes"
        )));
    }

    if name.chars().any(char::is_control) {
        return Err(TransferError::InvalidPath(format!(
            "control character in file name: {name:?}"
        )));
    }

    if name.contains(['/', '\\']) {
        return Err(TransferError::InvalidPath(format!(
            "path separator not allowed: {name}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir | Component::CurDir), _) => Err(TransferError::InvalidPath(
            format!("directory reference not allowed: {name}"),
        )),
        _ => Err(TransferError::InvalidPath(format!(
            "not a plain file name: {name}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_name() {
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("   ").is_err());
    }

    #[test]
    fn rejects_parent_dir_traversal() {
        assert!(validate_file_name("../../../etc/passwd").is_err());
        assert!(validate_file_name("..").is_err());
    }

    #[test]
    fn rejects_current_dir() {
        assert!(validate_file_name(".").is_err());
    }

    #[test]
    fn rejects_absolute_unix_path() {
        assert!(validate_file_name("/tmp/malicious").is_err());
    }

    #[test]
    fn rejects_windows_separators() {
        assert!(validate_file_name("C:\\Windows\\evil.mp4").is_err());
        assert!(validate_file_name("sub\\clip.mp4").is_err());
    }

    #[test]
    fn rejects_subdirectory() {
        assert!(validate_file_name("sub/dir/clip.mp4").is_err());
    }

    #[test]
    fn rejects_control_characters() {
        assert!(validate_file_name("clip\0.mp4").is_err());
        assert!(validate_file_name("clip\n.mp4").is_err());
    }

    #[test]
    fn rejects_overlong_name() {
        let name = format!("{}.mp4", "a".repeat(300));
        assert!(validate_file_name(&name).is_err());
    }

    #[test]
    fn accepts_simple_filename() {
        assert!(validate_file_name("morning-flow.mp4").is_ok());
    }

    #[test]
    fn accepts_dotfile_and_spaces() {
        assert!(validate_file_name(".hidden.jpg").is_ok());
        assert!(validate_file_name("Beach day 2024.heic").is_ok());
    }

    #[test]
    fn accepts_double_dot_inside_name() {
        assert!(validate_file_name("cut..final.mov").is_ok());
    }
}
