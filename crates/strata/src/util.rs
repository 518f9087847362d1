use std::path::{Component, Path, PathBuf};

/// `true` when `name` can be used as an hcl attribute name
pub(crate) fn is_identifier(name: &str) -> bool {
    hcl::Identifier::new(name).is_ok()
}

/// Resolves `.` and `..` without touching the filesystem
///
/// `..` at the start of a relative path is kept, `..` at the root of an absolute path is dropped.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }

    normalized
}

/// Resolves `include_path` against the directory of the file that includes it
pub(crate) fn resolve_include_path(including_file: &Path, include_path: &Path) -> PathBuf {
    if include_path.is_absolute() {
        return normalize_path(include_path);
    }

    let base = including_file.parent().unwrap_or_else(|| Path::new(""));
    normalize_path(&base.join(include_path))
}

/// Extracts the message of a caught panic
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
