use std::path::{Component, Path, PathBuf};

use super::errors::OrganizeError;

/// Maximum number of files cleaned up in a single operation.
/// A safety limit to prevent runaway deletion bugs.
pub const MAX_FILES_PER_OPERATION: usize = 100_000;

/// Check whether any segment of `path` (leaf or ancestor) is a protected name.
///
/// Only the part of `path` below `root` is inspected when `path` lives under
/// `root`, so a protected word in the watch root's own location never
/// blocks the whole folder.
pub fn is_protected(path: &Path, root: &Path, protected: &[String]) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|c| match c {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            protected.iter().any(|p| *p == name)
        }
        _ => false,
    })
}

/// Resolve `path` (following symlinks and `..`) and require it to lie
/// strictly inside `root`. Fails closed: anything that cannot be resolved
/// is treated as outside.
pub fn resolve_within_root(path: &Path, root: &Path) -> Result<PathBuf, OrganizeError> {
    let outside = || OrganizeError::OutsideRoot {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    };

    let root = root.canonicalize().map_err(|_| outside())?;
    let resolved = path.canonicalize().map_err(|_| outside())?;

    // Component-wise prefix check, so "/dl2/x" is not inside "/dl"
    if resolved != root && resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        Err(outside())
    }
}

/// Same as [`resolve_within_root`] for a path that may not exist yet:
/// the nearest existing ancestor is resolved and the rest re-appended.
pub fn resolve_target_within_root(path: &Path, root: &Path) -> Result<PathBuf, OrganizeError> {
    let outside = || OrganizeError::OutsideRoot {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    };

    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(outside());
    }

    let mut existing = path;
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Err(outside()),
        }
    }

    let root_resolved = root.canonicalize().map_err(|_| outside())?;
    let mut resolved = existing.canonicalize().map_err(|_| outside())?;
    for name in missing.iter().rev() {
        resolved.push(name);
    }

    if resolved != root_resolved && resolved.starts_with(&root_resolved) {
        Ok(resolved)
    } else {
        Err(outside())
    }
}

/// Validate a cleanup batch before execution
pub fn validate_clean_operation(file_count: usize) -> Result<(), String> {
    if file_count > MAX_FILES_PER_OPERATION {
        return Err(format!(
            "Operation would affect {} files (limit: {})",
            file_count, MAX_FILES_PER_OPERATION
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names() -> Vec<String> {
        vec![".minecraft".to_string(), "themes".to_string()]
    }

    #[test]
    fn test_leaf_and_ancestor_are_protected() {
        let root = Path::new("/dl");
        assert!(is_protected(Path::new("/dl/.minecraft/foo.exe"), root, &names()));
        assert!(is_protected(Path::new("/dl/themes"), root, &names()));
        assert!(is_protected(Path::new("/dl/a/themes/b/c.zip"), root, &names()));
    }

    #[test]
    fn test_plain_file_not_protected() {
        let root = Path::new("/dl");
        assert!(!is_protected(Path::new("/dl/report.pdf"), root, &names()));
        assert!(!is_protected(Path::new("/dl/my-themes.zip"), root, &names()));
    }

    #[test]
    fn test_root_location_is_ignored() {
        let root = Path::new("/home/themes/dl");
        assert!(!is_protected(Path::new("/home/themes/dl/x.pdf"), root, &names()));
    }

    #[test]
    fn test_resolve_inside_root() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(resolve_within_root(&file, dir.path()).is_ok());
    }

    #[test]
    fn test_resolve_rejects_parent_traversal() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("dl");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(dir.path().join("secret.txt"), "x").unwrap();
        let sneaky = root.join("..").join("secret.txt");
        assert!(resolve_within_root(&sneaky, &root).is_err());
    }

    #[test]
    fn test_resolve_rejects_sibling_prefix() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("dl");
        let sibling = dir.path().join("dl2");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&sibling).unwrap();
        std::fs::write(sibling.join("a.txt"), "x").unwrap();
        assert!(resolve_within_root(&sibling.join("a.txt"), &root).is_err());
    }

    #[test]
    fn test_resolve_rejects_root_itself() {
        let dir = TempDir::new().unwrap();
        assert!(resolve_within_root(dir.path(), dir.path()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rejects_symlink_escape() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("dl");
        std::fs::create_dir_all(&root).unwrap();
        let outside = dir.path().join("outside.pdf");
        std::fs::write(&outside, "x").unwrap();
        let link = root.join("link.pdf");
        std::os::unix::fs::symlink(&outside, &link).unwrap();
        assert!(resolve_within_root(&link, &root).is_err());
    }

    #[test]
    fn test_target_resolution_allows_missing_leaf() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("[DOC] 文档").join("PDF");
        let resolved = resolve_target_within_root(&target, dir.path()).unwrap();
        assert!(resolved.ends_with("[DOC] 文档/PDF"));
        assert!(resolve_target_within_root(&dir.path().join("../x"), dir.path()).is_err());
    }

    #[test]
    fn test_validate_clean_too_many_files() {
        assert!(validate_clean_operation(10).is_ok());
        assert!(validate_clean_operation(MAX_FILES_PER_OPERATION + 1).is_err());
    }
}
