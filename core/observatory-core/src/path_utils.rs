//! Path helpers for comparing hook working directories with process cwds.
//!
//! Comparison is purely lexical and goes through `Path::components()`, so
//! repeated separators, inner `.` segments and trailing slashes are ignored
//! the same way by equality and containment. Both sides come from the kernel
//! or from the hook payload as absolute paths, so no symlink resolution is
//! attempted.

use std::path::Path;

/// Whether two paths name the same directory.
pub fn same_path(left: &str, right: &str) -> bool {
    if left.is_empty() || right.is_empty() {
        return false;
    }
    Path::new(left).components().eq(Path::new(right).components())
}

/// Whether `child` lies strictly inside `ancestor`.
///
/// Containment is decided component by component, so `/home/u/proj-2` is not
/// inside `/home/u/proj`.
pub fn is_descendant(child: &str, ancestor: &str) -> bool {
    if child.is_empty() || ancestor.is_empty() {
        return false;
    }
    Path::new(child)
        .strip_prefix(Path::new(ancestor))
        .is_ok_and(|rest| rest.components().next().is_some())
}

/// The last two normal components of `path`, joined with `/`.
///
/// Returns the single component for one-level paths and `None` when the path
/// has no normal components at all (empty, or just `/`).
pub fn last_two_components(path: &Path) -> Option<String> {
    let names: Vec<_> = path
        .components()
        .filter_map(|component| match component {
            std::path::Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .collect();

    match names.as_slice() {
        [] => None,
        [only] => Some(only.to_string()),
        [.., parent, last] => Some(format!("{}/{}", parent, last)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_ignores_trailing_slash() {
        assert!(same_path("/home/u/proj", "/home/u/proj/"));
        assert!(!same_path("/home/u/proj", "/home/u/proj2"));
        assert!(!same_path("", "/"));
    }

    #[test]
    fn equality_and_containment_normalize_alike() {
        assert!(same_path("/p/.", "/p"));
        assert!(same_path("/p//x", "/p/x"));
        assert!(same_path("/p/./x/", "/p/x"));
        assert!(!same_path("/p/..", "/"));
        assert!(!same_path("", ""));

        assert!(is_descendant("/p//x", "/p/."));
        assert!(is_descendant("/p/./x", "/p//"));
        assert!(!is_descendant("/p/.", "/p"));
    }

    #[test]
    fn descendant_matches_nested_paths() {
        assert!(is_descendant("/home/u/proj/src", "/home/u/proj"));
        assert!(is_descendant("/home/u/proj/src/deep", "/home/u/proj/"));
        assert!(is_descendant("/home/u/proj", "/"));
    }

    #[test]
    fn descendant_rejects_sibling_with_shared_prefix() {
        assert!(!is_descendant("/home/u/proj2", "/home/u/proj"));
        assert!(!is_descendant("/home/u/proj-2/src", "/home/u/proj"));
    }

    #[test]
    fn descendant_rejects_self_parent_and_empty() {
        assert!(!is_descendant("/home/u/proj", "/home/u/proj"));
        assert!(!is_descendant("/home/u/proj/", "/home/u/proj"));
        assert!(!is_descendant("/home/u", "/home/u/proj"));
        assert!(!is_descendant("", "/home/u"));
        assert!(!is_descendant("/home/u", ""));
    }

    #[test]
    fn last_two_components_of_paths() {
        assert_eq!(
            last_two_components(Path::new("/home/u/Code/observatory")).as_deref(),
            Some("Code/observatory")
        );
        assert_eq!(last_two_components(Path::new("/proj")).as_deref(), Some("proj"));
        assert_eq!(last_two_components(Path::new("/")), None);
        assert_eq!(last_two_components(Path::new("")), None);
    }
}
