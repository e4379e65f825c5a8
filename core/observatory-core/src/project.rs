//! Short human-readable project names for session directories.
//!
//! Resolution order:
//!
//! ```text
//! 1. `org/repo` from the `origin` remote of the enclosing repository
//! 2. `org/repo` from any other remote
//! 3. last two components of the repository root
//! 4. last two components of the path itself
//! 5. `?`
//! ```
//!
//! Both lookups are memoized per resolver. Callers clear the caches at the
//! start of every pass so a long-running watch loop notices new clones.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::path_utils::last_two_components;

/// Upper bound on directories visited while looking for `.git`.
pub const MAX_REPO_HOPS: usize = 20;

const UNKNOWN_PROJECT: &str = "?";
const PREFERRED_REMOTE: &str = "origin";

static SCP_REMOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@]+@[^:]+:(.+/.+?)(?:\.git)?$").expect("valid scp-style remote regex")
});
static URL_REMOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?|ssh)://[^/]+/(.+/.+?)(?:\.git)?$").expect("valid url remote regex")
});
static REMOTE_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\[remote "(.+)"\]"#).expect("valid remote section regex"));

/// Read access to repository metadata.
pub trait RepoReader {
    /// Whether `dir` contains a `.git` entry (directory or file).
    fn has_git_marker(&self, dir: &Path) -> bool;

    /// Text of the git config belonging to the repository rooted at `root`.
    fn read_git_config(&self, root: &Path) -> Option<String>;
}

/// Reads repository metadata from the local filesystem.
///
/// A `.git` file (linked worktree or submodule) is followed through its
/// `gitdir:` pointer, and through `commondir` when present, to the config
/// shared with the main checkout.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsRepoReader;

impl RepoReader for FsRepoReader {
    fn has_git_marker(&self, dir: &Path) -> bool {
        dir.join(".git").exists()
    }

    fn read_git_config(&self, root: &Path) -> Option<String> {
        let git_entry = root.join(".git");
        let config_dir = if git_entry.is_dir() {
            git_entry
        } else {
            let git_dir = parse_gitdir(&git_entry, root)?;
            parse_commondir(&git_dir).unwrap_or(git_dir)
        };

        match fs_err::read_to_string(config_dir.join("config")) {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::debug!(root = %root.display(), error = %err, "Unreadable git config");
                None
            }
        }
    }
}

fn parse_gitdir(git_file: &Path, worktree_root: &Path) -> Option<PathBuf> {
    let contents = fs_err::read_to_string(git_file).ok()?;
    let line = contents
        .lines()
        .find(|line| line.to_ascii_lowercase().starts_with("gitdir:"))?;
    let raw = line.get("gitdir:".len()..)?.trim();
    if raw.is_empty() {
        return None;
    }
    Some(resolve_git_path(worktree_root, raw))
}

fn parse_commondir(git_dir: &Path) -> Option<PathBuf> {
    let contents = fs_err::read_to_string(git_dir.join("commondir")).ok()?;
    let raw = contents.trim();
    if raw.is_empty() {
        return None;
    }
    Some(resolve_git_path(git_dir, raw))
}

fn resolve_git_path(base: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Extracts `org/repo` from a remote URL.
///
/// Accepts `user@host:org/repo[.git]` and `(http|https|ssh)://host/org/repo[.git]`.
pub fn parse_org_repo(url: &str) -> Option<String> {
    SCP_REMOTE
        .captures(url)
        .or_else(|| URL_REMOTE.captures(url))
        .and_then(|captures| captures.get(1))
        .map(|org_repo| org_repo.as_str().to_string())
}

/// Remote name → url pairs from git config text, in first-seen order.
pub fn parse_remotes(config: &str) -> Vec<(String, String)> {
    let mut remotes: Vec<(String, String)> = Vec::new();
    let mut current: Option<String> = None;

    for line in config.lines() {
        let line = line.trim();
        if let Some(captures) = REMOTE_SECTION.captures(line) {
            current = captures.get(1).map(|name| name.as_str().to_string());
            continue;
        }
        if line.starts_with('[') {
            current = None;
            continue;
        }
        let Some(name) = current.as_ref() else {
            continue;
        };
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim() != "url" {
            continue;
        }
        let url = value.trim().to_string();
        match remotes.iter_mut().find(|(existing, _)| existing == name) {
            Some(entry) => entry.1 = url,
            None => remotes.push((name.clone(), url)),
        }
    }
    remotes
}

/// `org/repo` from `origin` if it parses, else from the first other remote
/// that does.
fn org_repo_from_config(config: &str) -> Option<String> {
    let remotes = parse_remotes(config);
    let origin = remotes
        .iter()
        .filter(|(name, _)| name == PREFERRED_REMOTE);
    let others = remotes
        .iter()
        .filter(|(name, _)| name != PREFERRED_REMOTE);
    origin
        .chain(others)
        .find_map(|(_, url)| parse_org_repo(url))
}

pub struct ProjectNameResolver<R: RepoReader = FsRepoReader> {
    reader: R,
    git_roots: HashMap<PathBuf, Option<PathBuf>>,
    remote_names: HashMap<PathBuf, Option<String>>,
}

impl ProjectNameResolver<FsRepoReader> {
    pub fn new() -> Self {
        Self::with_reader(FsRepoReader)
    }
}

impl Default for ProjectNameResolver<FsRepoReader> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RepoReader> ProjectNameResolver<R> {
    pub fn with_reader(reader: R) -> Self {
        Self {
            reader,
            git_roots: HashMap::new(),
            remote_names: HashMap::new(),
        }
    }

    /// Drops both caches.
    pub fn clear(&mut self) {
        self.git_roots.clear();
        self.remote_names.clear();
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn project_name(&mut self, path: &str) -> String {
        if path.is_empty() {
            return UNKNOWN_PROJECT.to_string();
        }

        let path = Path::new(path);
        let git_root = self.find_git_root(path);
        if let Some(root) = git_root.as_deref() {
            if let Some(name) = self.remote_name(root) {
                return name;
            }
        }

        git_root
            .as_deref()
            .and_then(last_two_components)
            .or_else(|| last_two_components(path))
            .unwrap_or_else(|| UNKNOWN_PROJECT.to_string())
    }

    /// Nearest directory at or above `path` holding a `.git` marker.
    ///
    /// Every directory visited on the way is cached with the final answer,
    /// so sibling paths in the same tree resolve without touching the disk.
    pub fn find_git_root(&mut self, path: &Path) -> Option<PathBuf> {
        let mut walked: Vec<PathBuf> = Vec::new();
        let mut current = Some(path);
        let mut result = None;

        for _ in 0..MAX_REPO_HOPS {
            let Some(dir) = current else {
                break;
            };
            if let Some(cached) = self.git_roots.get(dir) {
                result = cached.clone();
                break;
            }
            walked.push(dir.to_path_buf());
            if self.reader.has_git_marker(dir) {
                result = Some(dir.to_path_buf());
                break;
            }
            current = dir.parent();
        }

        for dir in walked {
            self.git_roots.insert(dir, result.clone());
        }
        result
    }

    fn remote_name(&mut self, root: &Path) -> Option<String> {
        if let Some(cached) = self.remote_names.get(root) {
            return cached.clone();
        }
        let name = self
            .reader
            .read_git_config(root)
            .and_then(|config| org_repo_from_config(&config));
        self.remote_names.insert(root.to_path_buf(), name.clone());
        name
    }
}
