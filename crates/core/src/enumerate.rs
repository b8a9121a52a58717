use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Names must contain a dot to be reported, directories included.
pub const NAME_PATTERN: &str = "*.*";

/// Lazily yields the paths under a lookup root whose names match [`NAME_PATTERN`].
///
/// Construction never fails: a root that cannot be resolved or a pattern that cannot be
/// compiled is logged and produces an empty sequence.
#[derive(Debug)]
pub struct PathEnumerator {
    root: Option<PathBuf>,
    recursive: bool,
    matcher: Option<GlobMatcher>,
}

impl PathEnumerator {
    pub fn new(lookup_path: Option<&Path>, recursive: bool) -> Self {
        let root = match resolve_lookup_root(lookup_path) {
            Ok(root) => Some(root),
            Err(err) => {
                warn!("failed to resolve lookup path: {err:#}");
                None
            }
        };
        let matcher = match name_matcher() {
            Ok(matcher) => Some(matcher),
            Err(err) => {
                warn!("failed to compile name pattern {NAME_PATTERN}: {err:#}");
                None
            }
        };
        Self {
            root,
            recursive,
            matcher,
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}

impl IntoIterator for PathEnumerator {
    type Item = PathBuf;
    type IntoIter = Paths;

    fn into_iter(self) -> Self::IntoIter {
        let walker = match (&self.root, &self.matcher) {
            (Some(root), Some(_)) => {
                let mut walker = WalkDir::new(root).min_depth(1).follow_links(false);
                if !self.recursive {
                    walker = walker.max_depth(1);
                }
                Some(walker.into_iter())
            }
            _ => None,
        };
        Paths {
            walker,
            matcher: self.matcher,
        }
    }
}

/// Single-pass iterator over matching paths, in directory-listing order.
pub struct Paths {
    walker: Option<walkdir::IntoIter>,
    matcher: Option<GlobMatcher>,
}

impl Iterator for Paths {
    type Item = PathBuf;

    fn next(&mut self) -> Option<Self::Item> {
        let walker = self.walker.as_mut()?;
        let matcher = self.matcher.as_ref()?;
        for item in walker.by_ref() {
            let entry = match item {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("walk error: {err}");
                    continue;
                }
            };
            if matcher.is_match(entry.file_name()) {
                return Some(entry.into_path());
            }
        }
        None
    }
}

/// Picks the directory to scan: the requested path when it exists, the working directory
/// otherwise.
pub fn resolve_lookup_root(requested: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = requested {
        if path.exists() {
            return std::path::absolute(path)
                .with_context(|| format!("failed to make {} absolute", path.display()));
        }
        debug!(
            "lookup path {} does not exist; using the working directory",
            path.display()
        );
    }
    env::current_dir().context("failed to read the current working directory")
}

fn name_matcher() -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(NAME_PATTERN)
        .literal_separator(true)
        .build()
        .context("invalid name pattern")?;
    Ok(glob.compile_matcher())
}
