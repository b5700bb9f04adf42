//! Construction locations and the bookkeeping that keeps them valid after edits.
//!
//! A [`ConstructionLocation`] says "this runtime object was created at file F,
//! line L". The locations themselves are owned by the caller (see
//! [`LocationTable`]); the engine only ever hands back a [`LineRemap`] describing
//! how lines moved in the file it just rewrote.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};

/// Where a runtime element's constructor ran.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstructionLocation {
    /// File name only, e.g. `signup.rs`
    pub file_name: String,
    /// Fully-qualified owning type, e.g. `app::views::signup::SignupView`
    pub type_name: String,
    /// 1-based line number
    pub line: usize,
}

impl ConstructionLocation {
    pub fn new(file_name: impl Into<String>, type_name: impl Into<String>, line: usize) -> Self {
        Self {
            file_name: file_name.into(),
            type_name: type_name.into(),
            line,
        }
    }

    /// Last segment of the owning type path (`SignupView`).
    pub fn simple_type_name(&self) -> &str {
        self.type_name.rsplit("::").next().unwrap_or(&self.type_name)
    }

    /// The same location shifted by `delta` lines. Lines never go below 1.
    pub fn refreshed(&self, delta: isize) -> Self {
        let line = (self.line as isize + delta).max(1) as usize;
        Self {
            line,
            ..self.clone()
        }
    }
}

/// Maps a construction location to the file that holds it.
pub struct SourceFile;

impl SourceFile {
    /// Resolve `location` under `root`.
    ///
    /// The first segment of the type path is the crate name and the last one is
    /// the type itself; what is left is the module path. A module `a::b` lives in
    /// `root/a/b.rs`, so the directory is every module segment but the last,
    /// unless the tracked file is a `mod.rs`, in which case the module owns its
    /// directory.
    pub fn resolve(root: &Path, location: &ConstructionLocation) -> PathBuf {
        let segments: Vec<&str> = location
            .type_name
            .split("::")
            .filter(|s| !s.is_empty())
            .collect();

        let modules: &[&str] = if segments.len() > 2 {
            &segments[1..segments.len() - 1]
        } else {
            &[]
        };

        let dirs = if location.file_name == "mod.rs" || modules.is_empty() {
            modules
        } else {
            &modules[..modules.len() - 1]
        };

        let mut path = root.to_path_buf();
        for dir in dirs {
            path.push(dir);
        }
        path.push(&location.file_name);
        path
    }
}

/// One step of a line remap: every old line `>= first_line` moves by `delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineShift {
    pub first_line: usize,
    pub delta: isize,
}

/// How the lines of one file moved because of one applied edit.
///
/// Steps are cumulative: a line below two insertions moves by both deltas.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineRemap {
    pub file: PathBuf,
    pub steps: Vec<LineShift>,
}

impl LineRemap {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            steps: Vec::new(),
        }
    }

    /// Shift everything at or below `first_line` by `delta`.
    pub fn single(file: impl Into<PathBuf>, first_line: usize, delta: isize) -> Self {
        let mut remap = Self::new(file);
        remap.push(first_line, delta);
        remap
    }

    pub fn push(&mut self, first_line: usize, delta: isize) {
        if delta != 0 {
            self.steps.push(LineShift { first_line, delta });
        }
    }

    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    /// New line number of old line `line`.
    pub fn map_line(&self, line: usize) -> usize {
        let delta: isize = self
            .steps
            .iter()
            .filter(|s| line >= s.first_line)
            .map(|s| s.delta)
            .sum();
        (line as isize + delta).max(1) as usize
    }

    /// Apply the remap to one location, assuming it lives in `self.file`.
    pub fn remap(&self, location: &ConstructionLocation) -> ConstructionLocation {
        let mapped = self.map_line(location.line);
        location.refreshed(mapped as isize - location.line as isize)
    }
}

/// Caller-owned store of construction locations, keyed by element.
#[derive(Debug, Clone)]
pub struct LocationTable<K> {
    entries: HashMap<K, ConstructionLocation>,
}

impl<K> Default for LocationTable<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> LocationTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: K, location: ConstructionLocation) -> Option<ConstructionLocation> {
        self.entries.insert(key, location)
    }

    pub fn get(&self, key: &K) -> Option<&ConstructionLocation> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<ConstructionLocation> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shift every location stored for `remap.file`. Returns how many moved.
    pub fn apply<F>(&mut self, remap: &LineRemap, resolve: F) -> usize
    where
        F: Fn(&ConstructionLocation) -> PathBuf,
    {
        if remap.is_identity() {
            return 0;
        }

        let mut moved = 0;
        for location in self.entries.values_mut() {
            if resolve(location) != remap.file {
                continue;
            }
            let updated = remap.remap(location);
            if updated.line != location.line {
                *location = updated;
                moved += 1;
            }
        }
        moved
    }

    /// Shift `location` and every other location of the same file at or below
    /// it by `delta`.
    pub fn refresh<F>(&mut self, location: &ConstructionLocation, delta: isize, resolve: F) -> usize
    where
        F: Fn(&ConstructionLocation) -> PathBuf,
    {
        let remap = LineRemap::single(resolve(location), location.line, delta);
        self.apply(&remap, resolve)
    }
}
