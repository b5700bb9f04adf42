/// Import index for deciding whether a generated reference needs a `use`.
///
/// The index records every name the file's top-level `use` items bring into
/// scope, so the planner can tell whether `Main` or `page_title` already
/// refers to the configured path:
/// - `use ui::html::Main;` makes `Main` resolve
/// - `use ui::html::{Div, Main};` makes `Main` resolve
/// - `use ui::html::Main as Landmark;` makes `Landmark` resolve, not `Main`
/// - `use ui::html::*;` makes any `ui::html::X` resolve
use std::collections::HashMap;
use syn::{File, Item, UseTree};

#[derive(Debug, Clone, Default)]
pub struct ImportIndex {
    /// Local name -> canonical path segments
    local_names: HashMap<String, Vec<String>>,
    /// Prefixes of glob imports (`use a::b::*;` -> ["a", "b"])
    globs: Vec<Vec<String>>,
}

impl ImportIndex {
    /// Scan the top-level `use` items of `file`.
    pub fn scan(file: &File) -> Self {
        let mut index = Self::default();
        for item in &file.items {
            if let Item::Use(item_use) = item {
                index.process_use_tree(&item_use.tree, Vec::new());
            }
        }
        index
    }

    fn process_use_tree(&mut self, tree: &UseTree, prefix: Vec<String>) {
        match tree {
            UseTree::Path(path) => {
                let mut next = prefix;
                next.push(path.ident.to_string());
                self.process_use_tree(&path.tree, next);
            }
            UseTree::Name(name) => {
                let local = name.ident.to_string();
                // `use a::b::{self}` names the module `b`
                if local == "self" {
                    if let Some(last) = prefix.last() {
                        self.local_names.insert(last.clone(), prefix.clone());
                    }
                    return;
                }
                let mut full_path = prefix;
                full_path.push(local.clone());
                self.local_names.insert(local, full_path);
            }
            UseTree::Rename(rename) => {
                let mut full_path = prefix;
                full_path.push(rename.ident.to_string());
                self.local_names.insert(rename.rename.to_string(), full_path);
            }
            UseTree::Glob(_) => {
                self.globs.push(prefix);
            }
            UseTree::Group(group) => {
                for tree in &group.items {
                    self.process_use_tree(tree, prefix.clone());
                }
            }
        }
    }

    /// Does the bare name of `canonical` (its last segment) already resolve to
    /// `canonical` in this file?
    pub fn imports(&self, canonical: &str) -> bool {
        let target = split_path(canonical);
        let Some(simple) = target.last() else {
            return false;
        };

        if self.local_names.get(simple) == Some(&target) {
            return true;
        }

        let prefix = &target[..target.len() - 1];
        self.globs.iter().any(|glob| glob.as_slice() == prefix)
    }

    /// Does `segments` (a path as written in the source) refer to `canonical`?
    pub fn resolves_to(&self, segments: &[String], canonical: &str) -> bool {
        let target = split_path(canonical);
        if segments.is_empty() {
            return false;
        }
        if segments == target.as_slice() {
            return true;
        }

        // expand the first segment through a local name, if it is one
        if let Some(expanded) = self.local_names.get(&segments[0]) {
            let mut full = expanded.clone();
            full.extend_from_slice(&segments[1..]);
            if full == target {
                return true;
            }
        }

        segments.len() == 1 && self.imports(canonical) && target.last() == segments.last()
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split("::")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
