//! Nested path schema used to validate `self.`/`target.` accessors.

use std::collections::BTreeMap;

/// Tree of known property names. A node without children is a leaf, and
/// only leaf paths name a readable value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct NestedSchema {
    children: BTreeMap<String, NestedSchema>,
}

impl NestedSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schema from dotted leaf paths (`hp.current`, `abi.str`, ...).
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut schema = Self::new();
        for path in paths {
            schema.insert(path.as_ref());
        }
        schema
    }

    pub fn insert(&mut self, path: &str) {
        let mut node = self;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            node = node.children.entry(segment.to_string()).or_default();
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns true if `path` resolves to a leaf of this schema.
    pub fn contains(&self, path: &str) -> bool {
        let mut node = self;
        for segment in path.split('.') {
            match node.children.get(segment) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.is_leaf()
    }

    /// Leaf paths in lexical order.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect("", &mut out);
        out
    }

    fn collect(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, child) in &self.children {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };
            if child.is_leaf() {
                out.push(path);
            } else {
                child.collect(&path, out);
            }
        }
    }
}
