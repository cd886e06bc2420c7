//! Session-scoped cache of the remote directory tree.
//!
//! Directories live in an arena and refer to each other by [`DirId`]; parents
//! are stored as ids, never as references. Each directory owns two lazily
//! built maps, subdirectories and files, keyed by name under the session's
//! case sensitivity. The maps are filled from a `LIST` of that directory and
//! dropped again with [`DirectoryTree::clear_items`].

use crate::core_directory::listing::ListingItem;
use crate::core_directory::path;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DirId(usize);

#[derive(Debug, Clone)]
pub struct Directory {
    name: String,
    full_path: String,
    size: u64,
    permission: String,
    timestamp: Option<NaiveDateTime>,
    parent: Option<DirId>,
    items: Option<DirectoryItems>,
}

impl Directory {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute path, always ending in `/`.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn permission(&self) -> &str {
        &self.permission
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamp
    }

    /// Parent if already known; see [`DirectoryTree::resolve_parent`].
    pub fn parent(&self) -> Option<DirId> {
        self.parent
    }

    pub fn is_loaded(&self) -> bool {
        self.items.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    name: String,
    full_path: String,
    size: u64,
    permission: String,
    timestamp: Option<NaiveDateTime>,
    parent: DirId,
}

impl RemoteFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn permission(&self) -> &str {
        &self.permission
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamp
    }

    pub fn parent(&self) -> DirId {
        self.parent
    }
}

#[derive(Debug, Clone, Default)]
struct DirectoryItems {
    subdirectories: BTreeMap<String, DirId>,
    files: BTreeMap<String, RemoteFile>,
}

#[derive(Debug)]
pub struct DirectoryTree {
    nodes: Vec<Directory>,
    by_path: HashMap<String, DirId>,
    case_sensitive: bool,
}

impl DirectoryTree {
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            nodes: Vec::new(),
            by_path: HashMap::new(),
            case_sensitive,
        }
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn key(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    /// Name equality under the session's case sensitivity.
    pub fn names_equal(&self, a: &str, b: &str) -> bool {
        self.key(a) == self.key(b)
    }

    /// Whether `full_path` is `ancestor` itself or lies below it.
    pub fn is_within(&self, ancestor: DirId, full_path: &str) -> bool {
        let Some(ancestor) = self.get(ancestor) else {
            return false;
        };
        self.key(&path::as_directory(full_path))
            .starts_with(&self.key(ancestor.full_path()))
    }

    pub fn get(&self, id: DirId) -> Option<&Directory> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn lookup(&self, full_path: &str) -> Option<DirId> {
        self.by_path
            .get(&self.key(&path::as_directory(full_path)))
            .copied()
    }

    /// Returns the node for `full_path`, creating it when it is unknown.
    /// A known parent is kept unless `parent` supplies one.
    pub fn insert_path(&mut self, full_path: &str, parent: Option<DirId>) -> DirId {
        let full_path = path::as_directory(full_path);
        let key = self.key(&full_path);
        if let Some(&id) = self.by_path.get(&key) {
            if parent.is_some() {
                self.nodes[id.0].parent = parent;
            }
            return id;
        }
        let id = DirId(self.nodes.len());
        self.nodes.push(Directory {
            name: path::file_name(&full_path).to_string(),
            full_path,
            size: 0,
            permission: String::new(),
            timestamp: None,
            parent,
            items: None,
        });
        self.by_path.insert(key, id);
        id
    }

    /// The parent of `id`, derived from its path and created on demand when
    /// the directory was entered without one.
    pub fn resolve_parent(&mut self, id: DirId) -> Option<DirId> {
        let node = self.nodes.get(id.0)?;
        if node.parent.is_some() {
            return node.parent;
        }
        let parent_path = path::parent(&node.full_path)?;
        let parent = self.insert_path(&parent_path, None);
        self.nodes[id.0].parent = Some(parent);
        Some(parent)
    }

    /// Replaces the cached items of `id` with the given listing.
    pub fn populate(&mut self, id: DirId, listing: Vec<ListingItem>) {
        let mut items = DirectoryItems::default();
        for entry in listing {
            let timestamp = entry.timestamp();
            let key = self.key(&entry.name);
            if entry.is_directory {
                let child = self.insert_path(&entry.full_path, Some(id));
                let node = &mut self.nodes[child.0];
                node.name = entry.name;
                node.size = entry.size;
                node.permission = entry.permission;
                node.timestamp = timestamp;
                items.subdirectories.insert(key, child);
            } else {
                items.files.insert(
                    key,
                    RemoteFile {
                        name: entry.name,
                        full_path: entry.full_path,
                        size: entry.size,
                        permission: entry.permission,
                        timestamp,
                        parent: id,
                    },
                );
            }
        }
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.items = Some(items);
        }
    }

    /// Forgets the cached items of `id`; they are rebuilt on next access.
    pub fn clear_items(&mut self, id: DirId) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.items = None;
        }
    }

    fn items(&self, id: DirId) -> Option<&DirectoryItems> {
        self.nodes.get(id.0)?.items.as_ref()
    }

    /// Subdirectories in name order, `None` while not loaded.
    pub fn subdirectories(&self, id: DirId) -> Option<Vec<DirId>> {
        Some(self.items(id)?.subdirectories.values().copied().collect())
    }

    /// Files in name order, `None` while not loaded.
    pub fn files(&self, id: DirId) -> Option<Vec<&RemoteFile>> {
        Some(self.items(id)?.files.values().collect())
    }

    pub fn find_file(&self, id: DirId, name: &str) -> Option<&RemoteFile> {
        self.items(id)?.files.get(&self.key(name))
    }

    pub fn find_subdirectory(&self, id: DirId, name: &str) -> Option<DirId> {
        self.items(id)?.subdirectories.get(&self.key(name)).copied()
    }
}
