//! In-memory schema registry.
//!
//! The registry maps a [`SchemaIdentity`] to a fully built [`SchemaEntry`].
//! One readers-writer lock guards the whole map: lookups take the read side
//! and only clone an `Arc`, so a writer replacing an entry never exposes a
//! tree without its matching index, and readers holding an older entry keep
//! a consistent snapshot.

use crate::config::SchemaSource;
use crate::error::{Result, SchemaError};
use crate::identity::SchemaIdentity;
use crate::schema::{SchemaElement, SchemaIndex, SchemaParser, SchemaTree};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// A registered schema: tree and index, always together.
#[derive(Debug)]
pub struct SchemaEntry {
    pub identity: SchemaIdentity,
    pub tree: SchemaTree,
    pub index: SchemaIndex,
}

impl SchemaEntry {
    /// Build the index for `tree` off to the side.
    pub fn build(identity: SchemaIdentity, tree: SchemaTree) -> Result<Self> {
        let index = SchemaIndex::build(&tree)?;
        Ok(Self {
            identity,
            tree,
            index,
        })
    }

    /// Look up `path` in this schema's index.
    pub fn element(&self, path: &str) -> Result<&SchemaElement> {
        self.index.get(path).ok_or_else(|| SchemaError::PathNotFound {
            identity: self.identity.key(),
            path: path.to_string(),
        })
    }
}

/// Concurrency-safe store of schemas keyed by identity.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, Arc<SchemaEntry>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and index every configured schema, then register them all.
    ///
    /// Nothing is registered unless every schema builds.
    pub fn load(sources: &[SchemaSource], parser: &dyn SchemaParser) -> Result<Self> {
        let mut built = Vec::with_capacity(sources.len());
        for source in sources {
            let identity = source.identity();
            identity.validate()?;
            let tree = parser.parse(source)?;
            let entry = SchemaEntry::build(identity, tree)?;
            info!(
                "Loaded schema {} ({} nodes, {} elements)",
                entry.identity,
                entry.tree.len(),
                entry.index.len()
            );
            built.push(entry);
        }

        let registry = Self::new();
        {
            let mut schemas = registry.write_lock()?;
            for entry in built {
                let key = entry.identity.key();
                if schemas.insert(key.clone(), Arc::new(entry)).is_some() {
                    return Err(SchemaError::config(format!(
                        "schema {} configured more than once",
                        key
                    )));
                }
            }
        }
        Ok(registry)
    }

    fn read_lock(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Arc<SchemaEntry>>>> {
        self.schemas
            .read()
            .map_err(|_| SchemaError::Other("Failed to acquire schema registry read lock".into()))
    }

    fn write_lock(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Arc<SchemaEntry>>>> {
        self.schemas
            .write()
            .map_err(|_| SchemaError::Other("Failed to acquire schema registry write lock".into()))
    }

    /// Insert or replace the entry for `identity`.
    pub fn put(
        &self,
        identity: SchemaIdentity,
        tree: SchemaTree,
        index: SchemaIndex,
    ) -> Result<()> {
        self.put_entry(SchemaEntry {
            identity,
            tree,
            index,
        })
    }

    /// Insert or replace a prebuilt entry in a single write.
    ///
    /// Identities that cannot form an unambiguous key are rejected.
    pub fn put_entry(&self, entry: SchemaEntry) -> Result<()> {
        entry.identity.validate()?;
        let key = entry.identity.key();
        let entry = Arc::new(entry);
        let replaced = self.write_lock()?.insert(key.clone(), entry).is_some();
        debug!("Registered schema {} (replaced: {})", key, replaced);
        Ok(())
    }

    /// Remove the entry for `identity`. Readers holding it keep their snapshot.
    pub fn remove(&self, identity: &SchemaIdentity) -> Result<bool> {
        Ok(self.write_lock()?.remove(&identity.key()).is_some())
    }

    pub fn get(&self, identity: &SchemaIdentity) -> Result<Arc<SchemaEntry>> {
        let key = identity.key();
        self.read_lock()?
            .get(&key)
            .cloned()
            .ok_or(SchemaError::SchemaNotFound { identity: key })
    }

    /// Resolve `identity`, then `path` within it.
    pub fn get_element(&self, identity: &SchemaIdentity, path: &str) -> Result<SchemaElement> {
        let entry = self.get(identity)?;
        entry.element(path).cloned()
    }

    /// Snapshot of registered identities, sorted.
    pub fn list(&self) -> Result<Vec<SchemaIdentity>> {
        let mut identities: Vec<_> = self
            .read_lock()?
            .values()
            .map(|e| e.identity.clone())
            .collect();
        identities.sort();
        Ok(identities)
    }

    /// Number of registered schemas.
    ///
    /// Entries are inserted whole, so a lock poisoned by a panicking writer
    /// still holds a valid map and is counted as is.
    pub fn len(&self) -> usize {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{NodeKind, SchemaNode};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn interfaces_tree(key: &str) -> SchemaTree {
        let mut tree = SchemaTree::new(key);
        let root = tree.root();
        let ifaces = tree
            .add_child(root, SchemaNode::new("interfaces", NodeKind::Container))
            .unwrap();
        let choice = tree
            .add_child(ifaces, SchemaNode::new("type", NodeKind::Choice))
            .unwrap();
        let case = tree
            .add_child(choice, SchemaNode::new("ethernet", NodeKind::Case))
            .unwrap();
        tree.add_child(case, SchemaNode::new("mtu", NodeKind::Leaf).with_type("uint16")).unwrap();
        tree
    }

    fn single_leaf_tree(key: &str, leaf: &str) -> SchemaTree {
        let mut tree = SchemaTree::new(key);
        let root = tree.root();
        tree.add_child(root, SchemaNode::new(leaf, NodeKind::Leaf)).unwrap();
        tree
    }

    fn register(registry: &SchemaRegistry, identity: &SchemaIdentity, tree: SchemaTree) {
        let index = SchemaIndex::build(&tree).unwrap();
        registry.put(identity.clone(), tree, index).unwrap();
    }

    #[test]
    fn test_get_element_for_registered_identity() {
        let registry = SchemaRegistry::new();
        let id = SchemaIdentity::new("test", "x", "1");
        register(&registry, &id, interfaces_tree(&id.key()));

        let element = registry.get_element(&id, "interfaces/mtu").unwrap();
        assert_eq!(element.name, "mtu");
        assert_eq!(element.type_name.as_deref(), Some("uint16"));
    }

    #[test]
    fn test_unknown_identity_and_path_not_found() {
        let registry = SchemaRegistry::new();
        let id = SchemaIdentity::new("test", "x", "1");
        register(&registry, &id, interfaces_tree(&id.key()));

        let missing = SchemaIdentity::new("test", "x", "2");
        assert!(matches!(
            registry.get_element(&missing, "interfaces/mtu"),
            Err(SchemaError::SchemaNotFound { .. })
        ));
        assert!(matches!(
            registry.get_element(&id, "interfaces/type"),
            Err(SchemaError::PathNotFound { .. })
        ));
    }

    #[test]
    fn test_same_name_distinct_entries() {
        let registry = SchemaRegistry::new();
        let a = SchemaIdentity::new("srl", "nokia", "22.11");
        let b = SchemaIdentity::new("srl", "arista", "4.30");
        register(&registry, &a, single_leaf_tree(&a.key(), "alpha"));
        register(&registry, &b, single_leaf_tree(&b.key(), "beta"));

        assert_eq!(registry.len(), 2);
        assert!(registry.get_element(&a, "alpha").is_ok());
        assert!(registry.get_element(&a, "beta").is_err());
        assert!(registry.get_element(&b, "beta").is_ok());

        let listed = registry.list().unwrap();
        assert_eq!(listed, vec![b.clone(), a.clone()]);
    }

    #[test]
    fn test_put_replaces_and_remove_keeps_snapshot() {
        let registry = SchemaRegistry::new();
        let id = SchemaIdentity::new("test", "x", "1");
        register(&registry, &id, single_leaf_tree(&id.key(), "old"));
        let held = registry.get(&id).unwrap();

        register(&registry, &id, single_leaf_tree(&id.key(), "new"));
        assert!(registry.get_element(&id, "new").is_ok());
        assert!(registry.get_element(&id, "old").is_err());
        assert!(held.element("old").is_ok());

        assert!(registry.remove(&id).unwrap());
        assert!(!registry.remove(&id).unwrap());
        assert!(registry.is_empty());
        assert!(held.element("old").is_ok());
    }

    #[test]
    fn test_put_rejects_ambiguous_identities() {
        let registry = SchemaRegistry::new();
        let a = SchemaIdentity::new("a@b", "c", "d");
        let b = SchemaIdentity::new("a", "b@c", "d");

        for id in [&a, &b] {
            let tree = single_leaf_tree(&id.key(), "leaf");
            let index = SchemaIndex::build(&tree).unwrap();
            assert!(matches!(
                registry.put(id.clone(), tree, index),
                Err(SchemaError::Config { .. })
            ));
        }
        assert!(registry.is_empty());
        assert!(registry.list().unwrap().is_empty());

        // A valid identity is unaffected by the rejected ones.
        let ok = SchemaIdentity::new("a", "b", "c");
        register(&registry, &ok, single_leaf_tree(&ok.key(), "leaf"));
        assert_eq!(registry.list().unwrap(), vec![ok]);
    }

    #[test]
    fn test_len_survives_poisoned_lock() {
        let registry = Arc::new(SchemaRegistry::new());
        let id = SchemaIdentity::new("test", "x", "1");
        register(&registry, &id, single_leaf_tree(&id.key(), "leaf"));

        let poisoner = registry.clone();
        let result = thread::spawn(move || {
            let _guard = poisoner.schemas.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(result.is_err());
        assert!(registry.schemas.is_poisoned());

        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
        assert!(matches!(registry.get(&id), Err(SchemaError::Other(_))));
    }

    #[test]
    fn test_reads_stay_consistent_during_concurrent_puts() {
        let registry = Arc::new(SchemaRegistry::new());
        let stable = SchemaIdentity::new("stable", "x", "1");
        let churn = SchemaIdentity::new("churn", "x", "1");
        register(&registry, &stable, interfaces_tree(&stable.key()));
        register(&registry, &churn, single_leaf_tree(&churn.key(), "leaf0"));

        let done = Arc::new(AtomicBool::new(false));
        let writer = {
            let registry = registry.clone();
            let churn = churn.clone();
            let done = done.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    register(
                        &registry,
                        &churn,
                        single_leaf_tree(&churn.key(), &format!("leaf{}", i)),
                    );
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                let stable = stable.clone();
                let churn = churn.clone();
                let done = done.clone();
                thread::spawn(move || {
                    while !done.load(Ordering::SeqCst) {
                        let element = registry.get_element(&stable, "interfaces/mtu").unwrap();
                        assert_eq!(element.name, "mtu");

                        // The index must always describe the tree it came with.
                        let entry = registry.get(&churn).unwrap();
                        let root = entry.tree.node(entry.tree.root()).unwrap();
                        let leaf = root.children().next().unwrap();
                        assert!(entry.index.get(leaf.name()).is_some());
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }

    struct FixedParser;

    impl SchemaParser for FixedParser {
        fn parse(&self, source: &SchemaSource) -> Result<SchemaTree> {
            let key = source.identity().key();
            if source.name == "broken" {
                let mut tree = single_leaf_tree(&key, "dup");
                let root = tree.root();
                tree.add_child(root, SchemaNode::new("dup", NodeKind::Leaf))?;
                return Ok(tree);
            }
            Ok(interfaces_tree(&key))
        }
    }

    fn source(name: &str) -> SchemaSource {
        SchemaSource {
            name: name.into(),
            vendor: "x".into(),
            version: "1".into(),
            files: vec!["unused.json".into()],
        }
    }

    #[test]
    fn test_load_is_all_or_nothing() {
        let ok = SchemaRegistry::load(&[source("a"), source("b")], &FixedParser).unwrap();
        assert_eq!(ok.len(), 2);

        let err = SchemaRegistry::load(&[source("a"), source("broken")], &FixedParser).unwrap_err();
        assert!(matches!(err, SchemaError::SchemaBuild { .. }));
    }
}
