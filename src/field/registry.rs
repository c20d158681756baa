//! Name-keyed store of shared objects with typed lookup.
//!
//! The registry lives as long as the case that creates it. Objects are held
//! as `Rc<RefCell<_>>` so several consumers can share one field; lookups
//! return the shared handle or a typed error.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{FvError, Result};

/// Shared, mutable handle to a registered object.
pub type Shared<T> = Rc<RefCell<T>>;

struct RegistryEntry {
    object: Rc<dyn Any>,
    type_name: &'static str,
}

/// Process-scoped registry of named objects (fields, models, mesh data).
#[derive(Default)]
pub struct ObjectRegistry {
    objects: HashMap<String, RegistryEntry>,
}

impl std::fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for name in self.names() {
            if let Some(entry) = self.objects.get(name) {
                map.entry(&name, &entry.type_name);
            }
        }
        map.finish()
    }
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `object` under `name` and return the shared handle.
    ///
    /// An existing object of the same name is replaced.
    pub fn insert<V: Any>(&mut self, name: impl Into<String>, object: V) -> Shared<V> {
        let shared = Rc::new(RefCell::new(object));
        self.insert_shared(name, Rc::clone(&shared));
        shared
    }

    /// Register an already shared object.
    pub fn insert_shared<V: Any>(&mut self, name: impl Into<String>, object: Shared<V>) {
        let name = name.into();
        log::debug!("Registering '{name}' ({})", std::any::type_name::<V>());
        self.objects.insert(
            name,
            RegistryEntry {
                object: object as Rc<dyn Any>,
                type_name: std::any::type_name::<V>(),
            },
        );
    }

    /// Shared handle to the object `name` of type `V`.
    pub fn lookup<V: Any>(&self, name: &str) -> Result<Shared<V>> {
        let entry = self
            .objects
            .get(name)
            .ok_or_else(|| FvError::not_found("registered object", name))?;
        Rc::clone(&entry.object)
            .downcast::<RefCell<V>>()
            .map_err(|_| FvError::WrongType {
                name: name.to_string(),
                expected: std::any::type_name::<V>().to_string(),
                actual: entry.type_name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    /// Remove `name`; handles already given out stay valid.
    pub fn remove(&mut self, name: &str) -> bool {
        self.objects.remove(name).is_some()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.objects.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Drop every registration (case teardown).
    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::GeometricField;
    use crate::mesh::HexBlock;
    use crate::types::{DIMLESS, Vector};

    #[test]
    fn test_shared_lookup() {
        let mesh = HexBlock::new(2, 1, 1).build().unwrap();
        let mut registry = ObjectRegistry::new();
        let p = GeometricField::<f64>::uniform("p", &mesh, DIMLESS, 0.0, "zeroGradient").unwrap();
        let handle = registry.insert("p", p);

        let found = registry.lookup::<GeometricField<f64>>("p").unwrap();
        found.borrow_mut().internal_mut().fill(3.0);
        assert_eq!(handle.borrow().internal()[1], 3.0);
        assert_eq!(Rc::strong_count(&handle), 3);
    }

    #[test]
    fn test_lookup_errors() {
        let mut registry = ObjectRegistry::new();
        registry.insert("count", 3usize);
        assert!(matches!(
            registry.lookup::<usize>("missing"),
            Err(FvError::NotFound { .. })
        ));
        match registry.lookup::<GeometricField<Vector>>("count") {
            Err(FvError::WrongType { name, actual, .. }) => {
                assert_eq!(name, "count");
                assert_eq!(actual, "usize");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_lifecycle() {
        let mut registry = ObjectRegistry::new();
        registry.insert("b", 1.0f64);
        registry.insert("a", 2.0f64);
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
        assert!(registry.contains("b"));
        registry.clear();
        assert!(registry.is_empty());
    }
}
