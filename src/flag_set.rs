use serde_json::{Map, Value};

use crate::storage::{KeyValueStore, StoredValue, read_value, write_value};

pub const FLAG_MARKER: i64 = 1;

/// Instances over the same namespace expect a single writer at a time: the
/// last write wins, and `has` does not see another instance's writes until
/// `refresh` is called.
#[derive(Debug)]
pub struct FlagSet<S: KeyValueStore> {
    store: S,
    namespace: String,
    flags: Map<String, Value>,
}

impl<S: KeyValueStore> FlagSet<S> {
    pub fn open(store: S, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let flags = Self::load_record(&store, &namespace);
        Self {
            store,
            namespace,
            flags,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn add(&mut self, name: &str) -> &mut Self {
        self.flags.insert(name.to_string(), Value::from(FLAG_MARKER));
        self.persist();
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) {
        if self.flags.is_empty() {
            return;
        }
        self.flags.shift_remove(name);
        self.persist();
    }

    pub fn clear(&mut self) {
        self.flags.clear();
        self.persist();
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.flags.keys().map(String::as_str)
    }

    pub fn refresh(&mut self) {
        self.flags = Self::load_record(&self.store, &self.namespace);
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn load_record(store: &S, namespace: &str) -> Map<String, Value> {
        match read_value(store, namespace) {
            Some(stored) => stored.into_object().unwrap_or_else(|| {
                log::trace!(
                    target: "page_state",
                    "flags {namespace}: record is not an object, starting empty"
                );
                Map::new()
            }),
            None => Map::new(),
        }
    }

    fn persist(&mut self) {
        log::trace!(
            target: "page_state",
            "flags {} persist count={}",
            self.namespace,
            self.flags.len()
        );
        write_value(
            &mut self.store,
            &self.namespace,
            &StoredValue::Structured(Value::Object(self.flags.clone())),
        );
    }
}
