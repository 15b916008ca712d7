use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;

pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: String);
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &mut T {
    fn get_item(&self, key: &str) -> Option<String> {
        (**self).get_item(key)
    }

    fn set_item(&mut self, key: &str, value: String) {
        (**self).set_item(key, value);
    }
}

impl KeyValueStore for BTreeMap<String, String> {
    fn get_item(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: String) {
        self.insert(key.to_string(), value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Local,
    Session,
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "localStorage",
            Self::Session => "sessionStorage",
        }
    }
}

/// Handle to one storage area. Clones share the same entries.
///
/// Entries keep insertion order; overwriting a key keeps its position, and
/// `key(index)` walks that order.
#[derive(Debug, Clone)]
pub struct Storage {
    kind: StorageKind,
    entries: Rc<RefCell<Vec<(String, String)>>>,
}

impl Storage {
    pub fn new(kind: StorageKind) -> Self {
        Self {
            kind,
            entries: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.entries
            .borrow()
            .iter()
            .find_map(|(name, value)| (name == key).then(|| value.clone()))
    }

    pub fn set_item(&self, key: &str, value: impl Into<String>) {
        let value = value.into();
        let mut entries = self.entries.borrow_mut();
        if let Some((_, stored)) = entries.iter_mut().find(|(name, _)| name == key) {
            *stored = value;
        } else {
            entries.push((key.to_string(), value));
        }
    }

    pub fn remove_item(&self, key: &str) {
        self.entries.borrow_mut().retain(|(name, _)| name != key);
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn key(&self, index: usize) -> Option<String> {
        self.entries
            .borrow()
            .get(index)
            .map(|(name, _)| name.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn items(&self) -> Vec<(String, String)> {
        self.entries.borrow().clone()
    }

    pub fn load(&self, key: &str) -> Option<StoredValue> {
        read_value(self, key)
    }

    pub fn store(&self, key: &str, value: &StoredValue) {
        let mut handle = self.clone();
        write_value(&mut handle, key, value);
    }

    pub(crate) fn seed(&self, pairs: &[(&str, &str)]) {
        for (key, value) in pairs {
            self.set_item(key, *value);
        }
    }

    pub fn shares_area_with(&self, other: &Storage) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }
}

impl KeyValueStore for Storage {
    fn get_item(&self, key: &str) -> Option<String> {
        Storage::get_item(self, key)
    }

    fn set_item(&mut self, key: &str, value: String) {
        Storage::set_item(self, key, value);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Text(String),
    Structured(Value),
}

impl StoredValue {
    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Self::Structured(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn into_object(self) -> Option<serde_json::Map<String, Value>> {
        match self {
            Self::Structured(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    fn encode(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(value) => value.to_string(),
        }
    }
}

/// Reads `key` and decodes it. Text that is not valid JSON comes back as
/// `StoredValue::Text` with the raw contents; decode failures never surface.
pub fn read_value<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Option<StoredValue> {
    let raw = store.get_item(key)?;
    match serde_json::from_str::<Value>(&raw) {
        Ok(value) => Some(StoredValue::Structured(value)),
        Err(err) => {
            log::trace!(target: "page_state", "storage key={key} kept as text: {err}");
            Some(StoredValue::Text(raw))
        }
    }
}

pub fn write_value<S: KeyValueStore + ?Sized>(store: &mut S, key: &str, value: &StoredValue) {
    let encoded = value.encode();
    log::trace!(target: "page_state", "storage write key={key} bytes={}", encoded.len());
    store.set_item(key, encoded);
}
