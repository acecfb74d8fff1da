//! Keyed object stores shared between the producer and the renderer.
//!
//! Objects may be requested before the producer has resolved them; the
//! requester registers a callback which fires once on [`ObjectStore::resolve`].

use crate::{font::LoadedFont, image::{ImageData, MaskImage}, pattern::PatternIr};
use ahash::HashMap;
use log::debug;
use std::{cell::RefCell, fmt, rc::Rc};

/// Object id. Ids of the common namespace, shared by all pages, start with `g_`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjId(Rc<str>);

impl ObjId {
    pub fn new(id: &str) -> Self {
        Self(id.into())
    }

    pub fn is_common(&self) -> bool {
        self.0.starts_with("g_")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub enum ObjValue {
    Image(Rc<ImageData>),
    Mask(Rc<MaskImage>),
    Font(Rc<LoadedFont>),
    Pattern(Rc<PatternIr>),
    /// The producer failed to build the object.
    Error(Rc<str>),
}

type Callback = Box<dyn FnOnce()>;

#[derive(Default)]
struct Entry {
    value: Option<ObjValue>,
    callbacks: Vec<Callback>,
}

#[derive(Default)]
pub struct ObjectStore {
    entries: RefCell<HashMap<ObjId, Entry>>,
}

impl fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStore")
            .field("len", &self.entries.borrow().len())
            .finish()
    }
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, id: &ObjId) -> bool {
        self.entries
            .borrow()
            .get(id)
            .is_some_and(|e| e.value.is_some())
    }

    /// Resolved value of `id`, `None` while pending.
    pub fn get(&self, id: &ObjId) -> Option<ObjValue> {
        self.entries.borrow().get(id).and_then(|e| e.value.clone())
    }

    /// Return the value if resolved, otherwise register `callback` to run once
    /// the producer resolves `id`.
    pub fn get_or_wait(&self, id: &ObjId, callback: impl FnOnce() + 'static) -> Option<ObjValue> {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.entry(id.clone()).or_default();
        if entry.value.is_none() {
            debug!("object {id} pending, callback registered");
            entry.callbacks.push(Box::new(callback));
        }
        entry.value.clone()
    }

    /// Store `value` for `id` and run the callbacks waiting on it.
    pub fn resolve(&self, id: &ObjId, value: ObjValue) {
        let callbacks = {
            let mut entries = self.entries.borrow_mut();
            let entry = entries.entry(id.clone()).or_default();
            entry.value = Some(value);
            std::mem::take(&mut entry.callbacks)
        };
        // callbacks may read the store again, run them after the borrow ends
        for cb in callbacks {
            cb();
        }
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// The two namespaces an operator list resolves against.
#[derive(Debug, Clone, Default)]
pub struct ObjectStores {
    pub common: Rc<ObjectStore>,
    pub page: Rc<ObjectStore>,
}

impl ObjectStores {
    pub fn pool(&self, id: &ObjId) -> &ObjectStore {
        if id.is_common() {
            &self.common
        } else {
            &self.page
        }
    }

    pub fn get(&self, id: &ObjId) -> Option<ObjValue> {
        self.pool(id).get(id)
    }

    pub fn has(&self, id: &ObjId) -> bool {
        self.pool(id).has(id)
    }
}
