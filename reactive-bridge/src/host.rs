//! The host object model the helpers plug into.
//!
//! A host owns named, dynamically typed properties. Some of them are plain
//! values; others are declared as [`ComputedProperty`] and are evaluated by
//! the host through their getter and setter. The helpers in this crate only
//! ever talk to a host through [`Host`], so any object model that can
//! implement it can use them. [`mock::MockObject`](crate::mock::MockObject)
//! is an in-memory implementation.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use crate::{lock, Observable};

/// A property value as stored by the host.
pub type PropertyValue = Arc<dyn Any + Send + Sync>;

/// Shared handle to a host object.
pub type HostRef = Arc<dyn Host>;

/// Callback registered with [`Host::add_observer`].
///
/// It receives no payload; observers read the property again if they need
/// its value.
pub type ObserverFn = Arc<dyn Fn() + Send + Sync>;

/// Arguments of one action dispatch, in call order.
pub type ActionArgs = Vec<serde_json::Value>;

/// Handler invoked when the host dispatches a named UI action.
pub type ActionHandler = Arc<dyn Fn(HostRef, ActionArgs) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// Capabilities a host object model must provide.
pub trait Host: Send + Sync + 'static {
    /// Reads a property. Computed properties are evaluated through their
    /// getter. Absent properties read as `None`.
    fn get(&self, key: &str) -> Option<PropertyValue>;

    /// Writes a property. Writes to computed properties go through their
    /// setter. Observers of `key` and of its dependents are notified.
    fn set(&self, key: &str, value: Option<PropertyValue>);

    fn add_observer(&self, key: &str, observer: ObserverFn) -> ObserverId;

    fn remove_observer(&self, key: &str, id: ObserverId);

    /// Registers a hook that runs once when the object is destroyed.
    fn on_destroy(&self, hook: Box<dyn FnOnce() + Send>);

    /// Private per-instance storage for the helpers.
    fn backing_fields(&self) -> &BackingFields;
}

/// A property whose value the host obtains from code rather than storage.
pub trait ComputedProperty: Send + Sync {
    /// Keys whose change invalidates this property's cached value.
    fn dependencies(&self) -> &[String] {
        &[]
    }

    fn get(&self, host: &HostRef, key: &str) -> Option<PropertyValue>;

    /// Handles a write. The returned value becomes the cached value of the
    /// property. By default the written value simply overrides it.
    fn set(&self, host: &HostRef, key: &str, value: Option<PropertyValue>) -> Option<PropertyValue> {
        let _ = (host, key);
        value
    }
}

/// Wraps a value as a [`PropertyValue`].
pub fn property_value<T: Send + Sync + 'static>(value: T) -> PropertyValue {
    Arc::new(value)
}

/// Typed access on top of [`Host`].
pub trait HostExt {
    /// Reads `key` and clones it out if it holds a `T`.
    fn get_as<T: Clone + 'static>(&self, key: &str) -> Option<T>;

    fn set_to<T: Send + Sync + 'static>(&self, key: &str, value: T);

    /// Reads `key` as an observable of `T`.
    fn get_observable<T: Send + 'static>(&self, key: &str) -> Option<Observable<T>> {
        self.get_as::<Observable<T>>(key)
    }
}

impl<H: Host + ?Sized> HostExt for H {
    fn get_as<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| value.downcast_ref::<T>().cloned())
    }

    fn set_to<T: Send + Sync + 'static>(&self, key: &str, value: T) {
        self.set(key, Some(property_value(value)));
    }
}

/// Per-instance private fields, keyed by name.
///
/// Each helper derives its field names from the property key it was declared
/// under, so fields of different properties never collide.
#[derive(Default)]
pub struct BackingFields {
    fields: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl BackingFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        let existing = lock(&self.fields).get(name).cloned()?;
        existing.downcast::<T>().ok()
    }

    /// Returns the field called `name`, creating it with `init` if it does
    /// not exist yet or holds a different type.
    ///
    /// `init` runs while the fields are locked and must not access them.
    pub fn get_or_insert_with<T, F>(&self, name: &str, init: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let mut fields = lock(&self.fields);
        if let Some(existing) = fields.get(name) {
            if let Ok(field) = Arc::clone(existing).downcast::<T>() {
                return field;
            }
        }

        let field = Arc::new(init());
        fields.insert(name.to_string(), field.clone());
        field
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.fields).contains_key(name)
    }

    pub fn len(&self) -> usize {
        lock(&self.fields).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
