//! An in-memory [`Host`] for tests and demos.
//!
//! `MockObject` implements just enough of a property-observation object
//! model to exercise the helpers: plain and computed properties, cached
//! computed values invalidated through dependency lists, change observers,
//! destroy hooks and action dispatch.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, trace};

use crate::{
    lock, property_value, ActionArgs, ActionHandler, BackingFields, ComputedProperty, Host,
    HostError, HostRef, ObserverFn, ObserverId, PropertyValue,
};

/// Builder for [`MockObject`], playing the role of a class definition plus
/// the create-time property values.
#[derive(Default)]
pub struct MockObjectBuilder {
    initial: Vec<(String, Option<PropertyValue>)>,
    computed: HashMap<String, Arc<dyn ComputedProperty>>,
    actions: HashMap<String, ActionHandler>,
}

impl MockObjectBuilder {
    /// Declares a property with an initial value. If `key` is also declared
    /// as computed, the value is passed to its setter when the object is
    /// built.
    pub fn property<T: Send + Sync + 'static>(mut self, key: &str, value: T) -> Self {
        self.initial.push((key.to_string(), Some(property_value(value))));
        self
    }

    /// Declares a property that starts out absent.
    pub fn empty_property(mut self, key: &str) -> Self {
        self.initial.push((key.to_string(), None));
        self
    }

    pub fn computed<P: ComputedProperty + 'static>(mut self, key: &str, property: P) -> Self {
        self.computed.insert(key.to_string(), Arc::new(property));
        self
    }

    pub fn action(mut self, name: &str, handler: ActionHandler) -> Self {
        self.actions.insert(name.to_string(), handler);
        self
    }

    pub fn build(self) -> Arc<MockObject> {
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for (key, property) in &self.computed {
            for dependency in property.dependencies() {
                dependents
                    .entry(dependency.clone())
                    .or_default()
                    .push(key.clone());
            }
        }

        let object = Arc::new_cyclic(|this| MockObject {
            this: this.clone(),
            computed: self.computed,
            dependents,
            actions: self.actions,
            state: Mutex::new(ObjectState::default()),
            backing: BackingFields::new(),
            next_observer_id: AtomicU64::new(1),
        });

        for (key, value) in self.initial {
            match value {
                Some(value) => object.set(&key, Some(value)),
                None if !object.computed.contains_key(&key) => {
                    lock(&object.state).values.insert(key, None);
                }
                None => {}
            }
        }

        object
    }
}

#[derive(Default)]
struct ObjectState {
    // Plain values and cached computed values.
    values: HashMap<String, Option<PropertyValue>>,
    observers: HashMap<String, Vec<(ObserverId, ObserverFn)>>,
    destroy_hooks: Vec<Box<dyn FnOnce() + Send>>,
    destroyed: bool,
}

/// In-memory host object.
pub struct MockObject {
    this: Weak<MockObject>,
    computed: HashMap<String, Arc<dyn ComputedProperty>>,
    dependents: HashMap<String, Vec<String>>,
    actions: HashMap<String, ActionHandler>,
    state: Mutex<ObjectState>,
    backing: BackingFields,
    next_observer_id: AtomicU64,
}

impl MockObject {
    pub fn builder() -> MockObjectBuilder {
        MockObjectBuilder::default()
    }

    fn host_ref(&self) -> Option<HostRef> {
        self.this.upgrade().map(|this| this as HostRef)
    }

    /// Every computed key that depends on `key`, directly or transitively.
    fn dependents_of(&self, key: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut pending = vec![key.to_string()];
        let mut stale = Vec::new();

        while let Some(current) = pending.pop() {
            for dependent in self.dependents.get(&current).into_iter().flatten() {
                if seen.insert(dependent.clone()) {
                    stale.push(dependent.clone());
                    pending.push(dependent.clone());
                }
            }
        }
        stale
    }

    /// Drops cached values that depend on `key` and notifies the observers
    /// of `key` and of every invalidated property.
    fn property_did_change(&self, key: &str, stored: Option<Option<PropertyValue>>) {
        let stale = self.dependents_of(key);
        let observers: Vec<ObserverFn> = {
            let mut state = lock(&self.state);
            if let Some(stored) = stored {
                state.values.insert(key.to_string(), stored);
            }
            for dependent in &stale {
                state.values.remove(dependent);
            }

            std::iter::once(key)
                .chain(stale.iter().map(String::as_str))
                .filter_map(|changed| state.observers.get(changed))
                .flatten()
                .map(|(_, observer)| Arc::clone(observer))
                .collect()
        };

        for observer in observers {
            observer();
        }
    }

    /// Announces a change of `key` without writing it.
    pub fn notify_property_change(&self, key: &str) {
        self.property_did_change(key, None);
    }

    /// Dispatches the action called `name`.
    pub async fn send(&self, name: &str, args: ActionArgs) -> Result<(), HostError> {
        let handler = self
            .actions
            .get(name)
            .cloned()
            .ok_or_else(|| HostError::UnknownAction(name.to_string()))?;
        if self.is_destroyed() {
            return Err(HostError::Destroyed);
        }
        let host = self.host_ref().ok_or(HostError::Destroyed)?;

        trace!(action = name, args = args.len(), "dispatching action");
        handler(host, args).await;
        Ok(())
    }

    /// Runs the destroy hooks. Later calls do nothing.
    pub fn destroy(&self) {
        let hooks = {
            let mut state = lock(&self.state);
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            std::mem::take(&mut state.destroy_hooks)
        };

        debug!(hooks = hooks.len(), "destroying object");
        for hook in hooks {
            hook();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.state).destroyed
    }

    /// Number of observers registered on `key`.
    pub fn observer_count(&self, key: &str) -> usize {
        lock(&self.state)
            .observers
            .get(key)
            .map_or(0, |observers| observers.len())
    }
}

impl Host for MockObject {
    fn get(&self, key: &str) -> Option<PropertyValue> {
        if let Some(value) = lock(&self.state).values.get(key) {
            return value.clone();
        }

        let computed = Arc::clone(self.computed.get(key)?);
        let host = self.host_ref()?;
        let value = computed.get(&host, key);
        lock(&self.state)
            .values
            .insert(key.to_string(), value.clone());
        value
    }

    fn set(&self, key: &str, value: Option<PropertyValue>) {
        let stored = match self.computed.get(key) {
            Some(computed) => {
                let Some(host) = self.host_ref() else {
                    return;
                };
                computed.set(&host, key, value)
            }
            None => value,
        };
        self.property_did_change(key, Some(stored));
    }

    fn add_observer(&self, key: &str, observer: ObserverFn) -> ObserverId {
        let id = ObserverId(self.next_observer_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.state)
            .observers
            .entry(key.to_string())
            .or_default()
            .push((id, observer));
        trace!(property = key, observer = id.0, "observer added");
        id
    }

    fn remove_observer(&self, key: &str, id: ObserverId) {
        if let Some(observers) = lock(&self.state).observers.get_mut(key) {
            observers.retain(|(registered, _)| *registered != id);
        }
        trace!(property = key, observer = id.0, "observer removed");
    }

    fn on_destroy(&self, hook: Box<dyn FnOnce() + Send>) {
        let mut state = lock(&self.state);
        if state.destroyed {
            drop(state);
            hook();
        } else {
            state.destroy_hooks.push(hook);
        }
    }

    fn backing_fields(&self) -> &BackingFields {
        &self.backing
    }
}
