use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, error};

use crate::{
    lock, property_value, ComputedProperty, Element, HostExt, HostRef, Observable, PropertyValue,
    SerialDisposable,
};

/// Computed property returned by [`bind_to`].
pub struct BindTo<T> {
    source: String,
    _marker: PhantomData<fn() -> T>,
}

/// Declares a property that follows the latest value emitted by the
/// observable in `source`.
///
/// Each access checks whether `source` still holds the observable the binding
/// is subscribed to. If it holds a different one, the old subscription is
/// disposed and the new observable is subscribed. Re-reading with an
/// unchanged source never subscribes again.
///
/// Writing the property stores the value immediately; the next emission
/// overwrites it. When the source fails, the error is logged and the property
/// becomes absent. The subscription is disposed when the object is destroyed.
///
/// Accessing the property subscribes on a Tokio task, so it must happen
/// inside a Tokio runtime.
pub fn bind_to<T: Element>(source: impl Into<String>) -> BindTo<T> {
    BindTo {
        source: source.into(),
        _marker: PhantomData,
    }
}

enum Tracked<T> {
    Nothing,
    Absent,
    Source(Observable<T>),
}

impl<T: Send + 'static> Tracked<T> {
    fn is(&self, candidate: &Option<Observable<T>>) -> bool {
        match (self, candidate) {
            (Tracked::Absent, None) => true,
            (Tracked::Source(current), Some(candidate)) => current.ptr_eq(candidate),
            _ => false,
        }
    }
}

impl<T> From<Option<Observable<T>>> for Tracked<T> {
    fn from(source: Option<Observable<T>>) -> Self {
        match source {
            Some(observable) => Tracked::Source(observable),
            None => Tracked::Absent,
        }
    }
}

struct BindingLink<T> {
    tracked: Mutex<Tracked<T>>,
    subscription: Arc<SerialDisposable>,
    disposal_registered: AtomicBool,
    value: Mutex<Option<T>>,
}

impl<T> BindingLink<T> {
    fn new() -> Self {
        Self {
            tracked: Mutex::new(Tracked::Nothing),
            subscription: Arc::new(SerialDisposable::new()),
            disposal_registered: AtomicBool::new(false),
            value: Mutex::new(None),
        }
    }
}

impl<T: Element> BindTo<T> {
    fn link(&self, host: &HostRef, key: &str) -> Arc<BindingLink<T>> {
        host.backing_fields()
            .get_or_insert_with(&format!("bind_to:{key}"), BindingLink::new)
    }

    /// Makes sure the link follows the observable currently in the source.
    fn follow_source(&self, host: &HostRef, key: &str, link: &BindingLink<T>) {
        let source = host.get_observable::<T>(&self.source);
        {
            let mut tracked = lock(&link.tracked);
            if tracked.is(&source) {
                return;
            }
            *tracked = Tracked::from(source.clone());
        }

        if !link.disposal_registered.swap(true, Ordering::SeqCst) {
            let subscription = Arc::clone(&link.subscription);
            let property = key.to_string();
            host.on_destroy(Box::new(move || {
                debug!(property = %property, "disposing binding");
                subscription.dispose();
            }));
        }

        link.subscription.replace(|| {
            let observable = source?;
            debug!(property = key, source = %self.source, "binding to new source");

            let owner = Arc::downgrade(host);
            let failed_owner = owner.clone();
            let property = key.to_string();
            let failed_property = property.clone();

            Some(observable.subscribe(
                move |value| {
                    if let Some(host) = owner.upgrade() {
                        host.set_to(&property, value);
                    }
                },
                move |err| {
                    error!(property = %failed_property, error = %err, "Error binding property");
                    if let Some(host) = failed_owner.upgrade() {
                        host.set(&failed_property, None);
                    }
                },
            ))
        });
    }

    fn current(link: &BindingLink<T>) -> Option<PropertyValue> {
        lock(&link.value).clone().map(property_value)
    }
}

impl<T: Element> ComputedProperty for BindTo<T> {
    fn dependencies(&self) -> &[String] {
        std::slice::from_ref(&self.source)
    }

    fn get(&self, host: &HostRef, key: &str) -> Option<PropertyValue> {
        let link = self.link(host, key);
        self.follow_source(host, key, &link);
        Self::current(&link)
    }

    fn set(&self, host: &HostRef, key: &str, value: Option<PropertyValue>) -> Option<PropertyValue> {
        let link = self.link(host, key);
        self.follow_source(host, key, &link);
        *lock(&link.value) = value.and_then(|value| value.downcast_ref::<T>().cloned());
        Self::current(&link)
    }
}
