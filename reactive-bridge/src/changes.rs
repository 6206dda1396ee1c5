use std::marker::PhantomData;
use std::sync::Arc;

use tracing::trace;

use crate::{
    property_value, ComputedProperty, Element, HostExt, HostRef, Observable, ObserverFn,
    PropertyValue, StreamError, Teardown,
};

/// Computed property returned by [`rx_property_changes`].
pub struct RxPropertyChanges<T> {
    property: String,
    _marker: PhantomData<fn() -> T>,
}

/// Declares a property holding an observable of the changes of `property`.
///
/// Each subscription registers its own observer on the owning object and
/// removes it when the subscription ends. On every change notification the
/// property is read again, and its value is emitted if it holds a `T`. The
/// value the property had at subscribe time is not emitted.
pub fn rx_property_changes<T: Element>(property: impl Into<String>) -> RxPropertyChanges<T> {
    RxPropertyChanges {
        property: property.into(),
        _marker: PhantomData,
    }
}

impl<T: Element> RxPropertyChanges<T> {
    fn changes(&self, host: &HostRef) -> Observable<T> {
        let owner = Arc::downgrade(host);
        let property = self.property.clone();

        Observable::create(move |observer| -> Teardown {
            let Some(host) = owner.upgrade() else {
                observer.error(StreamError::Detached);
                return Box::new(|| {});
            };

            let reader = Arc::downgrade(&host);
            let watched = property.clone();
            let listener: ObserverFn = Arc::new(move || {
                let Some(host) = reader.upgrade() else {
                    return;
                };
                if let Some(value) = host.get_as::<T>(&watched) {
                    observer.next(value);
                }
            });

            let id = host.add_observer(&property, listener);
            trace!(property = %property, "listening for changes");

            let owner = Arc::downgrade(&host);
            let property = property.clone();
            Box::new(move || {
                if let Some(host) = owner.upgrade() {
                    host.remove_observer(&property, id);
                    trace!(property = %property, "stopped listening for changes");
                }
            })
        })
    }
}

impl<T: Element> ComputedProperty for RxPropertyChanges<T> {
    fn get(&self, host: &HostRef, _key: &str) -> Option<PropertyValue> {
        Some(property_value(self.changes(host)))
    }

    /// Writes are ignored; the property reads as a fresh change stream
    /// afterwards.
    fn set(&self, host: &HostRef, _key: &str, _value: Option<PropertyValue>) -> Option<PropertyValue> {
        Some(property_value(self.changes(host)))
    }
}
