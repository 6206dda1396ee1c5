use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::{property_value, BehaviorSubject, ComputedProperty, HostRef, Observable, PropertyValue};

/// Computed property returned by [`rx_input`].
pub struct RxInput<T> {
    _marker: PhantomData<fn() -> T>,
}

/// Declares a property that accepts observables and always reads as one.
///
/// Reading the property returns a single observable that forwards whatever the
/// most recently written observable emits. Before the first write it forwards
/// nothing. Writing anything that is not an `Observable<T>` switches the output
/// to an empty observable.
///
/// Every read returns the same observable, backed by one container per
/// object.
///
/// ## Examples
///
/// ```
/// use reactive_bridge::mock::MockObject;
/// use reactive_bridge::{rx_input, HostExt, Observable};
///
/// let object = MockObject::builder()
///     .computed("clicks", rx_input::<u32>())
///     .build();
///
/// let before = object.get_observable::<u32>("clicks").unwrap();
/// object.set_to("clicks", Observable::from_values(vec![1, 2]));
/// let after = object.get_observable::<u32>("clicks").unwrap();
///
/// assert!(before.ptr_eq(&after));
/// ```
pub fn rx_input<T: Send + 'static>() -> RxInput<T> {
    RxInput {
        _marker: PhantomData,
    }
}

struct InputCell<T> {
    container: BehaviorSubject<Observable<T>>,
    output: Observable<T>,
}

impl<T: Send + 'static> InputCell<T> {
    fn new() -> Self {
        let container = BehaviorSubject::new(Observable::empty());
        let output = container.switch_latest();
        Self { container, output }
    }
}

impl<T: Send + 'static> RxInput<T> {
    fn cell(&self, host: &HostRef, key: &str) -> Arc<InputCell<T>> {
        host.backing_fields()
            .get_or_insert_with(&format!("rx_input:{key}"), || {
                debug!(property = key, "creating input container");
                InputCell::new()
            })
    }
}

impl<T: Send + 'static> ComputedProperty for RxInput<T> {
    fn get(&self, host: &HostRef, key: &str) -> Option<PropertyValue> {
        let cell = self.cell(host, key);
        Some(property_value(cell.output.clone()))
    }

    fn set(&self, host: &HostRef, key: &str, value: Option<PropertyValue>) -> Option<PropertyValue> {
        let cell = self.cell(host, key);
        let next = value
            .and_then(|value| value.downcast_ref::<Observable<T>>().cloned())
            .unwrap_or_else(Observable::empty);
        cell.container.next(next);
        Some(property_value(cell.output.clone()))
    }
}
