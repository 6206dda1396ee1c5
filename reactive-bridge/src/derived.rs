use std::sync::Arc;

use crate::{
    property_value, ComputedProperty, Element, HostExt, HostRef, Observable, PropertyValue,
    StreamError,
};

type DeriveFn = dyn Fn(&HostRef) -> PropertyValue + Send + Sync;

/// Computed property returned by [`rx_map`], [`rx_filter`] and [`rx_scan`].
///
/// It depends on its source property, so the host derives a fresh observable
/// whenever the source changes and caches it in between.
pub struct RxDerived {
    source: String,
    derive: Box<DeriveFn>,
}

impl RxDerived {
    fn new<U, F>(source: String, derive: F) -> Self
    where
        U: Send + 'static,
        F: Fn(&HostRef, &str) -> Observable<U> + Send + Sync + 'static,
    {
        let name = source.clone();
        Self {
            source,
            derive: Box::new(move |host| property_value(derive(host, &name))),
        }
    }
}

impl ComputedProperty for RxDerived {
    fn dependencies(&self) -> &[String] {
        std::slice::from_ref(&self.source)
    }

    fn get(&self, host: &HostRef, _key: &str) -> Option<PropertyValue> {
        Some((self.derive)(host))
    }
}

/// Reads `source` as an observable.
///
/// An absent or mistyped source is not checked up front; the observable
/// fails with [`StreamError::SourceUnavailable`] once subscribed.
fn source_observable<S: Send + 'static>(host: &HostRef, source: &str) -> Observable<S> {
    host.get_observable::<S>(source).unwrap_or_else(|| {
        Observable::throw(StreamError::SourceUnavailable {
            property: source.to_string(),
        })
    })
}

/// Declares a property holding `source` with every value passed through
/// `transform`.
///
/// `transform` receives the owning object as its first argument.
pub fn rx_map<S, U, F>(source: impl Into<String>, transform: F) -> RxDerived
where
    S: Send + 'static,
    U: Send + 'static,
    F: Fn(&HostRef, S) -> U + Send + Sync + 'static,
{
    let transform = Arc::new(transform);
    RxDerived::new(source.into(), move |host, source| {
        let owner = Arc::downgrade(host);
        let transform = Arc::clone(&transform);
        source_observable::<S>(host, source).try_map(move |value| {
            let host = owner.upgrade().ok_or(StreamError::Detached)?;
            Ok(transform(&host, value))
        })
    })
}

/// Declares a property holding the values of `source` for which `predicate`
/// returns true.
pub fn rx_filter<S, F>(source: impl Into<String>, predicate: F) -> RxDerived
where
    S: Send + 'static,
    F: Fn(&HostRef, &S) -> bool + Send + Sync + 'static,
{
    let predicate = Arc::new(predicate);
    RxDerived::new(source.into(), move |host, source| {
        let owner = Arc::downgrade(host);
        let predicate = Arc::clone(&predicate);
        source_observable::<S>(host, source).try_filter(move |value| {
            let host = owner.upgrade().ok_or(StreamError::Detached)?;
            Ok(predicate(&host, value))
        })
    })
}

/// Declares a property holding the running fold of `source`, starting from
/// `seed`. Every intermediate accumulation is emitted.
pub fn rx_scan<S, A, F>(source: impl Into<String>, seed: A, accumulate: F) -> RxDerived
where
    S: Send + 'static,
    A: Element,
    F: Fn(&HostRef, A, S) -> A + Send + Sync + 'static,
{
    let accumulate = Arc::new(accumulate);
    RxDerived::new(source.into(), move |host, source| {
        let owner = Arc::downgrade(host);
        let accumulate = Arc::clone(&accumulate);
        source_observable::<S>(host, source).try_scan(seed.clone(), move |acc, value| {
            let host = owner.upgrade().ok_or(StreamError::Detached)?;
            Ok(accumulate(&host, acc, value))
        })
    })
}
