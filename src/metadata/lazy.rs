//! Deferred, cached computation of expensive metadata substructures.
//!
//! Directory headers and owned table entries expose fields whose decode cost is only
//! worth paying on access (parsing a nested header, walking a blob). [`LazyValue`]
//! holds either a pending initializer or the computed value, forcing the initializer
//! at most once and caching the result for all later reads. Values can also be
//! assigned directly, which discards any pending initializer.

use std::sync::Mutex;

use crate::{Error, Result};

enum LazyState<T> {
    Pending(Box<dyn FnOnce() -> Result<T> + Send>),
    Ready(T),
    Failed(String),
}

/// A value computed on first access and cached afterwards.
///
/// The initializer runs at most once; if it fails, the failure is returned as-is and
/// its message is cached, so every later [`LazyValue::get`] keeps failing.
/// [`LazyValue::set`] replaces whatever state is held, pending or computed.
pub struct LazyValue<T> {
    state: Mutex<LazyState<T>>,
}

impl<T: Clone> LazyValue<T> {
    /// Create a lazy value that will run `init` on first access.
    pub fn new(init: impl FnOnce() -> Result<T> + Send + 'static) -> Self {
        LazyValue {
            state: Mutex::new(LazyState::Pending(Box::new(init))),
        }
    }

    /// Create a lazy value that is already computed.
    pub fn with_value(value: T) -> Self {
        LazyValue {
            state: Mutex::new(LazyState::Ready(value)),
        }
    }

    /// Returns the value, running the initializer if it has not run yet.
    ///
    /// # Errors
    /// Returns the initializer's error unchanged on the run that fails; repeated
    /// access after a failed initialization surfaces the cached failure message.
    /// Returns [`crate::Error::LockError`] if the internal lock is poisoned.
    pub fn get(&self) -> Result<T> {
        let mut state = self.state.lock().map_err(|_| Error::LockError)?;

        if let LazyState::Pending(_) = &*state {
            let LazyState::Pending(init) = std::mem::replace(
                &mut *state,
                LazyState::Failed("Initialization in progress".to_string()),
            ) else {
                unreachable!()
            };

            match init() {
                Ok(value) => *state = LazyState::Ready(value),
                Err(error) => {
                    // Later reads get the message; the first one keeps the variant
                    *state = LazyState::Failed(error.to_string());
                    return Err(error);
                }
            }
        }

        match &*state {
            LazyState::Ready(value) => Ok(value.clone()),
            LazyState::Failed(message) => Err(Error::Error(message.clone())),
            LazyState::Pending(_) => unreachable!(),
        }
    }

    /// Assigns a value directly, discarding any pending initializer or cached result.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the internal lock is poisoned.
    pub fn set(&self, value: T) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| Error::LockError)?;
        *state = LazyState::Ready(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn initializer_runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counted = counter.clone();
        let lazy = LazyValue::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        });

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(lazy.get().unwrap(), 42);
        assert_eq!(lazy.get().unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_is_cached() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counted = counter.clone();
        let lazy: LazyValue<u32> = LazyValue::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
            Err(crate::Error::OutOfBounds)
        });

        assert!(lazy.get().is_err());
        assert!(lazy.get().is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn first_failure_keeps_its_variant() {
        let lazy: LazyValue<u32> = LazyValue::new(|| {
            Err(malformed_error!("bad substructure"))
        });

        assert!(matches!(
            lazy.get(),
            Err(Error::Malformed { message, .. }) if message == "bad substructure"
        ));
        assert!(matches!(
            lazy.get(),
            Err(Error::Error(message)) if message.contains("bad substructure")
        ));
    }

    #[test]
    fn set_discards_initializer() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counted = counter.clone();
        let lazy = LazyValue::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        });

        lazy.set(7).unwrap();
        assert_eq!(lazy.get().unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn set_overwrites_cached() {
        let lazy = LazyValue::with_value(1);
        assert_eq!(lazy.get().unwrap(), 1);
        lazy.set(2).unwrap();
        assert_eq!(lazy.get().unwrap(), 2);
    }
}
