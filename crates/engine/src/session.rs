//! Single live engine instance per process.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use crate::cancel::CancellationToken;

/// Owns the lifecycle of one engine instance.
///
/// `get_or_create` hands out the same instance until `teardown`, which
/// cancels the session token, aborts tracked background tasks and clears the
/// listener flag. The next `get_or_create` builds a fresh instance with a
/// fresh token.
///
/// Construct one guard per process and pass it to whoever needs the engine.
pub struct SessionGuard<E> {
    instance: Mutex<Option<Arc<E>>>,
    shutdown: Mutex<CancellationToken>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    listeners_configured: AtomicBool,
}

impl<E> SessionGuard<E> {
    pub fn new() -> Self {
        Self {
            instance: Mutex::new(None),
            shutdown: Mutex::new(CancellationToken::new()),
            tasks: Mutex::new(Vec::new()),
            listeners_configured: AtomicBool::new(false),
        }
    }

    /// Returns the live instance, building it with `factory` on first use.
    ///
    /// The factory receives the session's shutdown token.
    pub fn get_or_create<F>(&self, factory: F) -> Arc<E>
    where
        F: FnOnce(CancellationToken) -> E,
    {
        let mut instance = lock(&self.instance);
        if let Some(existing) = instance.as_ref() {
            return Arc::clone(existing);
        }
        let created = Arc::new(factory(self.shutdown_token()));
        *instance = Some(Arc::clone(&created));
        tracing::debug!("engine instance created");
        created
    }

    /// Like `get_or_create` for factories that can fail. Nothing is stored on
    /// error.
    pub fn try_get_or_create<F, Err>(&self, factory: F) -> Result<Arc<E>, Err>
    where
        F: FnOnce(CancellationToken) -> Result<E, Err>,
    {
        let mut instance = lock(&self.instance);
        if let Some(existing) = instance.as_ref() {
            return Ok(Arc::clone(existing));
        }
        let created = Arc::new(factory(self.shutdown_token())?);
        *instance = Some(Arc::clone(&created));
        tracing::debug!("engine instance created");
        Ok(created)
    }

    /// The live instance, if one exists.
    pub fn get(&self) -> Option<Arc<E>> {
        lock(&self.instance).clone()
    }

    /// Token cancelled by the next `teardown`.
    pub fn shutdown_token(&self) -> CancellationToken {
        lock(&self.shutdown).clone()
    }

    /// Records that listeners are registered. Returns false if they already
    /// were.
    pub fn mark_listeners_configured(&self) -> bool {
        !self.listeners_configured.swap(true, Ordering::SeqCst)
    }

    pub fn is_listeners_configured(&self) -> bool {
        self.listeners_configured.load(Ordering::SeqCst)
    }

    /// Runs `register` only the first time it is called per session.
    pub fn configure_listeners_once<F: FnOnce()>(&self, register: F) -> bool {
        if self.mark_listeners_configured() {
            register();
            true
        } else {
            false
        }
    }

    /// Spawns a background task that `teardown` will abort.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let mut tasks = lock(&self.tasks);
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    /// Number of tracked tasks still running.
    pub fn active_tasks(&self) -> usize {
        lock(&self.tasks).iter().filter(|t| !t.is_finished()).count()
    }

    /// Cancels the session, aborts background tasks and drops the instance.
    ///
    /// Safe to call repeatedly.
    pub fn teardown(&self) {
        let previous = std::mem::take(&mut *lock(&self.shutdown));
        previous.cancel();

        let tasks = std::mem::take(&mut *lock(&self.tasks));
        let aborted = tasks.len();
        for task in tasks {
            task.abort();
        }

        let had_instance = lock(&self.instance).take().is_some();
        self.listeners_configured.store(false, Ordering::SeqCst);
        tracing::info!(had_instance, aborted, "session torn down");
    }
}

impl<E> Default for SessionGuard<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct Instance {
        token: CancellationToken,
    }

    #[test]
    fn test_same_instance_until_teardown() {
        let guard = SessionGuard::new();
        let built = AtomicUsize::new(0);
        let make = |token: CancellationToken| {
            built.fetch_add(1, Ordering::SeqCst);
            Instance { token }
        };

        let a = guard.get_or_create(make);
        let b = guard.get_or_create(make);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(built.load(Ordering::SeqCst), 1);

        guard.teardown();
        assert!(a.token.is_cancelled());
        assert!(guard.get().is_none());

        let c = guard.get_or_create(make);
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(!c.token.is_cancelled());
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_factory_stores_nothing() {
        let guard: SessionGuard<Instance> = SessionGuard::new();
        let result: Result<_, &str> = guard.try_get_or_create(|_| Err("no backend"));
        assert!(result.is_err());
        assert!(guard.get().is_none());
    }

    #[test]
    fn test_listener_registration_is_idempotent() {
        let guard: SessionGuard<Instance> = SessionGuard::new();
        let registered = AtomicUsize::new(0);
        for _ in 0..3 {
            guard.configure_listeners_once(|| {
                registered.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(registered.load(Ordering::SeqCst), 1);
        assert!(guard.is_listeners_configured());
        assert!(!guard.mark_listeners_configured());

        guard.teardown();
        assert!(!guard.is_listeners_configured());
    }

    #[tokio::test]
    async fn test_teardown_aborts_tasks() {
        let guard: SessionGuard<Instance> = SessionGuard::new();
        guard.spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        assert_eq!(guard.active_tasks(), 1);

        guard.teardown();
        guard.teardown();
        tokio::task::yield_now().await;
        assert_eq!(guard.active_tasks(), 0);
    }
}
