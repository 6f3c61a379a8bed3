//! Bounded pool of reusable cipher instances.
//!
//! The pool acts as a counting semaphore over owned instances: [`InstancePool::acquire`]
//! blocks while every instance is checked out, and the returned [`Pooled`] guard
//! puts the instance back when it goes out of scope, including during unwinding.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

pub struct InstancePool<T> {
    idle: Mutex<VecDeque<T>>,
    available: Condvar,
    capacity: usize,
}

impl<T> InstancePool<T> {
    /// Builds a pool owning `instances`. Returns `None` for an empty list, since
    /// such a pool would block every acquisition forever.
    pub fn new(instances: Vec<T>) -> Option<Self> {
        if instances.is_empty() {
            return None;
        }
        let capacity = instances.len();
        Some(Self {
            idle: Mutex::new(instances.into()),
            available: Condvar::new(),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Checks out the least recently returned instance, waiting if none is idle.
    pub fn acquire(&self) -> Pooled<'_, T> {
        let mut idle = self.idle.lock();
        loop {
            if let Some(instance) = idle.pop_front() {
                return Pooled {
                    pool: self,
                    instance: Some(instance),
                };
            }
            trace!(capacity = self.capacity, "all cipher instances busy; waiting");
            self.available.wait(&mut idle);
        }
    }

    fn release(&self, instance: T) {
        self.idle.lock().push_back(instance);
        self.available.notify_one();
    }
}

/// Scoped checkout of one pooled instance.
pub struct Pooled<'a, T> {
    pool: &'a InstancePool<T>,
    instance: Option<T>,
}

impl<T> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.instance.as_ref().expect("pooled instance present until drop")
    }
}

impl<T> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.instance.as_mut().expect("pooled instance present until drop")
    }
}

impl<T> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            self.pool.release(instance);
        }
    }
}
