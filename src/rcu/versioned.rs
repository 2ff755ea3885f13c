//! Reference-counted version holder for the read-copy-update pattern.
//!
//! A single writer installs versions with [`Rcu::update`]. Any number of
//! readers lease the current version with [`Rcu::read`] and keep it alive,
//! unmodified, until the lease is returned. A superseded version is handed
//! to the release callback exactly once: when it is no longer current and
//! its last lease has been returned.
//!
//! # Locking
//!
//! All reference counts, the current slot and the idle list sit behind one
//! `parking_lot::Mutex`. It is held for O(1) bookkeeping only; the writer's
//! value construction, the reader's use of the value and the release
//! callback all run outside of it.

use std::cell::UnsafeCell;
use std::fmt;
use std::ops::Deref;
use std::ptr::{self, NonNull};

use parking_lot::Mutex;

/// Called with a version's value once the version is retired and unreferenced.
type ReleaseFn<T> = Box<dyn Fn(T) + Send + Sync>;

/// Container for one version. Allocated once, then recycled through the idle list.
///
/// The value is only written while the item is idle (not current, no leases),
/// so readers never observe a write.
struct Item<T> {
    value: UnsafeCell<Option<T>>,
}

struct State<T> {
    /// Every container ever allocated; indices are stable for the life of the `Rcu`.
    items: Vec<NonNull<Item<T>>>,
    /// Outstanding leases per item.
    refs: Vec<usize>,
    latest: Option<usize>,
    idle: Vec<usize>,
}

impl<T> State<T> {
    fn acquire(&mut self) -> usize {
        if let Some(index) = self.idle.pop() {
            return index;
        }
        let item = Box::new(Item {
            value: UnsafeCell::new(None),
        });
        self.items.push(NonNull::from(Box::leak(item)));
        self.refs.push(0);
        self.items.len() - 1
    }

    /// Retires `index` if it is neither current nor leased, returning its value.
    fn reclaim(&mut self, index: usize) -> Option<T> {
        if self.latest == Some(index) || self.refs[index] > 0 {
            return None;
        }
        debug_assert!(!self.idle.contains(&index), "rcu: item reclaimed twice");
        self.idle.push(index);
        // SAFETY: the item is not current and has no leases, so no reader holds
        // a reference into it and no new lease can be issued for it.
        unsafe { (*self.items[index].as_ref().value.get()).take() }
    }
}

/// Publication primitive: one writer, many concurrent readers.
pub struct Rcu<T> {
    state: Mutex<State<T>>,
    on_release: Option<ReleaseFn<T>>,
}

// SAFETY: values are moved in by the writer and handed out to the release
// callback (possibly on other threads), which needs `T: Send`. Readers on
// many threads share `&T`, which needs `T: Sync`. The raw item pointers are
// owned by the `Rcu` and only dereferenced under the rules documented on `Item`.
unsafe impl<T: Send> Send for Rcu<T> {}
unsafe impl<T: Send + Sync> Sync for Rcu<T> {}

impl<T> Rcu<T> {
    /// Creates an empty `Rcu` that simply drops retired values.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates an empty `Rcu` that passes each retired value to `release`.
    pub fn with_release<F>(release: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::build(Some(Box::new(release)))
    }

    fn build(on_release: Option<ReleaseFn<T>>) -> Self {
        Self {
            state: Mutex::new(State {
                items: Vec::new(),
                refs: Vec::new(),
                latest: None,
                idle: Vec::new(),
            }),
            on_release,
        }
    }

    /// Installs `value` as the current version.
    ///
    /// The superseded version is released right away if nobody is reading it.
    pub fn update(&self, value: T) {
        let retired = {
            let mut state = self.state.lock();
            let index = state.acquire();
            // SAFETY: `acquire` only returns idle items, which no reader can reach.
            unsafe { *state.items[index].as_ref().value.get() = Some(value) };
            let previous = state.latest.replace(index);
            previous.and_then(|previous| state.reclaim(previous))
        };
        self.retire(retired);
    }

    /// Leases the current version, or returns `None` if nothing was published yet.
    ///
    /// The version stays valid until the handle is passed to [`Rcu::read_done`]
    /// or dropped, regardless of how many updates happen meanwhile.
    pub fn read(&self) -> Option<ReadHandle<'_, T>> {
        let mut state = self.state.lock();
        let index = state.latest?;
        state.refs[index] += 1;
        Some(ReadHandle {
            rcu: self,
            index,
            item: state.items[index],
        })
    }

    /// Returns a lease.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was issued by a different `Rcu`.
    pub fn read_done(&self, handle: ReadHandle<'_, T>) {
        assert!(
            ptr::eq(handle.rcu, self),
            "rcu: read handle returned to an instance that did not issue it"
        );
        drop(handle);
    }

    /// Number of versions still alive: the current one plus leased retired ones.
    pub fn versions(&self) -> usize {
        let state = self.state.lock();
        state.items.len() - state.idle.len()
    }

    fn release_lease(&self, index: usize) {
        let retired = {
            let mut state = self.state.lock();
            let refs = &mut state.refs[index];
            assert!(*refs > 0, "rcu: negative reference count");
            *refs -= 1;
            state.reclaim(index)
        };
        self.retire(retired);
    }

    fn retire(&self, retired: Option<T>) {
        if let (Some(value), Some(release)) = (retired, &self.on_release) {
            release(value);
        }
    }
}

impl<T> Default for Rcu<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Rcu<T> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for item in state.items.drain(..) {
            // SAFETY: handles borrow the `Rcu`, so none can outlive it; every
            // pointer came from `Box::leak` in `State::acquire`.
            drop(unsafe { Box::from_raw(item.as_ptr()) });
        }
    }
}

impl<T> fmt::Debug for Rcu<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Rcu")
            .field("items", &state.items.len())
            .field("idle", &state.idle.len())
            .field("latest", &state.latest)
            .finish()
    }
}

/// A read lease on one version. Dereferences to the leased value.
///
/// Dropping the handle returns the lease, so scoped reads release on every
/// exit path.
pub struct ReadHandle<'a, T> {
    rcu: &'a Rcu<T>,
    index: usize,
    item: NonNull<Item<T>>,
}

impl<T> Deref for ReadHandle<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: while this lease is outstanding the item's refcount is
        // non-zero, so the writer never touches its value.
        let value = unsafe { &*self.item.as_ref().value.get() };
        match value {
            Some(value) => value,
            None => unreachable!("rcu: leased item has no value"),
        }
    }
}

impl<T> Drop for ReadHandle<'_, T> {
    fn drop(&mut self) {
        self.rcu.release_lease(self.index);
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadHandle<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadHandle").field(&**self).finish()
    }
}
