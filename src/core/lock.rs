//! A reader-writer lock with a single upgradeable reader slot.
//!
//! The lock has four states: unlocked, shared, shared-upgradeable and
//! exclusive. Any number of shared readers may coexist with at most one
//! upgradeable reader. The upgradeable slot is a separate reservation mutex,
//! so a reader that intends to write later never deadlocks against another
//! would-be writer: writers take the same reservation before asking for
//! exclusivity.
//!
//! Upgrading waits until every plain reader has left. New readers may still
//! come and go while the upgrade is pending.

use parking_lot::lock_api::{GuardNoSend, RawMutex as _};
use parking_lot::{Condvar, Mutex, RawMutex};
use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};

#[derive(Debug, Default)]
struct LockState {
    /// Shared holders, the upgradeable one included
    readers: usize,
    exclusive: bool,
}

/// A four-state upgradeable reader-writer lock
pub struct UpgradeableLock<T: ?Sized> {
    state: Mutex<LockState>,
    changed: Condvar,
    reservation: RawMutex,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for UpgradeableLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for UpgradeableLock<T> {}

impl<T> UpgradeableLock<T> {
    /// Creates a new unlocked lock
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            changed: Condvar::new(),
            reservation: RawMutex::INIT,
            data: UnsafeCell::new(value),
        }
    }

    /// Consumes the lock and returns the value
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> UpgradeableLock<T> {
    /// Returns a mutable reference to the value; no locking is needed
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    fn acquire_shared(&self) {
        let mut state = self.state.lock();
        while state.exclusive {
            self.changed.wait(&mut state);
        }
        state.readers += 1;
    }

    fn try_acquire_shared(&self) -> bool {
        let mut state = self.state.lock();
        if state.exclusive {
            return false;
        }
        state.readers += 1;
        true
    }

    fn release_shared(&self) {
        let mut state = self.state.lock();
        state.readers -= 1;
        if state.readers == 0 {
            self.changed.notify_all();
        }
    }

    fn acquire_exclusive(&self) {
        let mut state = self.state.lock();
        while state.exclusive || state.readers > 0 {
            self.changed.wait(&mut state);
        }
        state.exclusive = true;
    }

    fn release_exclusive(&self, keep_shared: bool) {
        let mut state = self.state.lock();
        state.exclusive = false;
        if keep_shared {
            state.readers += 1;
        }
        self.changed.notify_all();
    }

    /// Releases the reservation.
    ///
    /// # Safety
    /// The calling guard must own the reservation.
    unsafe fn release_reservation(&self) {
        self.reservation.unlock();
    }

    /// Shared access; blocks while a writer holds the lock
    pub fn read(&self) -> SharedGuard<'_, T> {
        self.acquire_shared();
        SharedGuard { lock: self }
    }

    /// Shared access if no writer holds the lock
    pub fn try_read(&self) -> Option<SharedGuard<'_, T>> {
        self.try_acquire_shared().then(|| SharedGuard { lock: self })
    }

    /// Shared access with the right to upgrade later; at most one holder at a time
    pub fn upgradeable_read(&self) -> UpgradeableGuard<'_, T> {
        self.reservation.lock();
        self.acquire_shared();
        UpgradeableGuard::new(self)
    }

    /// Upgradeable access if the reservation is free and no writer holds the lock
    pub fn try_upgradeable_read(&self) -> Option<UpgradeableGuard<'_, T>> {
        if !self.reservation.try_lock() {
            return None;
        }
        if !self.try_acquire_shared() {
            // SAFETY: taken just above
            unsafe { self.release_reservation() };
            return None;
        }
        Some(UpgradeableGuard::new(self))
    }

    /// Exclusive access; takes the reservation, then waits for readers to leave
    pub fn write(&self) -> ExclusiveGuard<'_, T> {
        self.reservation.lock();
        self.acquire_exclusive();
        ExclusiveGuard::new(self)
    }

    /// Exclusive access if the lock is entirely free
    pub fn try_write(&self) -> Option<ExclusiveGuard<'_, T>> {
        if !self.reservation.try_lock() {
            return None;
        }
        let mut state = self.state.lock();
        if state.exclusive || state.readers > 0 {
            drop(state);
            // SAFETY: taken just above
            unsafe { self.release_reservation() };
            return None;
        }
        state.exclusive = true;
        Some(ExclusiveGuard::new(self))
    }
}

impl<T: Default> Default for UpgradeableLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for UpgradeableLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_read() {
            Some(guard) => f.debug_struct("UpgradeableLock").field("data", &&*guard).finish(),
            None => f.debug_struct("UpgradeableLock").field("data", &"<locked>").finish(),
        }
    }
}

/// Plain shared access
pub struct SharedGuard<'a, T: ?Sized> {
    lock: &'a UpgradeableLock<T>,
}

impl<T: ?Sized> Deref for SharedGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: no exclusive guard exists while a shared one does
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for SharedGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_shared();
    }
}

/// Shared access holding the upgrade reservation.
///
/// Not `Send`: the reservation mutex must be released on the thread that took it.
///
/// ```compile_fail
/// use rigid_tick::core::UpgradeableLock;
///
/// let lock = std::sync::Arc::new(UpgradeableLock::new(0));
/// let guard = lock.upgradeable_read();
/// std::thread::scope(|scope| {
///     scope.spawn(move || drop(guard));
/// });
/// ```
pub struct UpgradeableGuard<'a, T: ?Sized> {
    lock: &'a UpgradeableLock<T>,
    _marker: PhantomData<GuardNoSend>,
}

impl<'a, T: ?Sized> UpgradeableGuard<'a, T> {
    fn new(lock: &'a UpgradeableLock<T>) -> Self {
        Self {
            lock,
            _marker: PhantomData,
        }
    }

    /// Waits for every plain reader to leave and turns into exclusive access
    pub fn upgrade(self) -> ExclusiveGuard<'a, T> {
        let lock = self.lock;
        mem::forget(self);
        {
            let mut state = lock.state.lock();
            state.readers -= 1;
            while state.readers > 0 || state.exclusive {
                lock.changed.wait(&mut state);
            }
            state.exclusive = true;
        }
        ExclusiveGuard::new(lock)
    }

    /// Gives up the reservation, keeping plain shared access
    pub fn downgrade(self) -> SharedGuard<'a, T> {
        let lock = self.lock;
        mem::forget(self);
        // SAFETY: this guard owned the reservation
        unsafe { lock.release_reservation() };
        SharedGuard { lock }
    }
}

impl<T: ?Sized> Deref for UpgradeableGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: no exclusive guard exists while a shared one does
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for UpgradeableGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_shared();
        // SAFETY: this guard owns the reservation
        unsafe { self.lock.release_reservation() };
    }
}

/// Exclusive access; always holds the upgrade reservation.
///
/// ```compile_fail
/// use rigid_tick::core::UpgradeableLock;
///
/// let lock = UpgradeableLock::new(0);
/// let guard = lock.write();
/// std::thread::scope(|scope| {
///     scope.spawn(move || drop(guard));
/// });
/// ```
pub struct ExclusiveGuard<'a, T: ?Sized> {
    lock: &'a UpgradeableLock<T>,
    _marker: PhantomData<GuardNoSend>,
}

impl<'a, T: ?Sized> ExclusiveGuard<'a, T> {
    fn new(lock: &'a UpgradeableLock<T>) -> Self {
        Self {
            lock,
            _marker: PhantomData,
        }
    }

    /// Lets readers back in while keeping the reservation
    pub fn downgrade(self) -> UpgradeableGuard<'a, T> {
        let lock = self.lock;
        mem::forget(self);
        lock.release_exclusive(true);
        UpgradeableGuard::new(lock)
    }

    /// Lets readers back in and releases the reservation for another upgrader
    pub fn final_downgrade(self) -> SharedGuard<'a, T> {
        let lock = self.lock;
        mem::forget(self);
        lock.release_exclusive(true);
        // SAFETY: this guard owned the reservation
        unsafe { lock.release_reservation() };
        SharedGuard { lock }
    }
}

impl<T: ?Sized> Deref for ExclusiveGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: this guard is the only accessor
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for ExclusiveGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: this guard is the only accessor
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for ExclusiveGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_exclusive(false);
        // SAFETY: this guard owns the reservation
        unsafe { self.lock.release_reservation() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_readers_share() {
        let lock = UpgradeableLock::new(5);
        let a = lock.read();
        let b = lock.read();
        let c = lock.upgradeable_read();
        assert_eq!(*a + *b + *c, 15);
        assert!(lock.try_write().is_none());
    }

    #[test]
    fn test_single_upgradeable_holder() {
        let lock = UpgradeableLock::new(());
        let first = lock.upgradeable_read();
        assert!(lock.try_upgradeable_read().is_none());
        assert!(lock.try_read().is_some());
        drop(first);
        assert!(lock.try_upgradeable_read().is_some());
    }

    #[test]
    fn test_write_excludes_everyone() {
        let lock = UpgradeableLock::new(0);
        {
            let mut guard = lock.write();
            *guard = 7;
            assert!(lock.try_read().is_none());
            assert!(lock.try_upgradeable_read().is_none());
            assert!(lock.try_write().is_none());
        }
        assert_eq!(*lock.read(), 7);
    }

    #[test]
    fn test_downgrade_keeps_reservation() {
        let lock = UpgradeableLock::new(1);
        let mut exclusive = lock.upgradeable_read().upgrade();
        *exclusive += 1;
        let upgradeable = exclusive.downgrade();
        assert!(lock.try_read().is_some());
        assert!(lock.try_upgradeable_read().is_none());
        assert_eq!(*upgradeable, 2);

        let shared = upgradeable.upgrade().final_downgrade();
        assert!(lock.try_upgradeable_read().is_some());
        assert_eq!(*shared, 2);
    }

    #[test]
    fn test_upgrade_waits_for_readers() {
        let lock = Arc::new(UpgradeableLock::new(0));
        let reader = lock.read();
        let upgraded = Arc::new(AtomicBool::new(false));

        let handle = {
            let lock = Arc::clone(&lock);
            let upgraded = Arc::clone(&upgraded);
            thread::spawn(move || {
                let mut guard = lock.upgradeable_read().upgrade();
                upgraded.store(true, Ordering::SeqCst);
                *guard += 1;
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!upgraded.load(Ordering::SeqCst));

        // Readers may still come and go while the upgrade is pending
        let extra = lock.try_read();
        assert!(extra.is_some());
        drop(extra);

        drop(reader);
        handle.join().unwrap();
        assert!(upgraded.load(Ordering::SeqCst));
        assert_eq!(*lock.read(), 1);
    }

    #[test]
    fn test_into_inner() {
        let mut lock = UpgradeableLock::new(vec![1, 2]);
        lock.get_mut().push(3);
        assert_eq!(lock.into_inner(), vec![1, 2, 3]);
    }
}
