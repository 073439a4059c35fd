use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Fixed-capacity blocking pool of reusable objects.
///
/// The pool never allocates: it is seeded with exactly `capacity` items via
/// [`BufferPool::release`] and recycles them for the rest of its life.
/// [`BufferPool::acquire`] blocks until an item is available and hands back a
/// [`Pooled`] guard; dropping the guard returns the item, so an item can
/// never be stranded by a stage that dies or a channel that is torn down
/// mid-flight. At all times `outstanding + queued == capacity`.
///
/// Cloning the pool yields another handle to the same storage.
pub struct BufferPool<T> {
    shared: Arc<PoolShared<T>>,
}

struct PoolShared<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
    space: Condvar,
    capacity: usize,
}

impl<T> BufferPool<T> {
    /// Creates an empty pool holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "buffer pool capacity must be at least 1");
        Self {
            shared: Arc::new(PoolShared {
                items: Mutex::new(VecDeque::with_capacity(capacity)),
                available: Condvar::new(),
                space: Condvar::new(),
                capacity,
            }),
        }
    }

    /// Inserts an item, blocking while the pool is full. Used to seed the
    /// pool at construction; afterwards items return through guard drops.
    pub fn release(&self, item: T) {
        let mut items = self.shared.items.lock();
        while items.len() >= self.shared.capacity {
            self.shared.space.wait(&mut items);
        }
        items.push_back(item);
        self.shared.available.notify_one();
    }

    /// Takes an item, blocking while the pool is empty. There is no timeout;
    /// termination is the caller's responsibility (pipeline cancellation
    /// recycles in-flight items, which wakes blocked acquirers).
    pub fn acquire(&self) -> Pooled<T> {
        let mut items = self.shared.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                self.shared.space.notify_one();
                return Pooled {
                    item: Some(item),
                    pool: Arc::clone(&self.shared),
                };
            }
            self.shared.available.wait(&mut items);
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Items currently at rest in the pool.
    pub fn queued(&self) -> usize {
        self.shared.items.lock().len()
    }
}

impl<T> Clone for BufferPool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// An item checked out of a [`BufferPool`]. Returns itself on drop.
pub struct Pooled<T> {
    item: Option<T>,
    pool: Arc<PoolShared<T>>,
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.item {
            Some(item) => item,
            None => unreachable!("pooled item is present until drop"),
        }
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.item {
            Some(item) => item,
            None => unreachable!("pooled item is present until drop"),
        }
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        let Some(item) = self.item.take() else {
            return;
        };
        let mut items = self.pool.items.lock();
        // Space is guaranteed: this item was outstanding. An over-full pool
        // means release() was misused; the extra item is discarded.
        if items.len() < self.pool.capacity {
            items.push_back(item);
            self.pool.available.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn guard_returns_item_on_drop() {
        let pool = BufferPool::new(2);
        pool.release(1u32);
        pool.release(2u32);

        let first = pool.acquire();
        assert_eq!(pool.queued(), 1);
        drop(first);
        assert_eq!(pool.queued(), 2);
    }

    #[test]
    fn acquire_blocks_until_an_item_returns() {
        let pool = BufferPool::new(1);
        pool.release(vec![0u8; 4]);

        let held = pool.acquire();
        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || {
                let item = pool.acquire();
                item.len()
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        drop(held);
        assert_eq!(waiter.join().unwrap(), 4);
    }

    #[test]
    fn outstanding_plus_queued_is_capacity() {
        let pool = BufferPool::new(3);
        for value in 0..3 {
            pool.release(value);
        }

        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(pool.queued(), 1);
        drop(a);
        assert_eq!(pool.queued(), 2);
        drop(b);
        assert_eq!(pool.queued(), 3);
    }

    #[test]
    fn concurrent_churn_preserves_capacity() {
        let pool = BufferPool::new(4);
        for value in 0..4u64 {
            pool.release(value);
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        let item = pool.acquire();
                        std::hint::black_box(*item);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(pool.queued(), 4);
    }
}
