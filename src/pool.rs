//! Object pooling, and the [`ResourcePool`] that hands out recycled [`ScratchAllocator`]s.
//!
//! # Example
//! ```
//! # use helios::prelude::*;
//! # use anyhow::Result;
//! # fn main() -> Result<()> {
//! let settings = AllocatorBuilder::new().scratch_chunk_size(4096u64).build();
//! let (_allocator, pool) = helios::initialize(&settings)?;
//! {
//!     let mut scratch = pool.scratch()?;
//!     scratch.allocate(128u64)?;
//! }
//! // The scratch allocator was reset and returned to the pool.
//! assert_eq!(pool.scratch_pool().idle_count()?, 1);
//! # Ok(())
//! # }
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::allocator::traits::Allocator;
use crate::{AllocatorSettings, DefaultAllocator, Error, ScratchAllocator};

/// Indicates that this object can be pooled in a [`Pool`]
pub trait Poolable {
    /// Called right before the object is released back to the pool, can be used to reset internal state.
    fn on_release(&mut self);

    /// Create a new pooled object from a pool.
    fn new_in_pool(pool: &Pool<Self>) -> Result<Pooled<Self>>
    where
        Self: Sized, {
        let item = pool.with(|pool| pool.get())??;
        Ok(Pooled::from_pool(pool.clone(), item))
    }
}

/// Represents a pooled object. When this is dropped, it's released back to the pool where it can
/// be reused immediately.
pub struct Pooled<P: Poolable> {
    item: Option<P>,
    pool: Pool<P>,
}

type BoxedCreateFunc<P> = Box<dyn Fn() -> Result<P> + Send + Sync>;

struct PoolInner<P: Poolable> {
    items: Vec<P>,
    create_fn: BoxedCreateFunc<P>,
}

/// Represents an object pool that can be allocated from
pub struct Pool<P: Poolable> {
    inner: Arc<Mutex<PoolInner<P>>>,
}

/// Acts as a global resource pool that can safely be shared everywhere.
pub struct ResourcePool<A: Allocator = DefaultAllocator> {
    /// Allocator that backs every pooled resource
    pub allocator: A,
    /// Scratch allocator pool used to easily create scratch memory anywhere
    pub allocators: Pool<ScratchAllocator<A>>,
}

impl<A: Allocator> Clone for ResourcePool<A> {
    fn clone(&self) -> Self {
        Self {
            allocator: self.allocator.clone(),
            allocators: self.allocators.clone(),
        }
    }
}

impl<P: Poolable> Clone for Pool<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: Poolable> Pooled<P> {
    /// Create a new pooled object from a pool and an item
    fn from_pool(pool: Pool<P>, item: P) -> Self {
        Self {
            item: Some(item),
            pool,
        }
    }

    /// Moves the inner value into the closure, which should then return
    /// a new inner value.
    pub fn replace<F: FnOnce(P) -> P>(&mut self, f: F) {
        if let Some(item) = self.item.take() {
            self.item = Some(f(item));
        }
    }
}

impl<P: Poolable> Deref for Pooled<P> {
    type Target = P;

    fn deref(&self) -> &Self::Target {
        match &self.item {
            Some(item) => item,
            None => unreachable!("pooled item is only taken on drop"),
        }
    }
}

impl<P: Poolable> DerefMut for Pooled<P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.item {
            Some(item) => item,
            None => unreachable!("pooled item is only taken on drop"),
        }
    }
}

impl<P: Poolable> Drop for Pooled<P> {
    fn drop(&mut self) {
        // Take the item out of self and release it back to the pool
        let Some(mut item) = self.item.take() else {
            return;
        };
        item.on_release();
        if self.pool.with(|pool| pool.take(item)).is_err() {
            warn!("Pool mutex was poisoned, dropping pooled item instead of recycling it");
        }
    }
}

impl<P: Poolable> PoolInner<P> {
    /// Release an object back into the pool
    fn take(&mut self, item: P) {
        self.items.push(item)
    }

    /// Grab an object from the pool. If there are none left, this will allocate a new one.
    fn get(&mut self) -> Result<P> {
        match self.items.pop() {
            Some(item) => Ok(item),
            None => (self.create_fn)(),
        }
    }
}

impl<P: Poolable> Pool<P> {
    /// Get mutable access to the inner pool
    fn with<F: FnOnce(&mut PoolInner<P>) -> R, R>(&self, f: F) -> Result<R, Error> {
        let mut inner = self.inner.lock()?;
        Ok(f(&mut inner))
    }

    /// Create a new pool. This must be supplied with a callback to be called
    /// when the pool needs to allocate a new object.
    /// Optionally also takes in a count of objects to preallocate using this callback.
    pub fn new(create_fn: impl Fn() -> Result<P> + Send + Sync + 'static, preallocate_count: Option<usize>) -> Result<Self> {
        let alloc_count = preallocate_count.unwrap_or_default();
        let mut items = Vec::with_capacity(alloc_count);
        for _ in 0..alloc_count {
            items.push(create_fn()?);
        }

        let inner = PoolInner {
            items,
            create_fn: Box::new(create_fn),
        };

        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    /// Get an object from the pool, creating a new one if no idle object is left.
    /// # Errors
    /// * Fails if the pool mutex was poisoned.
    /// * Fails if a new object was needed and creating it failed.
    pub fn get(&self) -> Result<Pooled<P>> {
        P::new_in_pool(self)
    }

    /// Number of idle objects waiting in the pool.
    /// # Errors
    /// * Fails if the pool mutex was poisoned.
    pub fn idle_count(&self) -> Result<usize> {
        Ok(self.with(|pool| pool.items.len())?)
    }
}

impl<A: Allocator + 'static> ResourcePool<A> {
    /// Create a new resource pool. Scratch allocators use [`AllocatorSettings::scratch_chunk_size`] as their chunk size,
    /// and [`AllocatorSettings::scratch_preallocate`] of them are created up front.
    /// # Errors
    /// * Fails if preallocating a scratch allocator fails.
    pub fn new(allocator: A, settings: &AllocatorSettings) -> Result<Self> {
        let chunk_size = settings.scratch_chunk_size;
        let source = allocator.clone();
        let allocators = Pool::new(
            move || {
                let mut allocator = source.clone();
                ScratchAllocator::new(&mut allocator, chunk_size)
            },
            Some(settings.scratch_preallocate),
        )?;
        Ok(Self {
            allocator,
            allocators,
        })
    }
}

impl<A: Allocator> ResourcePool<A> {
    /// Get a scratch allocator from the pool. It is reset and returned to the pool when dropped.
    /// # Errors
    /// * Fails if the pool mutex was poisoned.
    /// * Fails if a new scratch allocator was needed and its first chunk could not be allocated.
    pub fn scratch(&self) -> Result<Pooled<ScratchAllocator<A>>> {
        self.allocators.get()
    }

    /// The pool of scratch allocators.
    pub fn scratch_pool(&self) -> &Pool<ScratchAllocator<A>> {
        &self.allocators
    }
}

assert_impl_all!(ResourcePool: Send, Sync, Clone);
