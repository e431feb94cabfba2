//! Low-level primitives for publishing region references.
//!
//! This is the only module in the workspace allowed to contain `unsafe`
//! code. It holds a single `unsafe` block, with a mandatory `// SAFETY:`
//! comment.

#![allow(unsafe_code)]

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// An atomically replaceable `Option<&'h R>`.
///
/// Arenas publish their active region through one of these so that
/// lock-free allocators can pick it up with a single load.
pub(crate) struct AtomicRegionRef<'h, R> {
    ptr: AtomicPtr<R>,
    _marker: PhantomData<&'h R>,
}

impl<'h, R> AtomicRegionRef<'h, R> {
    pub(crate) fn null() -> Self {
        Self {
            ptr: AtomicPtr::new(ptr::null_mut()),
            _marker: PhantomData,
        }
    }

    pub(crate) fn load(&self, order: Ordering) -> Option<&'h R> {
        let ptr = self.ptr.load(order);
        // SAFETY: `store` is the only writer and it only ever stores null or
        // a pointer obtained from a `&'h R`, so any non-null value points to
        // an `R` that stays alive and immutably borrowed for `'h`.
        unsafe { ptr.as_ref() }
    }

    pub(crate) fn store(&self, region: Option<&'h R>, order: Ordering) {
        let ptr = region.map_or(ptr::null_mut(), |r| ptr::from_ref(r).cast_mut());
        self.ptr.store(ptr, order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_null() {
        let slot: AtomicRegionRef<'_, u32> = AtomicRegionRef::null();
        assert!(slot.load(Ordering::Acquire).is_none());
    }

    #[test]
    fn store_and_load_preserve_identity() {
        let a = 1u32;
        let b = 1u32;
        let slot = AtomicRegionRef::null();
        slot.store(Some(&a), Ordering::Release);
        let loaded = slot.load(Ordering::Acquire).unwrap();
        assert!(ptr::eq(loaded, &a));
        assert!(!ptr::eq(loaded, &b));
        slot.store(None, Ordering::Release);
        assert!(slot.load(Ordering::Acquire).is_none());
    }
}
