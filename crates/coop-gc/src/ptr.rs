//! Typed handle to a managed value.

use std::fmt;
use std::ptr::NonNull;

/// A pointer to a `T` stored in a managed block.
///
/// `Gc<T>` is `Copy` and carries no ownership: the block lives until a
/// collection runs without it having been marked. Reading through a handle is
/// therefore `unsafe`, and the host must make sure every handle it keeps
/// across a collection was marked (directly or through a [`Trace`] edge)
/// since the previous one.
///
/// [`Trace`]: crate::Trace
pub struct Gc<T> {
    ptr: NonNull<T>,
}

impl<T> Gc<T> {
    pub(crate) const fn from_raw(ptr: NonNull<T>) -> Self {
        Self { ptr }
    }

    /// Returns the payload pointer.
    #[must_use]
    pub const fn as_ptr(self) -> NonNull<T> {
        self.ptr
    }

    /// Returns the untyped payload pointer, as accepted by [`Heap::mark`].
    ///
    /// [`Heap::mark`]: crate::Heap::mark
    #[must_use]
    pub const fn erase(self) -> NonNull<u8> {
        self.ptr.cast()
    }

    /// Borrows the managed value.
    ///
    /// # Safety
    ///
    /// The block must not have been swept, and must not be swept while the
    /// returned reference is alive.
    #[must_use]
    pub const unsafe fn get<'a>(self) -> &'a T {
        // SAFETY: caller guarantees the block is live.
        unsafe { self.ptr.as_ref() }
    }

    /// Returns `true` if both handles point to the same block.
    #[must_use]
    pub fn ptr_eq(this: Self, other: Self) -> bool {
        this.ptr == other.ptr
    }
}

impl<T> Clone for Gc<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Gc<T> {}

impl<T> PartialEq for Gc<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(*self, *other)
    }
}

impl<T> Eq for Gc<T> {}

impl<T> fmt::Debug for Gc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Gc").field(&self.ptr).finish()
    }
}

impl<T> fmt::Pointer for Gc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.ptr, f)
    }
}
