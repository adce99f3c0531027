//! Per-block metadata.
//!
//! Every managed block is one contiguous backing allocation laid out as
//!
//! ```text
//! +-----------+---------+--------------------------+
//! | Header    | padding | payload (host bytes)     |
//! +-----------+---------+--------------------------+
//! ^ block                ^ block + PAYLOAD_OFFSET
//! ```
//!
//! so converting between a header and the payload pointer the host holds is a
//! fixed-offset subtraction or addition.

use std::alloc::Layout;
use std::mem;
use std::ptr::NonNull;

/// Alignment of every payload handed to the host.
pub const PAYLOAD_ALIGN: usize = 2 * mem::size_of::<usize>();

/// Byte pattern written over a block before release in diagnostic mode.
pub const SCRUB_BYTE: u8 = 0xFE;

/// Offset from the start of a block to its payload.
pub(crate) const PAYLOAD_OFFSET: usize =
    (mem::size_of::<Header>() + PAYLOAD_ALIGN - 1) & !(PAYLOAD_ALIGN - 1);

/// Number of bytes the collector adds to every allocation.
///
/// Useful for sizing the slots of a pool allocator: a payload of `n` bytes
/// needs a backing block of `n + overhead()` bytes.
#[must_use]
pub const fn overhead() -> usize {
    PAYLOAD_OFFSET
}

/// Intrusive link and mark flag stored in front of each payload.
#[repr(C)]
pub(crate) struct Header {
    /// Next block in the heap's live list.
    pub(crate) next: Option<NonNull<Header>>,
    /// Size of the whole block, header included.
    pub(crate) size: usize,
    pub(crate) marked: bool,
}

impl Header {
    /// Layout of a block carrying a payload of `payload_size` bytes, or `None`
    /// if the total does not fit in a `Layout`.
    pub(crate) fn block_layout(payload_size: usize) -> Option<Layout> {
        let total = payload_size.checked_add(PAYLOAD_OFFSET)?;
        Layout::from_size_align(total, PAYLOAD_ALIGN).ok()
    }

    /// Layout of an existing block from its recorded size.
    ///
    /// # Safety
    ///
    /// `size` must be a size previously produced by [`Header::block_layout`].
    pub(crate) const unsafe fn layout_of(size: usize) -> Layout {
        // SAFETY: the same size/alignment pair was validated at allocation.
        unsafe { Layout::from_size_align_unchecked(size, PAYLOAD_ALIGN) }
    }

    /// Writes a fresh, unmarked header at the start of `block`.
    ///
    /// # Safety
    ///
    /// `block` must be valid for writes of `size` bytes and aligned to
    /// `PAYLOAD_ALIGN`.
    pub(crate) unsafe fn init(
        block: NonNull<u8>,
        size: usize,
        next: Option<NonNull<Self>>,
    ) -> NonNull<Self> {
        let header = block.cast::<Self>();
        // SAFETY: caller guarantees the block is large and aligned enough.
        unsafe {
            header.as_ptr().write(Self {
                next,
                size,
                marked: false,
            });
        }
        header
    }

    /// Payload pointer for a header.
    pub(crate) const fn payload(header: NonNull<Self>) -> NonNull<u8> {
        // SAFETY: every header is followed by its payload in the same block.
        unsafe { header.cast::<u8>().add(PAYLOAD_OFFSET) }
    }

    /// Header owning a payload pointer.
    ///
    /// # Safety
    ///
    /// `payload` must have been returned by [`Header::payload`] for a block
    /// that has not been released.
    pub(crate) const unsafe fn from_payload(payload: NonNull<u8>) -> NonNull<Self> {
        // SAFETY: the header sits `PAYLOAD_OFFSET` bytes before the payload.
        unsafe { payload.sub(PAYLOAD_OFFSET).cast::<Self>() }
    }
}
