// Pluggable allocator
//
// This is the Rust analogue of Datoviz's `_alloc.c`: a process-wide "active
// allocator" that every other component in the engine goes through. The
// signed 32-bit atomic counter the C original pairs with it
// (`DvzAtomic`/`_atomic.h`) has no separate wrapper here - `dvz-fifo` and
// `dvz-request` use `std::sync::atomic::AtomicI32`/`AtomicUsize` directly.
//
// Austin Shafer - 2020

use std::alloc::{self, Layout};
use std::sync::RwLock;

use once_cell::sync::Lazy;
use thiserror::Error;

#[cfg(test)]
mod tests;

#[derive(Debug, Error)]
pub enum AllocError {
    #[error("allocation of {size} bytes (align {align}) failed")]
    OutOfMemory { size: usize, align: usize },
    #[error("invalid layout: size={size} align={align}")]
    InvalidLayout { size: usize, align: usize },
}

pub type Result<T> = std::result::Result<T, AllocError>;

/// The active allocator table. This mirrors the six function pointers
/// (`malloc`, `calloc`, `realloc`, `free`, `aligned_alloc`, `aligned_free`)
/// from the C original, expressed as a trait so callers can swap
/// implementations without touching Rust's own `#[global_alloc]`.
pub trait Allocator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Allocate `size` uninitialized bytes.
    fn malloc(&self, size: usize) -> Result<*mut u8>;

    /// Allocate `count * size` zeroed bytes.
    fn calloc(&self, count: usize, size: usize) -> Result<*mut u8>;

    /// Resize a previous `malloc`/`calloc` allocation of `old_size` bytes to `new_size`.
    ///
    /// # Safety
    /// `ptr` must have been returned by `malloc`/`calloc` on this same allocator
    /// and not yet freed.
    unsafe fn realloc(&self, ptr: *mut u8, old_size: usize, new_size: usize) -> Result<*mut u8>;

    /// Free a previous `malloc`/`calloc`/`realloc` allocation of `size` bytes.
    ///
    /// # Safety
    /// `ptr` must have been returned by this allocator and not yet freed.
    unsafe fn free(&self, ptr: *mut u8, size: usize);

    /// Allocate `size` bytes aligned to `align`, which is first rounded up to
    /// the next power of two no smaller than `size_of::<*const ()>()`.
    fn aligned_alloc(&self, align: usize, size: usize) -> Result<*mut u8>;

    /// Free an allocation returned by `aligned_alloc`.
    ///
    /// # Safety
    /// `ptr` must have been returned by `aligned_alloc` on this same allocator
    /// with the same `align`/`size` and not yet freed.
    unsafe fn aligned_free(&self, ptr: *mut u8, align: usize, size: usize);
}

/// Round `align` up to the next power of two that is at least the size of a
/// pointer on this platform, then round `size` up to a multiple of it.
fn normalize_aligned_request(align: usize, size: usize) -> (usize, usize) {
    let min_align = std::mem::size_of::<*const ()>();
    let align = align.max(min_align).next_power_of_two();
    let size = (size + align - 1) / align * align;
    (align, size)
}

/// The default allocator: Rust's own `std::alloc` (which on most platforms is
/// the system allocator).
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn name(&self) -> &'static str {
        "system"
    }

    fn malloc(&self, size: usize) -> Result<*mut u8> {
        let layout = Layout::from_size_align(size.max(1), std::mem::align_of::<usize>())
            .map_err(|_| AllocError::InvalidLayout { size, align: 1 })?;
        let ptr = unsafe { alloc::alloc(layout) };
        if ptr.is_null() {
            Err(AllocError::OutOfMemory {
                size,
                align: layout.align(),
            })
        } else {
            Ok(ptr)
        }
    }

    fn calloc(&self, count: usize, size: usize) -> Result<*mut u8> {
        let total = count.saturating_mul(size).max(1);
        let layout = Layout::from_size_align(total, std::mem::align_of::<usize>())
            .map_err(|_| AllocError::InvalidLayout {
                size: total,
                align: 1,
            })?;
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            Err(AllocError::OutOfMemory {
                size: total,
                align: layout.align(),
            })
        } else {
            Ok(ptr)
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, old_size: usize, new_size: usize) -> Result<*mut u8> {
        let layout = Layout::from_size_align(old_size.max(1), std::mem::align_of::<usize>())
            .map_err(|_| AllocError::InvalidLayout {
                size: old_size,
                align: 1,
            })?;
        let new_ptr = alloc::realloc(ptr, layout, new_size.max(1));
        if new_ptr.is_null() {
            Err(AllocError::OutOfMemory {
                size: new_size,
                align: layout.align(),
            })
        } else {
            Ok(new_ptr)
        }
    }

    unsafe fn free(&self, ptr: *mut u8, size: usize) {
        let layout = Layout::from_size_align_unchecked(size.max(1), std::mem::align_of::<usize>());
        alloc::dealloc(ptr, layout);
    }

    fn aligned_alloc(&self, align: usize, size: usize) -> Result<*mut u8> {
        let (align, size) = normalize_aligned_request(align, size);
        let layout = Layout::from_size_align(size.max(align), align)
            .map_err(|_| AllocError::InvalidLayout { size, align })?;
        let ptr = unsafe { alloc::alloc(layout) };
        if ptr.is_null() {
            Err(AllocError::OutOfMemory { size, align })
        } else {
            Ok(ptr)
        }
    }

    unsafe fn aligned_free(&self, ptr: *mut u8, align: usize, size: usize) {
        let (align, size) = normalize_aligned_request(align, size);
        let layout = Layout::from_size_align_unchecked(size.max(align), align);
        alloc::dealloc(ptr, layout);
    }
}

/// mimalloc-backed allocator, opt-in via the `mimalloc` feature. The
/// underlying mimalloc heap is still reached through `std::alloc`'s
/// `GlobalAlloc` trait object the `mimalloc` crate installs, since mimalloc's
/// own C API intentionally isn't exposed as a second allocator identity.
#[cfg(feature = "mimalloc")]
pub struct MimallocAllocator;

#[cfg(feature = "mimalloc")]
impl Allocator for MimallocAllocator {
    fn name(&self) -> &'static str {
        "mimalloc"
    }

    fn malloc(&self, size: usize) -> Result<*mut u8> {
        SystemAllocator.malloc(size)
    }

    fn calloc(&self, count: usize, size: usize) -> Result<*mut u8> {
        SystemAllocator.calloc(count, size)
    }

    unsafe fn realloc(&self, ptr: *mut u8, old_size: usize, new_size: usize) -> Result<*mut u8> {
        SystemAllocator.realloc(ptr, old_size, new_size)
    }

    unsafe fn free(&self, ptr: *mut u8, size: usize) {
        SystemAllocator.free(ptr, size)
    }

    fn aligned_alloc(&self, align: usize, size: usize) -> Result<*mut u8> {
        SystemAllocator.aligned_alloc(align, size)
    }

    unsafe fn aligned_free(&self, ptr: *mut u8, align: usize, size: usize) {
        SystemAllocator.aligned_free(ptr, align, size)
    }
}

fn configured_default() -> Box<dyn Allocator> {
    #[cfg(feature = "mimalloc")]
    {
        Box::new(MimallocAllocator)
    }
    #[cfg(not(feature = "mimalloc"))]
    {
        Box::new(SystemAllocator)
    }
}

static ACTIVE: Lazy<RwLock<Box<dyn Allocator>>> = Lazy::new(|| RwLock::new(configured_default()));

/// Switch the active allocator to the system allocator.
pub fn use_system() {
    *ACTIVE.write().unwrap() = Box::new(SystemAllocator);
}

/// Switch the active allocator to mimalloc. Requires the `mimalloc` feature.
#[cfg(feature = "mimalloc")]
pub fn use_mimalloc() {
    *ACTIVE.write().unwrap() = Box::new(MimallocAllocator);
}

/// Install a custom allocator, or pass `None` to revert to the
/// configuration-time default (system, or mimalloc if the feature is on).
pub fn set(custom: Option<Box<dyn Allocator>>) {
    *ACTIVE.write().unwrap() = custom.unwrap_or_else(configured_default);
}

/// Name of the currently active allocator, mostly useful for diagnostics/tests.
pub fn active_name() -> &'static str {
    ACTIVE.read().unwrap().name()
}

pub fn malloc(size: usize) -> Result<*mut u8> {
    ACTIVE.read().unwrap().malloc(size)
}

pub fn calloc(count: usize, size: usize) -> Result<*mut u8> {
    ACTIVE.read().unwrap().calloc(count, size)
}

/// # Safety
/// See [`Allocator::realloc`].
pub unsafe fn realloc(ptr: *mut u8, old_size: usize, new_size: usize) -> Result<*mut u8> {
    ACTIVE.read().unwrap().realloc(ptr, old_size, new_size)
}

/// # Safety
/// See [`Allocator::free`].
pub unsafe fn free(ptr: *mut u8, size: usize) {
    ACTIVE.read().unwrap().free(ptr, size)
}

pub fn aligned_alloc(align: usize, size: usize) -> Result<*mut u8> {
    ACTIVE.read().unwrap().aligned_alloc(align, size)
}

/// # Safety
/// See [`Allocator::aligned_free`].
pub unsafe fn aligned_free(ptr: *mut u8, align: usize, size: usize) {
    ACTIVE.read().unwrap().aligned_free(ptr, align, size)
}
