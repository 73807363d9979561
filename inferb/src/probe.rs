//! The probe array: one cache line per possible byte value.
//!
//! Slot `i` is the first byte of the `i`-th `spacing` sized block of a private
//! anonymous mapping. The mapping is page aligned and `spacing` is at least a
//! cache line, so no two slots share a line.
use std::ffi::c_void;
use std::ops::Range;
use std::ptr::{self, NonNull};

use rustix::io::Errno;
use rustix::mm::{self, MapFlags, ProtFlags};

use crate::error::{InferError, Result};
use crate::platform::CACHE_LINE_SIZE;

#[derive(Debug)]
pub struct ProbeArray {
    base: NonNull<u8>,
    len: usize,
    slot_count: usize,
    spacing: usize,
}

impl ProbeArray {
    /// Maps `slot_count * spacing` bytes and populates every slot.
    ///
    /// Failing to map is fatal for the measurement and is not retried.
    pub fn allocate(slot_count: usize, spacing: usize) -> Result<Self> {
        let len = slot_count
            .checked_mul(spacing)
            .ok_or(InferError::ProbeTooLarge {
                slot_count,
                spacing,
            })?;

        let raw = unsafe {
            mm::mmap_anonymous(
                ptr::null_mut(),
                len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::PRIVATE,
            )
        }
        .map_err(|source| InferError::ProbeAllocation { len, source })?;
        let base = NonNull::new(raw as *mut u8).ok_or(InferError::ProbeAllocation {
            len,
            source: Errno::NOMEM,
        })?;

        let array = Self {
            base,
            len,
            slot_count,
            spacing,
        };
        array.populate();
        Ok(array)
    }

    // Untouched anonymous pages all read from the same zero page, which would
    // put every slot on one physical line. Writing gives each slot its own.
    fn populate(&self) {
        for index in 0..self.slot_count {
            unsafe {
                ptr::write_volatile(self.base.as_ptr().add(index * self.spacing), 1);
            }
        }
    }

    /// Address of the distinguishing byte of slot `index`.
    ///
    /// # Panics
    ///
    /// If `index` is not below `slot_count`.
    #[inline(always)]
    pub fn slot(&self, index: usize) -> *const u8 {
        assert!(index < self.slot_count, "slot {} out of range", index);
        unsafe { self.base.as_ptr().add(index * self.spacing) }
    }

    /// Address range of the cache line holding slot `index`.
    pub fn slot_line(&self, index: usize) -> Range<usize> {
        let start = self.slot(index) as usize & !(CACHE_LINE_SIZE - 1);
        start..start + CACHE_LINE_SIZE
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.base.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }
}

impl Drop for ProbeArray {
    fn drop(&mut self) {
        if let Err(e) = unsafe { mm::munmap(self.base.as_ptr() as *mut c_void, self.len) } {
            log::warn!("could not unmap probe array at {:?}: {}", self.base, e);
        }
    }
}
