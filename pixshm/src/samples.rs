//! Typed views over the sample array.
//!
//! A typed view is handed out only when the requested type's canonical tag
//! equals the element type stored in the header. A mismatch yields `None`
//! rather than an unchecked reinterpretation.

use crate::element::Sample;
use crate::region::Region;

impl Region {
    /// Raw sample bytes.
    pub fn sample_bytes(&self) -> &[u8] {
        let layout = self.layout();
        // SAFETY: samples_offset + samples_len <= mapped length (checked at construction).
        unsafe {
            std::slice::from_raw_parts(
                self.map().as_ptr().add(layout.samples_offset),
                layout.samples_len,
            )
        }
    }

    /// Mutable raw sample bytes.
    pub fn sample_bytes_mut(&mut self) -> &mut [u8] {
        let layout = *self.layout();
        // SAFETY: as above, with the handle borrowed exclusively.
        unsafe {
            std::slice::from_raw_parts_mut(
                self.map().as_mut_ptr().add(layout.samples_offset),
                layout.samples_len,
            )
        }
    }

    /// Samples viewed as `T`, or `None` if `T` does not match the region's
    /// element type.
    pub fn samples_as<T: Sample>(&self) -> Option<&[T]> {
        let ptr = self.typed_samples_ptr::<T>()?;
        // SAFETY: tag check guarantees width(T) * sample_count == samples_len,
        // the pointer is aligned and T accepts every bit pattern.
        Some(unsafe { std::slice::from_raw_parts(ptr, self.sample_count()) })
    }

    /// Mutable samples viewed as `T`, or `None` on element type mismatch.
    pub fn samples_as_mut<T: Sample>(&mut self) -> Option<&mut [T]> {
        let ptr = self.typed_samples_ptr::<T>()?;
        // SAFETY: as in `samples_as`, with the handle borrowed exclusively.
        Some(unsafe { std::slice::from_raw_parts_mut(ptr, self.sample_count()) })
    }

    fn typed_samples_ptr<T: Sample>(&self) -> Option<*mut T> {
        if self.header().element_tag() != T::ELEMENT_TYPE.tag()
            || self.layout().element_tag != T::ELEMENT_TYPE.tag()
        {
            return None;
        }
        // SAFETY: samples_offset lies inside the mapping.
        let ptr = unsafe { self.map().as_mut_ptr().add(self.layout().samples_offset) } as *mut T;
        debug_assert_eq!(ptr.align_offset(std::mem::align_of::<T>()), 0);
        Some(ptr)
    }
}
