//! Region layout calculator.
//!
//! A region is `[Header][Keyword0..KeywordN-1][Sample0..SampleM-1]`. The
//! total size is fully determined by `(N, M, element type)`, which is what
//! lets an attaching process validate a region from its byte length alone.

use crate::element::ElementType;
use crate::header::RegionHeader;
use crate::keyword::KEYWORD_RECORD_SIZE;
use static_assertions::const_assert_eq;

/// Size in bytes of the region header.
pub const HEADER_SIZE: usize = core::mem::size_of::<RegionHeader>();

// Keeps the sample array 8-byte aligned for every keyword count.
const_assert_eq!(HEADER_SIZE % 8, 0);
const_assert_eq!(KEYWORD_RECORD_SIZE % 8, 0);

/// Total region size in bytes. Saturates at `usize::MAX` instead of wrapping.
pub fn compute_size(keyword_count: usize, sample_count: usize, element_type: ElementType) -> usize {
    HEADER_SIZE
        .saturating_add(keyword_count.saturating_mul(KEYWORD_RECORD_SIZE))
        .saturating_add(sample_count.saturating_mul(element_type.width()))
}

/// Byte offset of the keyword table.
#[inline]
pub const fn offset_of_keywords() -> usize {
    HEADER_SIZE
}

/// Byte offset of the sample array for a table of `keyword_count` records.
#[inline]
pub fn offset_of_samples(keyword_count: usize) -> usize {
    HEADER_SIZE.saturating_add(keyword_count.saturating_mul(KEYWORD_RECORD_SIZE))
}

/// Fully resolved placement of every sub-region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionLayout {
    /// Number of keyword records
    pub keyword_count: usize,
    /// Number of samples
    pub sample_count: usize,
    /// Raw element type tag
    pub element_tag: u8,
    /// Byte offset of the sample array
    pub samples_offset: usize,
    /// Length of the sample array in bytes
    pub samples_len: usize,
    /// Total size in bytes
    pub total_size: usize,
}

impl RegionLayout {
    /// Checked layout for a known element type. `None` on overflow.
    pub fn new(keyword_count: usize, sample_count: usize, element_type: ElementType) -> Option<Self> {
        let samples_offset = keyword_count
            .checked_mul(KEYWORD_RECORD_SIZE)?
            .checked_add(HEADER_SIZE)?;
        let samples_len = sample_count.checked_mul(element_type.width())?;
        let total_size = samples_offset.checked_add(samples_len)?;
        Some(Self {
            keyword_count,
            sample_count,
            element_tag: element_type.tag(),
            samples_offset,
            samples_len,
            total_size,
        })
    }
}
