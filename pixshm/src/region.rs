//! Region handle and lifecycle: create, attach, validated reattach, close.
//!
//! Every lifecycle operation is a boundary. Anything it opens is released
//! before it returns an error, so a failed call never leaves a descriptor,
//! a mapping, or (for [`Region::create`]) a half-initialized object name
//! behind.

use crate::element::ElementType;
use crate::error::{SchemaField, ShmError, ShmResult, SizeField};
use crate::header::RegionHeader;
use crate::keyword::{self, Keyword};
use crate::layout::{HEADER_SIZE, RegionLayout, offset_of_keywords};
use crate::platform::{
    OpenMode, map_object, object_len, object_name, open_object, resize_object, unlink_object,
};
use memmap2::MmapRaw;
use serde::Serialize;
use std::fs::File;
use std::time::SystemTime;

/// Process-local handle to a mapped region.
///
/// Owns the mapping and the descriptor of the backing object. The handle is
/// move-only; dropping it (or calling [`Region::close`]) unmaps and closes
/// but never removes the object name.
pub struct Region {
    name: String,
    map: MmapRaw,
    file: File,
    layout: RegionLayout,
}

/// Serializable snapshot of a region for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct RegionInfo {
    /// Logical region name
    pub name: String,
    /// Mapped size in bytes
    pub size: usize,
    /// Number of keyword records
    pub keyword_count: usize,
    /// Number of samples
    pub sample_count: usize,
    /// Element type, `None` for an unknown tag
    pub element_type: Option<ElementType>,
    /// Creation time
    pub created_at: SystemTime,
    /// Last access time
    pub last_accessed: SystemTime,
    /// A consumer request is pending
    pub request_pending: bool,
    /// A frame is ready
    pub frame_ready: bool,
}

impl RegionInfo {
    /// Pretty JSON rendering.
    pub fn to_json_pretty(&self) -> ShmResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Region {
    /// Create a new region and initialize its header and keyword schema.
    ///
    /// Fails with [`ShmError::AlreadyExists`] if an object with this name is
    /// present. This is the only path that initializes the synchronization
    /// primitives.
    pub fn create(
        name: &str,
        sample_count: usize,
        element_type: ElementType,
        keywords: &[Keyword],
    ) -> ShmResult<Self> {
        let path = object_name(name)?;
        let layout = RegionLayout::new(keywords.len(), sample_count, element_type)
            .ok_or(ShmError::LayoutOverflow)?;

        let file = open_object(name, &path, OpenMode::CreateNew)?;
        match Self::initialize(name, file, layout, keywords) {
            Ok(region) => {
                tracing::info!(
                    "Created region {} ({} bytes, {} keywords, {} x {})",
                    name,
                    layout.total_size,
                    layout.keyword_count,
                    layout.sample_count,
                    element_type
                );
                Ok(region)
            }
            Err(e) => {
                // The name was created by this call; do not leave it behind uninitialized.
                if let Err(unlink_err) = unlink_object(name, &path) {
                    tracing::warn!("Failed to roll back region {}: {}", name, unlink_err);
                }
                Err(e)
            }
        }
    }

    fn initialize(
        name: &str,
        file: File,
        layout: RegionLayout,
        keywords: &[Keyword],
    ) -> ShmResult<Self> {
        resize_object(name, &file, layout.total_size)?;
        let map = map_object(name, &file, layout.total_size)?;
        tracing::debug!("Mapped {} bytes for region {}", layout.total_size, name);

        // SAFETY: the mapping is fresh, page-aligned, zero-filled by ftruncate
        // and at least HEADER_SIZE bytes long.
        unsafe {
            RegionHeader::init_in_place(map.as_mut_ptr() as *mut RegionHeader, &layout)?;
            std::ptr::copy_nonoverlapping(
                keywords.as_ptr(),
                map.as_mut_ptr().add(offset_of_keywords()) as *mut Keyword,
                keywords.len(),
            );
        }

        Ok(Self {
            name: name.to_string(),
            map,
            file,
            layout,
        })
    }

    /// Attach to an existing region without checking it against a schema.
    ///
    /// The layout is taken from the header. Synchronization primitives and
    /// keyword values are left untouched. A header whose element type tag is
    /// not yet set is still being initialized by its creator and is rejected
    /// with [`ShmError::Uninitialized`].
    pub fn attach(name: &str) -> ShmResult<Self> {
        let path = object_name(name)?;
        let file = open_object(name, &path, OpenMode::Existing)?;
        let actual = object_len(name, &file)?;
        if actual < HEADER_SIZE {
            tracing::warn!("Region {} holds {} bytes, less than a header", name, actual);
            return Err(ShmError::SizeMismatch {
                name: name.to_string(),
                field: SizeField::Bytes,
                expected: HEADER_SIZE,
                actual,
            });
        }

        let map = map_object(name, &file, actual)?;
        // SAFETY: the mapping holds at least HEADER_SIZE bytes.
        let header = unsafe { &*(map.as_ptr() as *const RegionHeader) };
        let element_type = initialized_element_type(name, header)?;
        let keyword_count =
            usize::try_from(header.keyword_count()).map_err(|_| ShmError::LayoutOverflow)?;
        let sample_count =
            usize::try_from(header.sample_count()).map_err(|_| ShmError::LayoutOverflow)?;
        let layout = RegionLayout::new(keyword_count, sample_count, element_type)
            .ok_or(ShmError::LayoutOverflow)?;

        if layout.total_size > actual {
            tracing::warn!(
                "Region {} header describes {} bytes but object holds {}",
                name,
                layout.total_size,
                actual
            );
            return Err(ShmError::SizeMismatch {
                name: name.to_string(),
                field: SizeField::Bytes,
                expected: layout.total_size,
                actual,
            });
        }

        let region = Self {
            name: name.to_string(),
            map,
            file,
            layout,
        };
        region.touch()?;
        tracing::info!("Attached to region {} ({} bytes)", name, actual);
        Ok(region)
    }

    /// Attach to an existing region and require it to match a schema.
    ///
    /// The object size must equal the size computed from `expected_keywords`,
    /// `sample_count` and `element_type`, and every stored keyword must have
    /// the same name, comment and type as the expected one at the same
    /// position. On success each stored value is overwritten with the
    /// expected value, under the header lock.
    pub fn attach_and_validate(
        name: &str,
        sample_count: usize,
        element_type: ElementType,
        expected_keywords: &[Keyword],
    ) -> ShmResult<Self> {
        let path = object_name(name)?;
        let layout = RegionLayout::new(expected_keywords.len(), sample_count, element_type)
            .ok_or(ShmError::LayoutOverflow)?;

        let file = open_object(name, &path, OpenMode::Existing)?;
        let actual = object_len(name, &file)?;
        if actual != layout.total_size {
            tracing::warn!(
                "Region {} size {} does not match expected {}",
                name,
                actual,
                layout.total_size
            );
            return Err(ShmError::SizeMismatch {
                name: name.to_string(),
                field: SizeField::Bytes,
                expected: layout.total_size,
                actual,
            });
        }

        let map = map_object(name, &file, actual)?;
        let region = Self {
            name: name.to_string(),
            map,
            file,
            layout,
        };

        let header = region.header();
        initialized_element_type(name, header)?;
        let stored = [
            (SizeField::KeywordCount, layout.keyword_count as u64, header.keyword_count()),
            (SizeField::SampleCount, layout.sample_count as u64, header.sample_count()),
            (
                SizeField::ElementTag,
                u64::from(layout.element_tag),
                u64::from(header.element_tag()),
            ),
        ];
        if let Some(&(field, expected, found)) = stored.iter().find(|(_, e, f)| e != f) {
            tracing::warn!(
                "Region {} header {} is {}, expected {}",
                name,
                field,
                found,
                expected
            );
            return Err(ShmError::SizeMismatch {
                name: name.to_string(),
                field,
                expected: usize::try_from(expected).unwrap_or(usize::MAX),
                actual: usize::try_from(found).unwrap_or(usize::MAX),
            });
        }

        for (index, (stored, expected)) in region.keywords().iter().zip(expected_keywords).enumerate() {
            let field = if stored.name_bytes() != expected.name_bytes() {
                Some(SchemaField::Name)
            } else if stored.comment_bytes() != expected.comment_bytes() {
                Some(SchemaField::Comment)
            } else if stored.kind() != expected.kind() {
                Some(SchemaField::Kind)
            } else {
                None
            };
            if let Some(field) = field {
                tracing::warn!("Region {} keyword {} has a different {}", name, index, field);
                return Err(ShmError::SchemaMismatch {
                    name: name.to_string(),
                    index,
                    field,
                });
            }
        }

        {
            let lock = region.header().lock()?;
            // SAFETY: the table lies inside the mapping, no other reference into
            // it is live, and the header lock is held.
            let table = unsafe {
                std::slice::from_raw_parts_mut(region.keywords_ptr(), layout.keyword_count)
            };
            for (stored, expected) in table.iter_mut().zip(expected_keywords) {
                stored.copy_value_from(expected);
            }
            lock.unlock()?;
        }

        region.touch()?;
        tracing::info!("Reattached to region {} with matching schema", name);
        Ok(region)
    }

    /// Attach with validation if the region exists, otherwise create it.
    ///
    /// Reusing an existing region keeps its synchronization state intact.
    pub fn open_or_create(
        name: &str,
        sample_count: usize,
        element_type: ElementType,
        keywords: &[Keyword],
    ) -> ShmResult<Self> {
        if Self::exists(name) {
            Self::attach_and_validate(name, sample_count, element_type, keywords)
        } else {
            Self::create(name, sample_count, element_type, keywords)
        }
    }

    /// True if the named backing object can currently be opened read-only.
    pub fn exists(name: &str) -> bool {
        match object_name(name) {
            Ok(path) => open_object(name, &path, OpenMode::ReadOnly).is_ok(),
            Err(_) => false,
        }
    }

    /// Unmap and close. The object name is kept.
    ///
    /// Nothing is reported: `munmap` on a mapping this handle owns can only
    /// fail for invalid arguments, and closing a shared memory descriptor does
    /// not flush anything. Any such failure is ignored by the drop of the
    /// mapping and the descriptor.
    pub fn close(self) {
        tracing::debug!("Closing region {}", self.name);
        drop(self);
    }

    /// Logical region name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mapped size in bytes.
    pub fn size(&self) -> usize {
        self.map.len()
    }

    /// Placement of the sub-regions.
    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    /// Region header.
    pub fn header(&self) -> &RegionHeader {
        // SAFETY: every constructor checks the mapping holds a full header,
        // and mmap returns page-aligned memory.
        unsafe { &*(self.map.as_ptr() as *const RegionHeader) }
    }

    /// Element type, `None` if the stored tag is unknown.
    pub fn element_type(&self) -> Option<ElementType> {
        ElementType::from_tag(self.header().element_tag())
    }

    /// Number of keyword records.
    pub fn keyword_count(&self) -> usize {
        self.layout.keyword_count
    }

    /// Number of samples.
    pub fn sample_count(&self) -> usize {
        self.layout.sample_count
    }

    /// Keyword table.
    pub fn keywords(&self) -> &[Keyword] {
        // SAFETY: the table lies inside the mapping (checked at construction)
        // and keyword records accept every bit pattern.
        unsafe { std::slice::from_raw_parts(self.keywords_ptr(), self.layout.keyword_count) }
    }

    /// Mutable keyword table. Other processes may write concurrently unless
    /// the header lock is held.
    pub fn keywords_mut(&mut self) -> &mut [Keyword] {
        // SAFETY: the table lies inside the mapping (checked at construction)
        // and the handle is borrowed exclusively.
        unsafe { std::slice::from_raw_parts_mut(self.keywords_ptr(), self.layout.keyword_count) }
    }

    fn keywords_ptr(&self) -> *mut Keyword {
        // SAFETY: offset_of_keywords() == HEADER_SIZE lies inside the mapping.
        unsafe { self.map.as_mut_ptr().add(offset_of_keywords()) as *mut Keyword }
    }

    /// First keyword named `name`, if any.
    pub fn find_keyword(&self, name: &str) -> Option<&Keyword> {
        let keywords = self.keywords();
        keyword::find(keywords, name).map(|index| &keywords[index])
    }

    /// Mutable first keyword named `name`, if any.
    pub fn find_keyword_mut(&mut self, name: &str) -> Option<&mut Keyword> {
        let keywords = self.keywords_mut();
        let index = keyword::find(keywords, name)?;
        Some(&mut keywords[index])
    }

    /// Update the last-access timestamp.
    pub fn touch(&self) -> ShmResult<()> {
        self.header().touch()
    }

    /// Set both timestamps to now.
    pub fn reset_creation_time(&self) -> ShmResult<()> {
        self.header().reset_creation_time()
    }

    /// Creation time.
    pub fn created_at(&self) -> SystemTime {
        self.header().created_at()
    }

    /// Last access time.
    pub fn last_accessed(&self) -> SystemTime {
        self.header().last_accessed()
    }

    /// Snapshot of the region state, with flags read under the header lock.
    pub fn info(&self) -> ShmResult<RegionInfo> {
        let flags = self.handshake_flags()?;
        Ok(RegionInfo {
            name: self.name.clone(),
            size: self.size(),
            keyword_count: self.keyword_count(),
            sample_count: self.sample_count(),
            element_type: self.element_type(),
            created_at: self.created_at(),
            last_accessed: self.last_accessed(),
            request_pending: flags.request_pending,
            frame_ready: flags.frame_ready,
        })
    }

    pub(crate) fn map(&self) -> &MmapRaw {
        &self.map
    }
}

/// Element type of an attached header, or `Uninitialized` while the creator
/// has not yet published the tag.
fn initialized_element_type(name: &str, header: &RegionHeader) -> ShmResult<ElementType> {
    ElementType::from_tag(header.element_tag()).ok_or_else(|| {
        tracing::warn!("Region {} header is not initialized", name);
        ShmError::Uninitialized {
            name: name.to_string(),
        }
    })
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("name", &self.name)
            .field("size", &self.map.len())
            .field("layout", &self.layout)
            .finish()
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        tracing::debug!("Unmapping region {} (fd {:?})", self.name, self.file);
    }
}
