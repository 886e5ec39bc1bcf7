//! Operator-level actions outside the normal region lifecycle.
//!
//! Nothing in [`crate::Region`] ever removes an object name. Removing it while
//! another process still maps the region silently detaches that process from
//! future producers, so removal is a separate, explicit call.

use crate::error::ShmResult;
use crate::platform;

/// OS object name used for the logical region `name`.
pub fn object_name(name: &str) -> ShmResult<String> {
    platform::object_name(name)
}

/// Unlink the backing object of `name`.
///
/// Existing mappings stay valid; later `attach` calls fail with
/// [`crate::ShmError::NotFound`] and a later `open_or_create` starts a fresh
/// region with new synchronization state.
pub fn remove(name: &str) -> ShmResult<()> {
    let path = platform::object_name(name)?;
    platform::unlink_object(name, &path)?;
    tracing::info!("Removed region {}", name);
    Ok(())
}
