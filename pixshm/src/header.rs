//! Region header: the first bytes of every region.
//!
//! Holds the process-shared mutex and the two condition variables of the
//! handshake, the two handshake flags, creation and last-access timestamps,
//! and the three sizing fields that make a region self-describing.
//!
//! Everything except the pthread objects is an atomic so concurrent access
//! from other mappings is never a data race. The flags are only changed while
//! the mutex is held; the sizing fields are written once by the creator.

use crate::error::{ShmError, ShmResult};
use crate::layout::RegionLayout;
use nix::time::{ClockId, clock_gettime};
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Condition variable selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Condition {
    /// Signaled when a consumer requests a frame
    Request,
    /// Signaled when the producer finished a frame
    Ready,
}

/// Handshake flag selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flag {
    /// A consumer requested a frame
    Request,
    /// The producer published a frame
    Ready,
}

/// Header laid out at offset 0 of the region.
#[repr(C)]
pub struct RegionHeader {
    mutex: UnsafeCell<libc::pthread_mutex_t>,
    request_cond: UnsafeCell<libc::pthread_cond_t>,
    ready_cond: UnsafeCell<libc::pthread_cond_t>,
    request_flag: AtomicU8,
    ready_flag: AtomicU8,
    element_tag: AtomicU8,
    _reserved: [u8; 5],
    created_ns: AtomicU64,
    last_access_ns: AtomicU64,
    keyword_count: AtomicU64,
    sample_count: AtomicU64,
}

// SAFETY: the pthread objects are process-shared and only touched through
// pthread calls; every other field is atomic.
unsafe impl Sync for RegionHeader {}
unsafe impl Send for RegionHeader {}

impl RegionHeader {
    /// Initialize a freshly created header in place.
    ///
    /// # Safety
    ///
    /// `ptr` must point to zeroed, writable, suitably aligned memory of at
    /// least `size_of::<RegionHeader>()` bytes that no other process uses yet.
    /// Must run exactly once per physical region.
    pub(crate) unsafe fn init_in_place(ptr: *mut RegionHeader, layout: &RegionLayout) -> ShmResult<()> {
        let now = now_ns()?;
        // SAFETY: caller guarantees exclusive access to valid header memory.
        unsafe {
            let mut mattr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
            ShmError::check_sync("pthread_mutexattr_init", libc::pthread_mutexattr_init(mattr.as_mut_ptr()))?;
            let rc = libc::pthread_mutexattr_setpshared(mattr.as_mut_ptr(), libc::PTHREAD_PROCESS_SHARED);
            let rc = if rc == 0 {
                libc::pthread_mutex_init(UnsafeCell::raw_get(&raw const (*ptr).mutex), mattr.as_ptr())
            } else {
                rc
            };
            libc::pthread_mutexattr_destroy(mattr.as_mut_ptr());
            ShmError::check_sync("pthread_mutex_init", rc)?;

            let mut cattr = MaybeUninit::<libc::pthread_condattr_t>::uninit();
            ShmError::check_sync("pthread_condattr_init", libc::pthread_condattr_init(cattr.as_mut_ptr()))?;
            let mut rc = libc::pthread_condattr_setpshared(cattr.as_mut_ptr(), libc::PTHREAD_PROCESS_SHARED);
            if rc == 0 {
                rc = libc::pthread_cond_init(UnsafeCell::raw_get(&raw const (*ptr).request_cond), cattr.as_ptr());
            }
            if rc == 0 {
                rc = libc::pthread_cond_init(UnsafeCell::raw_get(&raw const (*ptr).ready_cond), cattr.as_ptr());
            }
            libc::pthread_condattr_destroy(cattr.as_mut_ptr());
            ShmError::check_sync("pthread_cond_init", rc)?;

            let header = &*ptr;
            header.request_flag.store(0, Ordering::Relaxed);
            header.ready_flag.store(0, Ordering::Relaxed);
            header.created_ns.store(now, Ordering::Relaxed);
            header.last_access_ns.store(now, Ordering::Relaxed);
            header.keyword_count.store(layout.keyword_count as u64, Ordering::Relaxed);
            header.sample_count.store(layout.sample_count as u64, Ordering::Relaxed);
            header.element_tag.store(layout.element_tag, Ordering::Release);
        }
        Ok(())
    }

    /// Number of keyword records.
    pub fn keyword_count(&self) -> u64 {
        self.keyword_count.load(Ordering::Acquire)
    }

    /// Number of samples.
    pub fn sample_count(&self) -> u64 {
        self.sample_count.load(Ordering::Acquire)
    }

    /// Raw element type tag.
    pub fn element_tag(&self) -> u8 {
        self.element_tag.load(Ordering::Acquire)
    }

    /// Creation time.
    pub fn created_at(&self) -> SystemTime {
        ns_to_system_time(self.created_ns.load(Ordering::Acquire))
    }

    /// Last attach or explicit touch.
    pub fn last_accessed(&self) -> SystemTime {
        ns_to_system_time(self.last_access_ns.load(Ordering::Acquire))
    }

    /// Set last-access time to now.
    pub(crate) fn touch(&self) -> ShmResult<()> {
        self.last_access_ns.store(now_ns()?, Ordering::Release);
        Ok(())
    }

    /// Set creation and last-access time to now.
    pub(crate) fn reset_creation_time(&self) -> ShmResult<()> {
        let now = now_ns()?;
        self.created_ns.store(now, Ordering::Release);
        self.last_access_ns.store(now, Ordering::Release);
        Ok(())
    }

    /// Acquire the header mutex, released when the returned lock drops.
    pub(crate) fn lock(&self) -> ShmResult<HeaderLock<'_>> {
        self.raw_lock()?;
        Ok(HeaderLock {
            header: self,
            held: true,
        })
    }

    pub(crate) fn raw_lock(&self) -> ShmResult<()> {
        // SAFETY: the mutex was initialized as process-shared by the creator.
        let rc = unsafe { libc::pthread_mutex_lock(self.mutex.get()) };
        ShmError::check_sync("pthread_mutex_lock", rc)
    }

    pub(crate) fn raw_unlock(&self) -> ShmResult<()> {
        // SAFETY: only called by the holder of the lock.
        let rc = unsafe { libc::pthread_mutex_unlock(self.mutex.get()) };
        ShmError::check_sync("pthread_mutex_unlock", rc)
    }

    fn cond(&self, cond: Condition) -> *mut libc::pthread_cond_t {
        match cond {
            Condition::Request => self.request_cond.get(),
            Condition::Ready => self.ready_cond.get(),
        }
    }

    fn flag_cell(&self, flag: Flag) -> &AtomicU8 {
        match flag {
            Flag::Request => &self.request_flag,
            Flag::Ready => &self.ready_flag,
        }
    }
}

/// Scoped acquisition of the header mutex.
///
/// Flag access and condition waits are only available through this type, so
/// they always happen with the mutex held.
pub(crate) struct HeaderLock<'a> {
    header: &'a RegionHeader,
    held: bool,
}

impl HeaderLock<'_> {
    pub(crate) fn flag(&self, flag: Flag) -> bool {
        self.header.flag_cell(flag).load(Ordering::Relaxed) != 0
    }

    pub(crate) fn set_flag(&mut self, flag: Flag, value: bool) {
        self.header.flag_cell(flag).store(value as u8, Ordering::Relaxed);
    }

    pub(crate) fn signal(&self, cond: Condition) -> ShmResult<()> {
        // SAFETY: the condition was initialized as process-shared by the creator.
        let rc = unsafe { libc::pthread_cond_signal(self.header.cond(cond)) };
        ShmError::check_sync("pthread_cond_signal", rc)
    }

    /// Block until `flag` is set. Absorbs spurious wakeups.
    pub(crate) fn wait_until(&mut self, cond: Condition, flag: Flag) -> ShmResult<()> {
        while !self.flag(flag) {
            // SAFETY: the mutex is held by this lock; both objects are process-shared.
            let rc = unsafe { libc::pthread_cond_wait(self.header.cond(cond), self.header.mutex.get()) };
            ShmError::check_sync("pthread_cond_wait", rc)?;
        }
        Ok(())
    }

    /// Block until `flag` is set or `timeout` elapses. Returns `false` on timeout.
    pub(crate) fn wait_until_timeout(
        &mut self,
        cond: Condition,
        flag: Flag,
        timeout: Duration,
    ) -> ShmResult<bool> {
        let deadline = realtime_deadline(timeout)?;
        while !self.flag(flag) {
            // SAFETY: the mutex is held by this lock; both objects are process-shared.
            let rc = unsafe {
                libc::pthread_cond_timedwait(self.header.cond(cond), self.header.mutex.get(), &deadline)
            };
            if rc == libc::ETIMEDOUT {
                return Ok(self.flag(flag));
            }
            ShmError::check_sync("pthread_cond_timedwait", rc)?;
        }
        Ok(true)
    }

    /// Release the mutex, reporting a failure instead of logging it.
    pub(crate) fn unlock(mut self) -> ShmResult<()> {
        self.held = false;
        self.header.raw_unlock()
    }
}

impl Drop for HeaderLock<'_> {
    fn drop(&mut self) {
        if self.held {
            if let Err(e) = self.header.raw_unlock() {
                tracing::error!("Failed to release region header lock: {}", e);
            }
        }
    }
}

/// Current `CLOCK_REALTIME` in nanoseconds since the Unix epoch.
pub(crate) fn now_ns() -> ShmResult<u64> {
    let ts = clock_gettime(ClockId::CLOCK_REALTIME).map_err(|source| ShmError::Clock { source })?;
    Ok(ts.tv_sec() as u64 * NANOS_PER_SEC + ts.tv_nsec() as u64)
}

fn realtime_deadline(timeout: Duration) -> ShmResult<libc::timespec> {
    let ts = clock_gettime(ClockId::CLOCK_REALTIME).map_err(|source| ShmError::Clock { source })?;
    let mut sec = ts.tv_sec() as i64 + timeout.as_secs().min(i64::MAX as u64 / 2) as i64;
    let mut nsec = ts.tv_nsec() as i64 + i64::from(timeout.subsec_nanos());
    if nsec >= NANOS_PER_SEC as i64 {
        sec += 1;
        nsec -= NANOS_PER_SEC as i64;
    }
    Ok(libc::timespec {
        tv_sec: sec as libc::time_t,
        tv_nsec: nsec as _,
    })
}

fn ns_to_system_time(ns: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_nanos(ns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementType;
    use crate::layout::HEADER_SIZE;

    /// Aligned scratch header outside any mapping.
    #[repr(C, align(64))]
    struct Scratch([u8; HEADER_SIZE]);

    fn scratch_header(layout: &RegionLayout) -> Box<Scratch> {
        let mut scratch = Box::new(Scratch([0; HEADER_SIZE]));
        unsafe {
            RegionHeader::init_in_place(scratch.0.as_mut_ptr() as *mut RegionHeader, layout).unwrap();
        }
        scratch
    }

    fn header_of(scratch: &Scratch) -> &RegionHeader {
        unsafe { &*(scratch.0.as_ptr() as *const RegionHeader) }
    }

    #[test]
    fn test_init_writes_sizing_fields() {
        let layout = RegionLayout::new(2, 100, ElementType::Float).unwrap();
        let scratch = scratch_header(&layout);
        let header = header_of(&scratch);
        assert_eq!(header.keyword_count(), 2);
        assert_eq!(header.sample_count(), 100);
        assert_eq!(header.element_tag(), ElementType::Float.tag());
        assert_eq!(header.created_at(), header.last_accessed());
    }

    #[test]
    fn test_flags_start_cleared() {
        let layout = RegionLayout::new(0, 1, ElementType::Uint8).unwrap();
        let scratch = scratch_header(&layout);
        let lock = header_of(&scratch).lock().unwrap();
        assert!(!lock.flag(Flag::Request));
        assert!(!lock.flag(Flag::Ready));
        lock.unlock().unwrap();
    }

    #[test]
    fn test_timed_wait_expires() {
        let layout = RegionLayout::new(0, 1, ElementType::Uint8).unwrap();
        let scratch = scratch_header(&layout);
        let mut lock = header_of(&scratch).lock().unwrap();
        let signaled = lock
            .wait_until_timeout(Condition::Ready, Flag::Ready, Duration::from_millis(20))
            .unwrap();
        assert!(!signaled);
    }

    #[test]
    fn test_timed_wait_sees_set_flag() {
        let layout = RegionLayout::new(0, 1, ElementType::Uint8).unwrap();
        let scratch = scratch_header(&layout);
        let mut lock = header_of(&scratch).lock().unwrap();
        lock.set_flag(Flag::Request, true);
        let signaled = lock
            .wait_until_timeout(Condition::Request, Flag::Request, Duration::from_millis(20))
            .unwrap();
        assert!(signaled);
    }

    #[test]
    fn test_touch_advances_last_access() {
        let layout = RegionLayout::new(0, 1, ElementType::Uint8).unwrap();
        let scratch = scratch_header(&layout);
        let header = header_of(&scratch);
        std::thread::sleep(Duration::from_millis(2));
        header.touch().unwrap();
        assert!(header.last_accessed() > header.created_at());
        header.reset_creation_time().unwrap();
        assert_eq!(header.created_at(), header.last_accessed());
    }
}
