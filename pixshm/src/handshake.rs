//! Request/ready handshake between one producer and any number of consumers.
//!
//! Flags are `(request, ready)`:
//!
//! ```text
//! IDLE (false,false) --consumer_request_start--> REQUESTED (true,false)
//! REQUESTED --producer_request_done--> DONE (false,true)
//! DONE --consumer_wait_for_ready--> IDLE
//! ```
//!
//! Every transition happens with the header mutex held, and every wait
//! re-checks its flag after waking. The untimed waits can block forever if
//! the partner process dies mid-handshake; use the `_timeout` variants for
//! bounded waiting. Flags are booleans, not counters: concurrent requests
//! collapse into one, and which consumer observes a ready frame is not
//! specified.

use crate::element::Sample;
use crate::error::ShmResult;
use crate::header::{Condition, Flag};
use crate::keyword::Keyword;
use crate::region::Region;
use std::time::Duration;

/// Outcome of a timed wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The awaited flag was observed
    Signaled,
    /// The timeout elapsed first
    TimedOut,
}

impl WaitStatus {
    fn from_signaled(signaled: bool) -> Self {
        if signaled {
            WaitStatus::Signaled
        } else {
            WaitStatus::TimedOut
        }
    }
}

/// Snapshot of both handshake flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandshakeFlags {
    /// A consumer request is pending
    pub request_pending: bool,
    /// A frame is ready for a consumer
    pub frame_ready: bool,
}

impl Region {
    /// Consumer: request a frame and wake the producer. `IDLE -> REQUESTED`.
    pub fn consumer_request_start(&self) -> ShmResult<()> {
        let mut lock = self.header().lock()?;
        lock.set_flag(Flag::Request, true);
        lock.signal(Condition::Request)?;
        lock.unlock()
    }

    /// Producer: block until a request is pending. The request flag stays set.
    pub fn producer_wait_for_request(&self) -> ShmResult<()> {
        let mut lock = self.header().lock()?;
        lock.wait_until(Condition::Request, Flag::Request)?;
        lock.unlock()
    }

    /// Producer: like [`Region::producer_wait_for_request`], bounded by `timeout`.
    pub fn producer_wait_for_request_timeout(&self, timeout: Duration) -> ShmResult<WaitStatus> {
        let mut lock = self.header().lock()?;
        let signaled = lock.wait_until_timeout(Condition::Request, Flag::Request, timeout)?;
        lock.unlock()?;
        Ok(WaitStatus::from_signaled(signaled))
    }

    /// Producer: publish the frame and wake a consumer. `REQUESTED -> DONE`.
    pub fn producer_request_done(&self) -> ShmResult<()> {
        let mut lock = self.header().lock()?;
        lock.set_flag(Flag::Ready, true);
        lock.set_flag(Flag::Request, false);
        lock.signal(Condition::Ready)?;
        lock.unlock()
    }

    /// Consumer: block until a frame is ready, then consume it. `DONE -> IDLE`.
    pub fn consumer_wait_for_ready(&self) -> ShmResult<()> {
        let mut lock = self.header().lock()?;
        lock.wait_until(Condition::Ready, Flag::Ready)?;
        lock.set_flag(Flag::Ready, false);
        lock.unlock()
    }

    /// Consumer: like [`Region::consumer_wait_for_ready`], bounded by
    /// `timeout`. The ready flag is only cleared when it was observed.
    pub fn consumer_wait_for_ready_timeout(&self, timeout: Duration) -> ShmResult<WaitStatus> {
        let mut lock = self.header().lock()?;
        let signaled = lock.wait_until_timeout(Condition::Ready, Flag::Ready, timeout)?;
        if signaled {
            lock.set_flag(Flag::Ready, false);
        }
        lock.unlock()?;
        Ok(WaitStatus::from_signaled(signaled))
    }

    /// Both flags, read under the header lock.
    pub fn handshake_flags(&self) -> ShmResult<HandshakeFlags> {
        let lock = self.header().lock()?;
        let flags = HandshakeFlags {
            request_pending: lock.flag(Flag::Request),
            frame_ready: lock.flag(Flag::Ready),
        };
        lock.unlock()?;
        Ok(flags)
    }

    /// Acquire the header mutex for a multi-step read or write of keywords
    /// or samples. Released when the guard drops or on [`RegionGuard::unlock`].
    ///
    /// The guard borrows the handle mutably, so no handshake operation can
    /// be issued through this handle while it is held.
    pub fn lock(&mut self) -> ShmResult<RegionGuard<'_>> {
        self.header().raw_lock()?;
        Ok(RegionGuard {
            region: self,
            held: true,
        })
    }
}

/// Held header mutex with access to the region's data.
pub struct RegionGuard<'a> {
    region: &'a mut Region,
    held: bool,
}

impl RegionGuard<'_> {
    /// Keyword table.
    pub fn keywords(&self) -> &[Keyword] {
        self.region.keywords()
    }

    /// Mutable keyword table.
    pub fn keywords_mut(&mut self) -> &mut [Keyword] {
        self.region.keywords_mut()
    }

    /// First keyword named `name`, if any.
    pub fn find_keyword(&self, name: &str) -> Option<&Keyword> {
        self.region.find_keyword(name)
    }

    /// Mutable first keyword named `name`, if any.
    pub fn find_keyword_mut(&mut self, name: &str) -> Option<&mut Keyword> {
        self.region.find_keyword_mut(name)
    }

    /// Samples viewed as `T`, or `None` on element type mismatch.
    pub fn samples_as<T: Sample>(&self) -> Option<&[T]> {
        self.region.samples_as()
    }

    /// Mutable samples viewed as `T`, or `None` on element type mismatch.
    pub fn samples_as_mut<T: Sample>(&mut self) -> Option<&mut [T]> {
        self.region.samples_as_mut()
    }

    /// Raw sample bytes.
    pub fn sample_bytes_mut(&mut self) -> &mut [u8] {
        self.region.sample_bytes_mut()
    }

    /// Release the mutex, reporting a failure instead of logging it.
    pub fn unlock(mut self) -> ShmResult<()> {
        self.held = false;
        self.region.header().raw_unlock()
    }
}

impl Drop for RegionGuard<'_> {
    fn drop(&mut self) {
        if self.held {
            if let Err(e) = self.region.header().raw_unlock() {
                tracing::error!("Failed to release lock on region {}: {}", self.region.name(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementType;
    use crate::operator;

    fn unique(tag: &str) -> String {
        format!("handshake_{}_{}", tag, std::process::id())
    }

    #[test]
    fn test_single_thread_cycle() {
        let name = unique("cycle");
        let region = Region::create(&name, 1, ElementType::Uint8, &[]).unwrap();

        region.consumer_request_start().unwrap();
        assert_eq!(
            region.handshake_flags().unwrap(),
            HandshakeFlags { request_pending: true, frame_ready: false }
        );

        region.producer_wait_for_request().unwrap();
        assert!(region.handshake_flags().unwrap().request_pending);

        region.producer_request_done().unwrap();
        assert_eq!(
            region.handshake_flags().unwrap(),
            HandshakeFlags { request_pending: false, frame_ready: true }
        );

        region.consumer_wait_for_ready().unwrap();
        assert_eq!(region.handshake_flags().unwrap(), HandshakeFlags::default());

        region.close();
        operator::remove(&name).unwrap();
    }

    #[test]
    fn test_timed_waits_time_out_when_idle() {
        let name = unique("timeout");
        let region = Region::create(&name, 1, ElementType::Uint8, &[]).unwrap();
        assert_eq!(
            region.producer_wait_for_request_timeout(Duration::from_millis(10)).unwrap(),
            WaitStatus::TimedOut
        );
        assert_eq!(
            region.consumer_wait_for_ready_timeout(Duration::from_millis(10)).unwrap(),
            WaitStatus::TimedOut
        );
        assert_eq!(region.handshake_flags().unwrap(), HandshakeFlags::default());
        region.close();
        operator::remove(&name).unwrap();
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let name = unique("guard");
        let mut region =
            Region::create(&name, 2, ElementType::Int16, &[Keyword::new("GAIN", 1, "")]).unwrap();
        {
            let mut guard = region.lock().unwrap();
            assert!(guard.find_keyword_mut("GAIN").unwrap().set_value(7));
            guard.samples_as_mut::<i16>().unwrap()[1] = -3;
        }
        // Lock must be free again.
        region.consumer_request_start().unwrap();
        {
            let guard = region.lock().unwrap();
            assert_eq!(guard.find_keyword("GAIN").unwrap().as_integer(), Some(7));
            assert_eq!(guard.samples_as::<i16>().unwrap()[1], -3);
            guard.unlock().unwrap();
        }
        assert!(region.handshake_flags().unwrap().request_pending);
        region.close();
        operator::remove(&name).unwrap();
    }
}
