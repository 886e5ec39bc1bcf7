//! # Pixshm Frame Regions
//!
//! Named shared-memory regions that carry one frame of data between a producer
//! process and any number of consumer processes on the same host. Each region
//! holds a self-describing header, a fixed keyword table and a typed sample
//! array, plus process-shared synchronization used for a request/ready
//! handshake.
//!
//! ## Region Layout
//!
//! ```text
//! offset 0                HEADER_SIZE                 offset_of_samples(K)
//! ┌───────────────────────┬───────────────────────────┬──────────────────────┐
//! │ RegionHeader          │ K x Keyword (112 bytes)   │ N x element          │
//! │ mutex, 2 condvars     │ name | type | value |     │ width from the       │
//! │ request/ready flags   │ comment                   │ element type tag     │
//! │ sizes, timestamps     │                           │                      │
//! └───────────────────────┴───────────────────────────┴──────────────────────┘
//! ```
//!
//! ## Usage Patterns
//!
//! ### Producer
//!
//! ```rust,no_run
//! use pixshm::{ElementType, Keyword, Region};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = [
//!     Keyword::new("EXPTIME", 1.5, "exposure time [s]"),
//!     Keyword::new("FRAMEID", 0, "frame counter"),
//! ];
//! let mut region = Region::open_or_create("frame0", 100, ElementType::Float, &schema)?;
//!
//! loop {
//!     region.producer_wait_for_request()?;
//!     {
//!         let mut guard = region.lock()?;
//!         if let Some(samples) = guard.samples_as_mut::<f32>() {
//!             samples.fill(0.0);
//!         }
//!     }
//!     region.producer_request_done()?;
//! }
//! # }
//! ```
//!
//! ### Consumer
//!
//! ```rust,no_run
//! use pixshm::Region;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let region = Region::attach("frame0")?;
//! region.consumer_request_start()?;
//! region.consumer_wait_for_ready()?;
//!
//! if let Some(exptime) = region.find_keyword("EXPTIME") {
//!     println!("EXPTIME = {:?}", exptime.value());
//! }
//! println!("{:?}", region.samples_as::<f32>().map(|s| s.len()));
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return `Result<T, ShmError>`:
//!
//! ```rust,no_run
//! use pixshm::{Region, ShmError};
//!
//! match Region::attach("missing_region") {
//!     Ok(region) => { /* use region */ }
//!     Err(ShmError::NotFound { name }) => {
//!         eprintln!("Region '{}' not found - check producer is running", name);
//!     }
//!     Err(e) => eprintln!("Unexpected error: {}", e),
//! }
//! ```
//!
//! ## Lifecycle
//!
//! - `create` is the only call that initializes the synchronization state
//! - `attach` and `open_or_create` never reinitialize a live region
//! - `close` and `Drop` unmap without removing the name
//! - [`operator::remove`] unlinks a name explicitly
//!
//! ## Thread Safety
//!
//! - **Handshake calls**: take `&self` and may be used from any thread or process
//! - **Keyword and sample views**: plain memory, not synchronized
//! - **RegionGuard**: holds the region mutex while data is modified
//!
//! ## Platform Support
//!
//! Linux POSIX shared memory (`/dev/shm`) with process-shared pthread
//! mutex and condition variables.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod consts;
pub mod element;
pub mod error;
pub mod handshake;
pub mod header;
pub mod keyword;
pub mod layout;
pub mod operator;
pub mod platform;
pub mod region;
pub mod samples;

pub use config::{
    ConfigError, ConfigLoader, KeywordConfig, LogLevel, ProducerConfig, RegionConfig, SharedConfig,
};
pub use element::{ComplexF32, ComplexF64, ElementType, Half, Sample, element_byte_width};
pub use error::{SchemaField, ShmError, ShmResult, SizeField};
pub use handshake::{HandshakeFlags, RegionGuard, WaitStatus};
pub use header::RegionHeader;
pub use keyword::{KEYWORD_RECORD_SIZE, Keyword, KeywordKind, KeywordValue, find as find_keyword};
pub use layout::{HEADER_SIZE, RegionLayout, compute_size, offset_of_keywords, offset_of_samples};
pub use region::{Region, RegionInfo};

/// Initialize tracing from `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    install_subscriber(EnvFilter::from_default_env());
}

/// Initialize tracing at a fixed level, usually [`SharedConfig::log_level`].
///
/// `RUST_LOG` still takes precedence when set.
pub fn init_tracing_with_level(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));
    install_subscriber(filter);
}

fn install_subscriber(filter: tracing_subscriber::EnvFilter) {
    use tracing_subscriber::fmt;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
