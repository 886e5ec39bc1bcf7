//! Error types for shared region operations

use crate::config::ConfigError;
use thiserror::Error;

/// Keyword field that failed schema validation on reattach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaField {
    /// Keyword name bytes differ
    Name,
    /// Keyword comment bytes differ
    Comment,
    /// Keyword type tag differs
    Kind,
}

impl std::fmt::Display for SchemaField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let field = match self {
            SchemaField::Name => "name",
            SchemaField::Comment => "comment",
            SchemaField::Kind => "type",
        };
        f.write_str(field)
    }
}

/// Quantity that disagreed in a size check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeField {
    /// Byte length of the backing object
    Bytes,
    /// Keyword count stored in the header
    KeywordCount,
    /// Sample count stored in the header
    SampleCount,
    /// Element type tag stored in the header
    ElementTag,
}

impl std::fmt::Display for SizeField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let field = match self {
            SizeField::Bytes => "byte size",
            SizeField::KeywordCount => "keyword count",
            SizeField::SampleCount => "sample count",
            SizeField::ElementTag => "element type tag",
        };
        f.write_str(field)
    }
}

/// Source of a backing-object failure
#[derive(Error, Debug)]
pub enum BackingSource {
    /// Failure reported by a POSIX call
    #[error(transparent)]
    Errno(#[from] nix::Error),

    /// Failure reported through `std::fs`
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during shared region operations
#[derive(Error, Debug)]
pub enum ShmError {
    /// Logical name rejected before any OS call
    #[error("Invalid region name {name:?}: {reason}")]
    InvalidName {
        /// Offending name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Region not found
    #[error("Region not found: {name}")]
    NotFound {
        /// Region name
        name: String,
    },

    /// Region already exists
    #[error("Region already exists: {name}")]
    AlreadyExists {
        /// Region name
        name: String,
    },

    /// Failure to create, open, resize or stat the backing object
    #[error("Backing object error on {name} during {op}: {source}")]
    BackingObject {
        /// Region name
        name: String,
        /// Step that failed
        op: &'static str,
        /// Underlying OS error
        source: BackingSource,
    },

    /// Failure to map the backing object
    #[error("Mapping error on {name}: {source}")]
    Mapping {
        /// Region name
        name: String,
        /// Underlying OS error
        source: std::io::Error,
    },

    /// Observed object size or header sizing field differs from the
    /// expected one
    #[error("Size mismatch on {name}: expected {field} {expected}, found {actual}")]
    SizeMismatch {
        /// Region name
        name: String,
        /// Quantity that differs
        field: SizeField,
        /// Expected value
        expected: usize,
        /// Observed value
        actual: usize,
    },

    /// Header has no valid element type tag, so the creator has not finished
    /// initializing it
    #[error("Region not initialized: {name}")]
    Uninitialized {
        /// Region name
        name: String,
    },

    /// Stored keyword schema differs from the expected one
    #[error("Schema mismatch on {name}: keyword {index} has a different {field}")]
    SchemaMismatch {
        /// Region name
        name: String,
        /// Keyword position
        index: usize,
        /// Field that differs
        field: SchemaField,
    },

    /// Requested layout does not fit in the address space
    #[error("Region layout overflows usize")]
    LayoutOverflow,

    /// A process-shared mutex or condition variable call failed
    #[error("Synchronization primitive error during {op}: {source}")]
    Sync {
        /// Primitive call that failed
        op: &'static str,
        /// Error code returned by the primitive
        source: nix::Error,
    },

    /// Wall-clock time could not be read
    #[error("Clock error: {source}")]
    Clock {
        /// Underlying OS error
        source: nix::Error,
    },

    /// Configuration could not be loaded or validated
    #[error("Configuration error: {source}")]
    Config {
        /// Source configuration error
        #[from]
        source: ConfigError,
    },

    /// JSON serialization error
    #[error("JSON error: {source}")]
    Json {
        /// Source JSON error
        #[from]
        source: serde_json::Error,
    },
}

impl ShmError {
    pub(crate) fn backing(name: &str, op: &'static str, source: impl Into<BackingSource>) -> Self {
        ShmError::BackingObject {
            name: name.to_string(),
            op,
            source: source.into(),
        }
    }

    /// Map a pthread return code to a result.
    pub(crate) fn check_sync(op: &'static str, rc: libc::c_int) -> ShmResult<()> {
        if rc == 0 {
            Ok(())
        } else {
            Err(ShmError::Sync {
                op,
                source: nix::Error::from_raw(rc),
            })
        }
    }
}

/// Result type for shared region operations
pub type ShmResult<T> = Result<T, ShmError>;
