//! Keyword records: small named, typed, commented metadata fields.
//!
//! A [`Keyword`] is a fixed-width `repr(C)` record stored verbatim in the
//! keyword table of a region. All three string fields are truncated to their
//! width minus one byte and NUL-padded, and all comparisons use C string
//! semantics (bytes up to the first NUL).

use crate::consts::{KEYWORD_COMMENT_LEN, KEYWORD_NAME_LEN, KEYWORD_TEXT_LEN};
use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

/// Type tag of a keyword value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum KeywordKind {
    /// Signed 64-bit integer
    Integer = 0,
    /// Double-precision float
    Float = 1,
    /// Short fixed-width string
    Text = 2,
}

impl KeywordKind {
    /// Convert from the raw record tag. Returns `None` for unknown values.
    #[inline]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Integer),
            1 => Some(Self::Float),
            2 => Some(Self::Text),
            _ => None,
        }
    }
}

/// Value of a keyword. The variant determines the stored type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeywordValue {
    /// Signed 64-bit integer
    Integer(i64),
    /// Double-precision float
    Float(f64),
    /// Short string, truncated to `KEYWORD_TEXT_LEN - 1` bytes when stored
    Text(String),
}

impl KeywordValue {
    /// Type tag matching this value.
    pub fn kind(&self) -> KeywordKind {
        match self {
            KeywordValue::Integer(_) => KeywordKind::Integer,
            KeywordValue::Float(_) => KeywordKind::Float,
            KeywordValue::Text(_) => KeywordKind::Text,
        }
    }
}

impl From<i64> for KeywordValue {
    fn from(value: i64) -> Self {
        KeywordValue::Integer(value)
    }
}

impl From<i32> for KeywordValue {
    fn from(value: i32) -> Self {
        KeywordValue::Integer(value.into())
    }
}

impl From<u32> for KeywordValue {
    fn from(value: u32) -> Self {
        KeywordValue::Integer(value.into())
    }
}

impl From<f64> for KeywordValue {
    fn from(value: f64) -> Self {
        KeywordValue::Float(value)
    }
}

impl From<f32> for KeywordValue {
    fn from(value: f32) -> Self {
        KeywordValue::Float(value.into())
    }
}

impl From<&str> for KeywordValue {
    fn from(value: &str) -> Self {
        KeywordValue::Text(value.to_string())
    }
}

impl From<String> for KeywordValue {
    fn from(value: String) -> Self {
        KeywordValue::Text(value)
    }
}

/// Fixed-width keyword record as laid out in shared memory.
///
/// The value is an 8-byte slot interpreted according to `kind`: native-endian
/// `i64` bits, native-endian `f64` bits, or NUL-padded string bytes.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct Keyword {
    name: [u8; KEYWORD_NAME_LEN],
    kind: u32,
    _reserved: u32,
    value: [u8; KEYWORD_TEXT_LEN],
    comment: [u8; KEYWORD_COMMENT_LEN],
}

/// Size in bytes of one keyword record in the table.
pub const KEYWORD_RECORD_SIZE: usize = core::mem::size_of::<Keyword>();

const_assert_eq!(KEYWORD_RECORD_SIZE, 112);
const_assert_eq!(core::mem::align_of::<Keyword>(), 4);

impl Keyword {
    /// Build a keyword from its name, value and comment.
    ///
    /// Strings longer than their field are truncated at a byte boundary.
    pub fn new(name: &str, value: impl Into<KeywordValue>, comment: &str) -> Self {
        let value = value.into();
        let mut keyword = Self {
            name: fixed_bytes(name),
            kind: value.kind() as u32,
            _reserved: 0,
            value: [0; KEYWORD_TEXT_LEN],
            comment: fixed_bytes(comment),
        };
        keyword.store_value(&value);
        keyword
    }

    /// Name bytes up to the first NUL.
    pub fn name_bytes(&self) -> &[u8] {
        c_str_bytes(&self.name)
    }

    /// Name as text, replacing invalid UTF-8.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }

    /// Comment bytes up to the first NUL.
    pub fn comment_bytes(&self) -> &[u8] {
        c_str_bytes(&self.comment)
    }

    /// Comment as text, replacing invalid UTF-8.
    pub fn comment(&self) -> String {
        String::from_utf8_lossy(self.comment_bytes()).into_owned()
    }

    /// Stored type tag, or `None` if the record holds an unknown tag.
    pub fn kind(&self) -> Option<KeywordKind> {
        KeywordKind::from_raw(self.kind)
    }

    /// Decoded value, or `None` if the record holds an unknown tag.
    pub fn value(&self) -> Option<KeywordValue> {
        match self.kind()? {
            KeywordKind::Integer => Some(KeywordValue::Integer(i64::from_ne_bytes(self.value))),
            KeywordKind::Float => Some(KeywordValue::Float(f64::from_ne_bytes(self.value))),
            KeywordKind::Text => Some(KeywordValue::Text(
                String::from_utf8_lossy(c_str_bytes(&self.value)).into_owned(),
            )),
        }
    }

    /// Integer value if this is an integer keyword.
    pub fn as_integer(&self) -> Option<i64> {
        match self.value()? {
            KeywordValue::Integer(v) => Some(v),
            _ => None,
        }
    }

    /// Float value if this is a float keyword.
    pub fn as_float(&self) -> Option<f64> {
        match self.value()? {
            KeywordValue::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Replace the value, keeping name, comment and type.
    ///
    /// Returns `false` and leaves the record untouched if the value's type
    /// differs from the stored type.
    pub fn set_value(&mut self, value: impl Into<KeywordValue>) -> bool {
        let value = value.into();
        if self.kind() != Some(value.kind()) {
            return false;
        }
        self.store_value(&value);
        true
    }

    /// Copy the value slot of `other`, which must have the same type tag.
    pub(crate) fn copy_value_from(&mut self, other: &Keyword) {
        debug_assert_eq!(self.kind, other.kind);
        self.value = other.value;
    }

    /// True if name, comment and type tag match `other`; values are ignored.
    pub fn same_schema(&self, other: &Keyword) -> bool {
        self.kind == other.kind
            && self.name_bytes() == other.name_bytes()
            && self.comment_bytes() == other.comment_bytes()
    }

    /// True if the stored name equals `name` truncated to the name width.
    pub fn has_name(&self, name: &str) -> bool {
        self.name_bytes() == truncated(name.as_bytes(), KEYWORD_NAME_LEN)
    }

    fn store_value(&mut self, value: &KeywordValue) {
        self.value = match value {
            KeywordValue::Integer(v) => v.to_ne_bytes(),
            KeywordValue::Float(v) => v.to_ne_bytes(),
            KeywordValue::Text(s) => fixed_bytes(s),
        };
    }
}

impl PartialEq for Keyword {
    fn eq(&self, other: &Self) -> bool {
        if !self.same_schema(other) {
            return false;
        }
        match self.kind() {
            Some(KeywordKind::Integer) => {
                i64::from_ne_bytes(self.value) == i64::from_ne_bytes(other.value)
            }
            Some(KeywordKind::Float) => {
                f64::from_ne_bytes(self.value) == f64::from_ne_bytes(other.value)
            }
            Some(KeywordKind::Text) => c_str_bytes(&self.value) == c_str_bytes(&other.value),
            None => false,
        }
    }
}

impl std::fmt::Debug for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyword")
            .field("name", &self.name())
            .field("value", &self.value())
            .field("comment", &self.comment())
            .finish()
    }
}

/// Position of the first keyword named `name`.
///
/// Names are not required to be unique; the first match wins.
pub fn find(table: &[Keyword], name: &str) -> Option<usize> {
    table.iter().position(|keyword| keyword.has_name(name))
}

fn truncated(bytes: &[u8], width: usize) -> &[u8] {
    let bytes = c_str_bytes(bytes);
    &bytes[..bytes.len().min(width - 1)]
}

fn fixed_bytes<const N: usize>(text: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let src = truncated(text.as_bytes(), N);
    out[..src.len()].copy_from_slice(src);
    out
}

fn c_str_bytes(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}
