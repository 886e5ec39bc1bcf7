//! Element type tags and the plain-data sample types they describe.
//!
//! The tag stored in the region header is a raw `u8` so a corrupted or
//! foreign header can still be inspected; [`ElementType::from_tag`] is the
//! only way back into the closed set.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

/// Raw tag value of a header that was never initialized.
pub const UNINITIALIZED_TAG: u8 = 0;

/// Element type of the samples carried by a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ElementType {
    /// `u8`
    Uint8 = 1,
    /// `i8`
    Int8 = 2,
    /// `u16`
    Uint16 = 3,
    /// `i16`
    Int16 = 4,
    /// `u32`
    Uint32 = 5,
    /// `i32`
    Int32 = 6,
    /// `u64`
    Uint64 = 7,
    /// `i64`
    Int64 = 8,
    /// IEEE 754 binary32
    Float = 9,
    /// IEEE 754 binary64
    Double = 10,
    /// Pair of binary32 (re, im)
    ComplexFloat = 11,
    /// Pair of binary64 (re, im)
    ComplexDouble = 12,
    /// IEEE 754 binary16, stored as its raw bits
    Half = 13,
}

impl ElementType {
    /// Every supported element type, in tag order.
    pub const ALL: [ElementType; 13] = [
        ElementType::Uint8,
        ElementType::Int8,
        ElementType::Uint16,
        ElementType::Int16,
        ElementType::Uint32,
        ElementType::Int32,
        ElementType::Uint64,
        ElementType::Int64,
        ElementType::Float,
        ElementType::Double,
        ElementType::ComplexFloat,
        ElementType::ComplexDouble,
        ElementType::Half,
    ];

    /// Convert from the raw header tag. Returns `None` for unknown values.
    #[inline]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Uint8),
            2 => Some(Self::Int8),
            3 => Some(Self::Uint16),
            4 => Some(Self::Int16),
            5 => Some(Self::Uint32),
            6 => Some(Self::Int32),
            7 => Some(Self::Uint64),
            8 => Some(Self::Int64),
            9 => Some(Self::Float),
            10 => Some(Self::Double),
            11 => Some(Self::ComplexFloat),
            12 => Some(Self::ComplexDouble),
            13 => Some(Self::Half),
            _ => None,
        }
    }

    /// Raw tag written into the header.
    #[inline]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Width of one sample in bytes.
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            Self::Uint8 | Self::Int8 => 1,
            Self::Uint16 | Self::Int16 | Self::Half => 2,
            Self::Uint32 | Self::Int32 | Self::Float => 4,
            Self::Uint64 | Self::Int64 | Self::Double | Self::ComplexFloat => 8,
            Self::ComplexDouble => 16,
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Width in bytes of the element type identified by a raw tag.
///
/// Unknown and uninitialized tags yield 0.
#[inline]
pub const fn element_byte_width(tag: u8) -> usize {
    match ElementType::from_tag(tag) {
        Some(ty) => ty.width(),
        None => 0,
    }
}

/// Half-precision float, kept as its raw IEEE 754 binary16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Half(pub u16);

impl Half {
    /// Construct from raw binary16 bits.
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw binary16 bits.
    pub const fn to_bits(self) -> u16 {
        self.0
    }
}

/// Single-precision complex sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct ComplexF32 {
    /// Real part
    pub re: f32,
    /// Imaginary part
    pub im: f32,
}

/// Double-precision complex sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct ComplexF64 {
    /// Real part
    pub re: f64,
    /// Imaginary part
    pub im: f64,
}

const_assert_eq!(core::mem::size_of::<Half>(), 2);
const_assert_eq!(core::mem::size_of::<ComplexF32>(), 8);
const_assert_eq!(core::mem::size_of::<ComplexF64>(), 16);

/// A plain-data type that can be viewed in place over the sample array.
///
/// # Safety
///
/// Implementors must be `repr(C)` or primitive, have no padding, accept
/// every bit pattern, occupy exactly `ELEMENT_TYPE.width()` bytes and have an
/// alignment no greater than 8.
pub unsafe trait Sample: Copy + 'static {
    /// Canonical tag of this type.
    const ELEMENT_TYPE: ElementType;
}

macro_rules! impl_sample {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            unsafe impl Sample for $ty {
                const ELEMENT_TYPE: ElementType = ElementType::$tag;
            }
            const_assert_eq!(core::mem::size_of::<$ty>(), ElementType::$tag.width());
        )*
    };
}

impl_sample! {
    u8 => Uint8,
    i8 => Int8,
    u16 => Uint16,
    i16 => Int16,
    u32 => Uint32,
    i32 => Int32,
    u64 => Uint64,
    i64 => Int64,
    f32 => Float,
    f64 => Double,
    ComplexF32 => ComplexFloat,
    ComplexF64 => ComplexDouble,
    Half => Half,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrip() {
        for ty in ElementType::ALL {
            assert_eq!(ElementType::from_tag(ty.tag()), Some(ty));
        }
        assert!(ElementType::from_tag(UNINITIALIZED_TAG).is_none());
        assert!(ElementType::from_tag(14).is_none());
        assert!(ElementType::from_tag(255).is_none());
    }

    #[test]
    fn widths_match_tag_table() {
        assert_eq!(ElementType::Uint8.width(), 1);
        assert_eq!(ElementType::Half.width(), 2);
        assert_eq!(ElementType::Int32.width(), 4);
        assert_eq!(ElementType::ComplexFloat.width(), 8);
        assert_eq!(ElementType::ComplexDouble.width(), 16);
    }

    #[test]
    fn unknown_tag_has_zero_width() {
        assert_eq!(element_byte_width(UNINITIALIZED_TAG), 0);
        assert_eq!(element_byte_width(200), 0);
        assert_eq!(element_byte_width(ElementType::Double.tag()), 8);
    }

    #[test]
    fn element_type_serde_names() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            ty: ElementType,
        }
        let parsed: Wrapper = toml::from_str("ty = \"complex_double\"").unwrap();
        assert_eq!(parsed.ty, ElementType::ComplexDouble);
        let text = toml::to_string(&Wrapper { ty: ElementType::Float }).unwrap();
        assert!(text.contains("float"));
    }
}
