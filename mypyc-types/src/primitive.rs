use strum::{Display, EnumIter};

/// The distinguished value a primitive's native representation uses to
/// signal "this call raised", when the representation supports a sentinel
/// at all.
///
/// | Kind      | Operation                     |
/// | --------- | ------------------------------ |
/// | `None`    | type never signals via sentinel (always paired-flag, or never raises) |
/// | `Bits`    | a fixed bit pattern, reinterpreted at the representation's width |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSentinel {
    /// This representation has no usable sentinel; callers that can fail
    /// must be paired with an explicit `bool` error flag.
    None,
    /// A fixed bit pattern, unreachable as a legitimately produced value.
    Bits(u64),
}

/// The kind of built-in value a [`Primitive`] describes.
///
/// Closed set, per §3: tagged arbitrary-precision `int`, the fixed-width
/// integer family, `bool`, `float`, `str`, `bytes`, the four built-in
/// container types, the heap `tuple` variant, `None`, and the catch-all
/// `object`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrimitiveKind {
    /// Tagged arbitrary-precision `int`.
    Int,
    /// Signed 8-bit integer.
    I8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
    /// One-byte boolean.
    Bool,
    /// IEEE-754 double, boxed except in contexts that know it's unboxed.
    Float,
    /// Immutable text.
    Str,
    /// Immutable byte string.
    Bytes,
    /// Built-in mutable list.
    List,
    /// Built-in mutable mapping.
    Dict,
    /// Built-in mutable set.
    Set,
    /// Built-in immutable set.
    FrozenSet,
    /// The heap `tuple` object, as opposed to the value-typed [`crate::RTuple`].
    Tuple,
    /// The singleton `None`.
    NoneType,
    /// The catch-all erased/dynamic type.
    Object,
}

/// A built-in value with a fixed runtime representation (§4.1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Primitive {
    kind: PrimitiveKind,
    name: &'static str,
    is_unboxed: bool,
    size: Option<u32>,
    error_overlap: bool,
    error_sentinel: ErrorSentinel,
}

impl Primitive {
    /// The primitive's kind.
    pub const fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    /// The primitive's stable diagnostic name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this primitive has a compact non-heap representation.
    pub const fn is_unboxed(&self) -> bool {
        self.is_unboxed
    }

    /// The unboxed size in bytes, if unboxed.
    pub const fn size(&self) -> Option<u32> {
        self.size
    }

    /// Whether the error sentinel collides with a legitimate value,
    /// forcing a paired error flag at call boundaries.
    pub const fn error_overlap(&self) -> bool {
        self.error_overlap
    }

    /// The distinguished error sentinel, if this representation has one.
    pub const fn error_sentinel(&self) -> ErrorSentinel {
        self.error_sentinel
    }

    /// The boxed (heap-allocated) form of this primitive: same kind, but
    /// represented as a `PyObject*` with a NULL error sentinel instead of
    /// an in-register bit pattern. A primitive that is already boxed
    /// (e.g. `str`) returns a clone of itself.
    pub fn boxed(&self) -> Self {
        if !self.is_unboxed {
            return self.clone();
        }
        Self {
            kind: self.kind,
            name: self.name,
            is_unboxed: false,
            size: None,
            error_overlap: false,
            error_sentinel: ErrorSentinel::Bits(0),
        }
    }

    /// Look up the canonical [`Primitive`] describing `kind`.
    ///
    /// The tagged integer uses the lowest bit as its tag (0 = small
    /// integer shifted left by one, 1 = pointer to a heap bignum); its
    /// sentinel, `isize::MIN`'s bit pattern, is unreachable as a shifted
    /// small integer because shifting any representable `isize` left by
    /// one cannot reproduce that pattern (see `DESIGN.md`).
    pub fn of(kind: PrimitiveKind) -> Self {
        use PrimitiveKind::*;
        match kind {
            Int => Self {
                kind,
                name: "int",
                is_unboxed: true,
                size: Some(8),
                error_overlap: false,
                error_sentinel: ErrorSentinel::Bits(i64::MIN as u64),
            },
            I8 => fixed_width(kind, "i8", 1, i8::MIN as i64 as u64),
            I16 => fixed_width(kind, "i16", 2, i16::MIN as i64 as u64),
            I32 => fixed_width(kind, "i32", 4, i32::MIN as i64 as u64),
            I64 => fixed_width(kind, "i64", 8, i64::MIN as u64),
            U8 => fixed_width(kind, "u8", 1, u8::MAX as u64),
            U16 => fixed_width(kind, "u16", 2, u16::MAX as u64),
            U32 => fixed_width(kind, "u32", 4, u32::MAX as u64),
            U64 => fixed_width(kind, "u64", 8, u64::MAX),
            Bool => Self {
                kind,
                name: "bool",
                is_unboxed: true,
                size: Some(1),
                // The sentinel value 2 collides with no valid bool (0/1),
                // but bool is paired-flag per spec regardless, since a
                // 1-byte representation has no room to distinguish
                // "false" from "error" by value alone at every call site.
                error_overlap: true,
                error_sentinel: ErrorSentinel::Bits(2),
            },
            Float => Self {
                kind,
                name: "float",
                is_unboxed: false,
                size: Some(8),
                error_overlap: true,
                error_sentinel: ErrorSentinel::Bits(0x7ff8_0000_0000_0001),
            },
            Str => heap(kind, "str"),
            Bytes => heap(kind, "bytes"),
            List => heap(kind, "list"),
            Dict => heap(kind, "dict"),
            Set => heap(kind, "set"),
            FrozenSet => heap(kind, "frozenset"),
            Tuple => heap(kind, "tuple"),
            NoneType => Self {
                kind,
                name: "None",
                is_unboxed: false,
                size: None,
                error_overlap: false,
                error_sentinel: ErrorSentinel::None,
            },
            Object => heap(kind, "object"),
        }
    }
}

fn fixed_width(kind: PrimitiveKind, name: &'static str, size: u32, sentinel_bits: u64) -> Primitive {
    Primitive {
        kind,
        name,
        is_unboxed: true,
        size: Some(size),
        error_overlap: false,
        error_sentinel: ErrorSentinel::Bits(sentinel_bits),
    }
}

fn heap(kind: PrimitiveKind, name: &'static str) -> Primitive {
    Primitive {
        kind,
        name,
        is_unboxed: false,
        size: None,
        // Heap objects signal failure via a NULL pointer return, which is
        // never a legal pointer value: no overlap.
        error_overlap: false,
        error_sentinel: ErrorSentinel::Bits(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn tagged_int_is_unboxed() {
        let p = Primitive::of(PrimitiveKind::Int);
        assert!(p.is_unboxed());
        assert!(!p.error_overlap());
    }

    #[test]
    fn bool_has_error_overlap() {
        let p = Primitive::of(PrimitiveKind::Bool);
        assert!(p.error_overlap());
        assert_eq!(p.error_sentinel(), ErrorSentinel::Bits(2));
    }

    #[test]
    fn float_has_error_overlap() {
        let p = Primitive::of(PrimitiveKind::Float);
        assert!(p.error_overlap());
        assert!(!p.is_unboxed());
    }

    #[test]
    fn every_kind_constructs() {
        for kind in PrimitiveKind::iter() {
            let _ = Primitive::of(kind);
        }
    }

    #[test]
    fn heap_types_are_boxed() {
        for kind in [
            PrimitiveKind::Str,
            PrimitiveKind::Bytes,
            PrimitiveKind::List,
            PrimitiveKind::Dict,
            PrimitiveKind::Set,
            PrimitiveKind::FrozenSet,
            PrimitiveKind::Tuple,
            PrimitiveKind::Object,
        ] {
            assert!(!Primitive::of(kind).is_unboxed());
        }
    }
}
