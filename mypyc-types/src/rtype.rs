use crate::{ClassId, ErrorSentinel, Primitive, PrimitiveKind, RTypeError};

/// A fixed-length, value-typed tuple. Boxed to a heap `tuple` whenever it
/// crosses into an erased (object-typed) context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RTuple {
    items: Vec<RType>,
}

impl RTuple {
    /// Build a tuple type from its element types.
    pub fn new(items: Vec<RType>) -> Result<Self, RTypeError> {
        if items.is_empty() {
            return Err(RTypeError::EmptyAggregate { what: "tuple" });
        }
        Ok(Self { items })
    }

    /// The element types, in order.
    pub fn items(&self) -> &[RType] {
        &self.items
    }
}

/// A named, typed field of an [`RStruct`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RStructField {
    /// The field's name, used for C struct member naming.
    pub name: String,
    /// The field's type.
    pub ty: RType,
}

/// A raw C struct with named typed fields, used for internal compiler
/// helpers (e.g. generator state, §4.4).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RStruct {
    name: String,
    fields: Vec<RStructField>,
}

impl RStruct {
    /// Build a struct type from its name and fields.
    pub fn new(name: impl Into<String>, fields: Vec<RStructField>) -> Result<Self, RTypeError> {
        if fields.is_empty() {
            return Err(RTypeError::EmptyAggregate { what: "struct" });
        }
        Ok(Self {
            name: name.into(),
            fields,
        })
    }

    /// The struct's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The struct's fields, in declaration order.
    pub fn fields(&self) -> &[RStructField] {
        &self.fields
    }
}

/// The closed set of value representations every IR register, argument,
/// and return value is typed with (§3).
///
/// Invariant: the type of a register never changes across its lifetime;
/// boxing and unboxing are always explicit `Box`/`Unbox` ops, never
/// implicit conversions performed by another op.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RType {
    /// A built-in with a fixed runtime representation.
    RPrimitive(Primitive),
    /// A fixed-length, value-type tuple.
    RTuple(RTuple),
    /// An instance of a native class within the compilation unit.
    RInstance(ClassId),
    /// A set of alternative types, always represented boxed.
    RUnion(Vec<RType>),
    /// A raw C struct with named typed fields.
    RStruct(RStruct),
    /// The no-value type of sink operations.
    RVoid,
}

impl RType {
    /// Shorthand for the tagged `int` primitive.
    pub fn int() -> Self {
        Self::primitive(PrimitiveKind::Int)
    }

    /// Shorthand for the `bool` primitive.
    pub fn bool() -> Self {
        Self::primitive(PrimitiveKind::Bool)
    }

    /// Shorthand for the `float` primitive.
    pub fn float() -> Self {
        Self::primitive(PrimitiveKind::Float)
    }

    /// Shorthand for the catch-all `object` primitive.
    pub fn object() -> Self {
        Self::primitive(PrimitiveKind::Object)
    }

    /// Shorthand for the `None` primitive.
    pub fn none() -> Self {
        Self::primitive(PrimitiveKind::NoneType)
    }

    /// Build an `RType` wrapping a canonical primitive kind.
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::RPrimitive(Primitive::of(kind))
    }

    /// Build a union type. Rejects degenerate unions (fewer than two
    /// alternatives): a single-type "union" should simply be that type.
    pub fn union(mut items: Vec<RType>) -> Result<Self, RTypeError> {
        items.dedup();
        if items.len() < 2 {
            return Err(RTypeError::DegenerateUnion { count: items.len() });
        }
        Ok(Self::RUnion(items))
    }

    /// True iff this type has a compact non-heap representation (§4.1).
    ///
    /// Unboxed for: the tagged integer, every fixed-width integer, `bool`,
    /// `float` (the caller decides contextually whether a given `float`
    /// register is unboxed; at the type level it reports `false` since
    /// `float` is boxed by default and only unboxed where the builder
    /// specifically tracks it — see `mypyc-irgen`), `RTuple` of all-unboxed
    /// items, and `RStruct`.
    pub fn is_unboxed(&self) -> bool {
        match self {
            Self::RPrimitive(p) => p.is_unboxed(),
            Self::RTuple(t) => t.items().iter().all(RType::is_unboxed),
            Self::RStruct(_) => true,
            Self::RInstance(_) | Self::RUnion(_) | Self::RVoid => false,
        }
    }

    /// True iff the error sentinel collides with a legal value, forcing a
    /// paired error flag rather than sentinel-return error discipline.
    pub fn error_overlap(&self) -> bool {
        match self {
            Self::RPrimitive(p) => p.error_overlap(),
            // A tuple's or struct's "error" is signalled by the caller's
            // flag regardless of payload, so there is nothing to overlap.
            Self::RTuple(_) | Self::RStruct(_) => false,
            // Always boxed (pointer-represented); NULL never overlaps.
            Self::RInstance(_) | Self::RUnion(_) => false,
            Self::RVoid => false,
        }
    }

    /// Whether any register of this type must be reference counted.
    pub fn is_refcounted(&self) -> bool {
        !self.is_unboxed()
    }

    /// The heap type reachable via `Box` from this type.
    ///
    /// Primitives box to their already-boxed selves if already boxed;
    /// unboxed primitives box to the same `PrimitiveKind` with its boxed
    /// (heap) representation; tuples box to the heap `tuple` primitive;
    /// struct and union/instance types have no narrower boxed form than
    /// `object`.
    pub fn boxed(&self) -> RType {
        match self {
            Self::RPrimitive(p) => Self::RPrimitive(p.boxed()),
            Self::RTuple(_) => Self::primitive(PrimitiveKind::Tuple),
            Self::RInstance(_) | Self::RUnion(_) => self.clone(),
            Self::RStruct(_) | Self::RVoid => Self::object(),
        }
    }

    /// The least upper bound of `a` and `b` within the closed RType
    /// lattice, falling back to `object` when no tighter join exists.
    pub fn join(a: &RType, b: &RType) -> RType {
        if a == b {
            return a.clone();
        }
        match (a, b) {
            (Self::RVoid, other) | (other, Self::RVoid) => other.clone(),
            (Self::RPrimitive(pa), Self::RPrimitive(pb)) if pa.kind() == pb.kind() => a.clone(),
            (Self::RTuple(ta), Self::RTuple(tb)) if ta.items().len() == tb.items().len() => {
                let items = ta
                    .items()
                    .iter()
                    .zip(tb.items())
                    .map(|(x, y)| RType::join(x, y))
                    .collect();
                RTuple::new(items)
                    .map(RType::RTuple)
                    .unwrap_or_else(|_| Self::object())
            }
            (Self::RInstance(ca), Self::RInstance(cb)) if ca == cb => a.clone(),
            _ => Self::object(),
        }
    }

    /// The sentinel value that signals failure for this type's return
    /// convention, if it has one.
    pub fn error_sentinel(&self) -> ErrorSentinel {
        match self {
            Self::RPrimitive(p) => p.error_sentinel(),
            Self::RInstance(_) | Self::RUnion(_) | Self::RTuple(_) | Self::RStruct(_) => {
                ErrorSentinel::Bits(0)
            }
            Self::RVoid => ErrorSentinel::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_identical_is_identity() {
        assert_eq!(RType::join(&RType::int(), &RType::int()), RType::int());
    }

    #[test]
    fn join_different_primitives_falls_back_to_object() {
        assert_eq!(RType::join(&RType::int(), &RType::bool()), RType::object());
    }

    #[test]
    fn join_with_void_returns_other() {
        assert_eq!(RType::join(&RType::RVoid, &RType::int()), RType::int());
    }

    #[test]
    fn tuple_of_unboxed_is_unboxed() {
        let t = RType::RTuple(RTuple::new(vec![RType::int(), RType::bool()]).unwrap());
        assert!(t.is_unboxed());
    }

    #[test]
    fn tuple_with_boxed_member_is_boxed() {
        let t = RType::RTuple(RTuple::new(vec![RType::int(), RType::object()]).unwrap());
        assert!(!t.is_unboxed());
    }

    #[test]
    fn degenerate_union_rejected() {
        assert!(RType::union(vec![RType::int()]).is_err());
    }

    #[test]
    fn boxing_unboxed_int_gives_boxed_int_primitive() {
        let boxed = RType::int().boxed();
        match boxed {
            RType::RPrimitive(p) => assert!(!p.is_unboxed()),
            _ => panic!("expected boxed primitive"),
        }
    }

    #[test]
    fn boxing_is_idempotent() {
        let once = RType::int().boxed();
        let twice = once.boxed();
        assert_eq!(once, twice);
    }
}
