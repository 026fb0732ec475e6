use mypyc_types::{PrimitiveKind, RType};

/// The C spelling of `ty`'s native representation (§4.1, §6's ABI).
///
/// Unboxed primitives get a fixed-width C type; everything else
/// (including `float`, boxed by default per `RType::is_unboxed`'s doc)
/// is a `PyObject *`. `RStruct`/`RTuple` get their own generated struct
/// name rather than a builtin spelling.
pub fn c_type_name(ty: &RType) -> String {
    match ty {
        RType::RPrimitive(p) => match p.kind() {
            PrimitiveKind::Int => "CPyTagged".to_string(),
            PrimitiveKind::I8 => "int8_t".to_string(),
            PrimitiveKind::I16 => "int16_t".to_string(),
            PrimitiveKind::I32 => "int32_t".to_string(),
            PrimitiveKind::I64 => "int64_t".to_string(),
            PrimitiveKind::U8 => "uint8_t".to_string(),
            PrimitiveKind::U16 => "uint16_t".to_string(),
            PrimitiveKind::U32 => "uint32_t".to_string(),
            PrimitiveKind::U64 => "uint64_t".to_string(),
            PrimitiveKind::Bool => "char".to_string(),
            PrimitiveKind::Float
            | PrimitiveKind::Str
            | PrimitiveKind::Bytes
            | PrimitiveKind::List
            | PrimitiveKind::Dict
            | PrimitiveKind::Set
            | PrimitiveKind::FrozenSet
            | PrimitiveKind::Tuple
            | PrimitiveKind::NoneType
            | PrimitiveKind::Object => "PyObject *".to_string(),
        },
        RType::RTuple(t) if t.items().iter().all(RType::is_unboxed) => tuple_struct_name(t),
        RType::RTuple(_) => "PyObject *".to_string(),
        RType::RInstance(_) | RType::RUnion(_) => "PyObject *".to_string(),
        RType::RStruct(s) => format!("struct {}", s.name()),
        RType::RVoid => "void".to_string(),
    }
}

fn tuple_struct_name(t: &mypyc_types::RTuple) -> String {
    let mangled: Vec<String> = t.items().iter().map(c_type_mangle).collect();
    format!("tuple_{}", mangled.join("_"))
}

fn c_type_mangle(ty: &RType) -> String {
    c_type_name(ty)
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}
