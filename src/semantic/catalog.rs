//! Type marshalling catalog
//!
//! Maps every [`TypeRef`] to the one fixed rule used to move it through an
//! `HdfSBuf`. The catalog is read-only once built and may be shared across
//! interfaces. A type with no rule is an integrity failure; there is no
//! fallback rule.

use crate::ast::{Direction, ParamDecl, Prim, TypeRef};
use crate::error::{IntegrityError, Location};

/// Fixed-width encodings supported by the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireKind {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    Double,
}

impl WireKind {
    /// Suffix of the `HdfSbufRead*` / `HdfSbufWrite*` primitive
    pub fn sbuf_suffix(self) -> &'static str {
        match self {
            WireKind::Int8 => "Int8",
            WireKind::Int16 => "Int16",
            WireKind::Int32 => "Int32",
            WireKind::Int64 => "Int64",
            WireKind::Uint8 => "Uint8",
            WireKind::Uint16 => "Uint16",
            WireKind::Uint32 => "Uint32",
            WireKind::Uint64 => "Uint64",
            WireKind::Float => "Float",
            WireKind::Double => "Double",
        }
    }

    /// C type the primitive reads into
    pub fn c_type(self) -> &'static str {
        match self {
            WireKind::Int8 => "int8_t",
            WireKind::Int16 => "int16_t",
            WireKind::Int32 => "int32_t",
            WireKind::Int64 => "int64_t",
            WireKind::Uint8 => "uint8_t",
            WireKind::Uint16 => "uint16_t",
            WireKind::Uint32 => "uint32_t",
            WireKind::Uint64 => "uint64_t",
            WireKind::Float => "float",
            WireKind::Double => "double",
        }
    }

    /// Payload width in bytes, before padding
    pub fn width(self) -> usize {
        match self {
            WireKind::Int8 | WireKind::Uint8 => 1,
            WireKind::Int16 | WireKind::Uint16 => 2,
            WireKind::Int32 | WireKind::Uint32 | WireKind::Float => 4,
            WireKind::Int64 | WireKind::Uint64 | WireKind::Double => 8,
        }
    }
}

/// Wire encoding of a primitive
pub fn wire_kind(prim: Prim) -> WireKind {
    match prim {
        // Booleans travel as one signed byte
        Prim::Bool | Prim::I8 => WireKind::Int8,
        Prim::I16 => WireKind::Int16,
        Prim::I32 => WireKind::Int32,
        Prim::I64 => WireKind::Int64,
        Prim::U8 => WireKind::Uint8,
        Prim::U16 => WireKind::Uint16,
        Prim::U32 => WireKind::Uint32,
        Prim::U64 => WireKind::Uint64,
        Prim::F32 => WireKind::Float,
        Prim::F64 => WireKind::Double,
    }
}

/// C spelling of a primitive
pub fn prim_c_type(prim: Prim) -> &'static str {
    match prim {
        Prim::Bool => "bool",
        other => wire_kind(other).c_type(),
    }
}

/// Enums travel as 64-bit unsigned values
pub const ENUM_WIRE: WireKind = WireKind::Uint64;

/// Marshalling rule for one value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarshalRule {
    /// Fixed-width value, no allocation
    Scalar(Prim),
    /// Fixed-width 64-bit value cast to the named enum
    Enum { name: String },
    /// Read-and-duplicate text
    String,
    /// Descriptor read through the buffer's fd primitive
    Fd,
    /// Count, bound check, allocate, then each element in order
    Array {
        element: Box<MarshalRule>,
        max_len: u32,
        /// `max_len` comes from a declared bound rather than the ceiling
        bounded: bool,
    },
    /// Each field in declaration order
    Struct { name: String, fields: Vec<FieldRule> },
    /// Remote handle re-hydrated into a local proxy
    Callback { interface: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    pub name: String,
    pub rule: MarshalRule,
}

impl MarshalRule {
    /// Decoding this value may acquire something the cleanup chain must release
    pub fn may_acquire(&self) -> bool {
        match self {
            MarshalRule::Scalar(_) | MarshalRule::Enum { .. } => false,
            MarshalRule::String
            | MarshalRule::Fd
            | MarshalRule::Array { .. }
            | MarshalRule::Callback { .. } => true,
            MarshalRule::Struct { fields, .. } => fields.iter().any(|f| f.rule.may_acquire()),
        }
    }

    /// Size and alignment of the C representation (LP64)
    pub fn c_layout(&self) -> (usize, usize) {
        match self {
            MarshalRule::Scalar(prim) => {
                let width = wire_kind(*prim).width();
                (width, width)
            }
            MarshalRule::Enum { .. } | MarshalRule::Fd => (4, 4),
            MarshalRule::String | MarshalRule::Callback { .. } => (8, 8),
            // Pointer plus a trailing u32 length, padded
            MarshalRule::Array { .. } => (16, 8),
            MarshalRule::Struct { fields, .. } => {
                let mut size = 0usize;
                let mut align = 1usize;
                for field in fields {
                    let (field_size, field_align) = field.rule.c_layout();
                    size = size.div_ceil(field_align) * field_align + field_size;
                    align = align.max(field_align);
                }
                (size.div_ceil(align).max(1) * align, align)
            }
        }
    }

    /// Size of one array element as C sees it
    pub fn element_size(&self) -> usize {
        match self {
            // Arrays are flattened into pointer + length for elements
            MarshalRule::Array { .. } => 8,
            other => other.c_layout().0,
        }
    }
}

/// Where a type appears; some rules only apply at parameter level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nesting {
    Param,
    Element,
    Field,
}

/// Read-only catalog of marshalling rules
#[derive(Debug, Clone)]
pub struct Catalog {
    max_buffer: usize,
}

impl Catalog {
    /// Catalog using the standard buffer ceiling
    pub fn new() -> Self {
        Self::with_buffer_ceiling(hdf_rt::sbuf::HDI_BUFF_MAX_SIZE)
    }

    /// Catalog with a custom ceiling on array payloads
    pub fn with_buffer_ceiling(max_buffer: usize) -> Self {
        Self { max_buffer }
    }

    pub fn buffer_ceiling(&self) -> usize {
        self.max_buffer
    }

    /// Rule for a method parameter
    pub fn rule_for_param(
        &self,
        param: &ParamDecl,
        at: &Location,
    ) -> Result<MarshalRule, IntegrityError> {
        let rule = self.rule_for(&param.ty, Nesting::Param, at)?;
        if matches!(rule, MarshalRule::Callback { .. }) && param.direction != Direction::In {
            return Err(IntegrityError::UnsupportedDirection {
                at: at.clone(),
                ty: param.ty.to_string(),
            });
        }
        Ok(rule)
    }

    /// Rule for a type appearing directly as a parameter
    pub fn rule_for_type(&self, ty: &TypeRef, at: &Location) -> Result<MarshalRule, IntegrityError> {
        self.rule_for(ty, Nesting::Param, at)
    }

    fn unmapped(ty: &TypeRef, at: &Location) -> IntegrityError {
        IntegrityError::UnmappedType {
            at: at.clone(),
            ty: ty.to_string(),
        }
    }

    fn rule_for(
        &self,
        ty: &TypeRef,
        nesting: Nesting,
        at: &Location,
    ) -> Result<MarshalRule, IntegrityError> {
        match ty {
            TypeRef::Prim(prim) => Ok(MarshalRule::Scalar(*prim)),
            TypeRef::Enum(decl) => Ok(MarshalRule::Enum {
                name: decl.name.clone(),
            }),
            TypeRef::String => Ok(MarshalRule::String),
            TypeRef::Fd if nesting == Nesting::Param => Ok(MarshalRule::Fd),
            TypeRef::Fd => Err(Self::unmapped(ty, at)),
            TypeRef::Array { element, bound } => {
                if nesting == Nesting::Element {
                    return Err(Self::unmapped(ty, at));
                }
                let element = self.rule_for(element, Nesting::Element, at)?;
                let ceiling = (self.max_buffer / element.element_size().max(1)) as u32;
                let max_len = match bound {
                    Some(n) if *n > ceiling => {
                        return Err(IntegrityError::ArrayTooLarge {
                            at: at.clone(),
                            bound: *n,
                            max: ceiling,
                        })
                    }
                    Some(n) => *n,
                    None => ceiling,
                };
                Ok(MarshalRule::Array {
                    element: Box::new(element),
                    max_len,
                    bounded: bound.is_some(),
                })
            }
            TypeRef::Struct(decl) => {
                let mut fields = Vec::with_capacity(decl.fields.len());
                for field in &decl.fields {
                    fields.push(FieldRule {
                        name: field.name.clone(),
                        rule: self.rule_for(&field.ty, Nesting::Field, at)?,
                    });
                }
                Ok(MarshalRule::Struct {
                    name: decl.name.clone(),
                    fields,
                })
            }
            TypeRef::Interface(iface) if iface.callback && nesting == Nesting::Param => {
                Ok(MarshalRule::Callback {
                    interface: iface.name.clone(),
                })
            }
            TypeRef::Interface(_) | TypeRef::Map { .. } => Err(Self::unmapped(ty, at)),
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{EnumDecl, FieldDecl, InterfaceRef, StructDecl};

    fn at() -> Location {
        Location::interface("Test").method("M").param("p")
    }

    fn point() -> TypeRef {
        TypeRef::Struct(StructDecl {
            name: "Point".to_string(),
            fields: vec![
                FieldDecl {
                    name: "x".to_string(),
                    ty: TypeRef::Prim(Prim::I32),
                },
                FieldDecl {
                    name: "label".to_string(),
                    ty: TypeRef::String,
                },
            ],
        })
    }

    #[test]
    fn test_every_supported_variant_has_a_rule() {
        let catalog = Catalog::new();
        let corpus = vec![
            TypeRef::Prim(Prim::U16),
            TypeRef::String,
            TypeRef::Fd,
            TypeRef::array_of(TypeRef::Prim(Prim::I32)),
            TypeRef::array_of(point()),
            point(),
            TypeRef::Enum(EnumDecl {
                name: "Mode".to_string(),
                members: vec![],
            }),
            TypeRef::callback("SensorCallback"),
        ];
        for ty in corpus {
            assert!(catalog.rule_for_type(&ty, &at()).is_ok(), "no rule for {}", ty);
        }
        for prim in Prim::ALL {
            assert_eq!(
                catalog.rule_for_type(&TypeRef::Prim(prim), &at()).unwrap(),
                MarshalRule::Scalar(prim)
            );
        }
    }

    #[test]
    fn test_unmapped_variants_are_integrity_failures() {
        let catalog = Catalog::new();
        let map = TypeRef::Map {
            key: Box::new(TypeRef::String),
            value: Box::new(TypeRef::Prim(Prim::I32)),
        };
        let plain_iface = TypeRef::Interface(InterfaceRef {
            name: "Other".to_string(),
            callback: false,
        });
        let nested = TypeRef::array_of(TypeRef::array_of(TypeRef::Prim(Prim::U8)));
        let fd_array = TypeRef::array_of(TypeRef::Fd);
        for ty in [map, plain_iface, nested, fd_array] {
            let err = catalog.rule_for_type(&ty, &at()).unwrap_err();
            assert!(
                matches!(err, IntegrityError::UnmappedType { .. }),
                "{} mapped to {:?}",
                ty,
                err
            );
        }
    }

    #[test]
    fn test_array_ceiling_depends_on_element_size() {
        let catalog = Catalog::with_buffer_ceiling(64);
        let rule = catalog
            .rule_for_type(&TypeRef::array_of(TypeRef::Prim(Prim::U32)), &at())
            .unwrap();
        assert!(matches!(rule, MarshalRule::Array { max_len: 16, bounded: false, .. }));

        let err = catalog
            .rule_for_type(&TypeRef::bounded_array_of(TypeRef::Prim(Prim::U64), 9), &at())
            .unwrap_err();
        assert_eq!(
            err,
            IntegrityError::ArrayTooLarge {
                at: at(),
                bound: 9,
                max: 8
            }
        );
    }

    #[test]
    fn test_out_callback_is_rejected() {
        let catalog = Catalog::new();
        let param = ParamDecl::output("cb", TypeRef::callback("SensorCallback"));
        assert!(matches!(
            catalog.rule_for_param(&param, &at()),
            Err(IntegrityError::UnsupportedDirection { .. })
        ));
    }

    #[test]
    fn test_struct_layout() {
        let rule = Catalog::new().rule_for_type(&point(), &at()).unwrap();
        // int32 at 0, pointer at 8
        assert_eq!(rule.c_layout(), (16, 8));
        assert!(rule.may_acquire());
        assert!(!MarshalRule::Scalar(Prim::Bool).may_acquire());
    }
}
