//! Proptest strategies for generating valid interface models
//!
//! This module provides strategies for property-based testing of the
//! analyzer, the C emitter and the stub simulator.

#![allow(dead_code)]

use hdi_gen::ast::{EnumDecl, EnumMember, FieldDecl, StructDecl};
use hdi_gen::semantic::catalog::MarshalRule;
use hdi_gen::sim::Value;
use hdi_gen::{Direction, InterfaceDecl, MethodDecl, ParamDecl, Prim, TypeRef};
use proptest::prelude::*;

// ════════════════════════════════════════════════════════════
// Basic Strategies
// ════════════════════════════════════════════════════════════

/// Parameter and field names; the prefix keeps clear of C keywords
/// and of the names generated stubs declare themselves
pub fn param_name() -> impl Strategy<Value = String> {
    "p[a-z][a-z0-9]{0,10}".prop_map(|s| s.to_string())
}

/// Method and interface names
pub fn type_name() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{2,10}[A-Z]?[a-z0-9]{0,6}".prop_map(|s| s.to_string())
}

/// Method names; `Max` would take the command id of the count sentinel
pub fn method_name() -> impl Strategy<Value = String> {
    type_name().prop_filter("collides with the MAX sentinel", |name| name != "Max")
}

pub fn prim() -> impl Strategy<Value = Prim> {
    prop::sample::select(Prim::ALL.to_vec())
}

pub fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::In), Just(Direction::Out), Just(Direction::InOut)]
}

// ════════════════════════════════════════════════════════════
// Type Strategies
// ════════════════════════════════════════════════════════════

pub fn enum_type() -> impl Strategy<Value = TypeRef> {
    (type_name(), 1usize..4).prop_map(|(name, count)| {
        TypeRef::Enum(EnumDecl {
            members: (0..count)
                .map(|i| EnumMember {
                    name: format!("{}_{}", name.to_uppercase(), i),
                    value: i as i64,
                })
                .collect(),
            name,
        })
    })
}

/// Element or field type: anything but descriptors, arrays and callbacks
pub fn leaf_type() -> impl Strategy<Value = TypeRef> {
    prop_oneof![
        4 => prim().prop_map(TypeRef::Prim),
        2 => Just(TypeRef::String),
        1 => enum_type(),
    ]
}

/// Struct field type: a leaf, or an array of leaves carrying its own length member
pub fn field_type() -> impl Strategy<Value = TypeRef> {
    prop_oneof![
        4 => leaf_type(),
        1 => (leaf_type(), 1u32..8).prop_map(|(ty, n)| TypeRef::bounded_array_of(ty, n)),
        1 => leaf_type().prop_map(TypeRef::array_of),
    ]
}

fn fields_of(
    names: std::collections::BTreeSet<String>,
    types: Vec<TypeRef>,
) -> Vec<FieldDecl> {
    names
        .into_iter()
        .zip(types)
        .map(|(name, ty)| FieldDecl { name, ty })
        .collect()
}

/// Struct with no struct members
pub fn flat_struct_type() -> impl Strategy<Value = TypeRef> {
    (
        type_name(),
        prop::collection::btree_set(param_name(), 1..4),
        prop::collection::vec(field_type(), 3),
    )
        .prop_map(|(name, names, types)| {
            TypeRef::Struct(StructDecl {
                name: format!("{}Part", name),
                fields: fields_of(names, types),
            })
        })
}

/// Struct whose fields may hold arrays or a nested struct
pub fn struct_type() -> impl Strategy<Value = TypeRef> {
    (
        type_name(),
        prop::collection::btree_set(param_name(), 1..4),
        prop::collection::vec(prop_oneof![3 => field_type(), 1 => flat_struct_type()], 3),
    )
        .prop_map(|(name, names, types)| {
            TypeRef::Struct(StructDecl {
                name: format!("{}Info", name),
                fields: fields_of(names, types),
            })
        })
}

/// Any type with a marshalling rule at parameter level, except callbacks
pub fn param_type() -> impl Strategy<Value = TypeRef> {
    prop_oneof![
        4 => leaf_type(),
        1 => Just(TypeRef::Fd),
        2 => (leaf_type(), 1u32..8).prop_map(|(ty, n)| TypeRef::bounded_array_of(ty, n)),
        1 => leaf_type().prop_map(TypeRef::array_of),
        2 => struct_type(),
        1 => struct_type().prop_map(TypeRef::array_of),
    ]
}

/// Types no C stub rule exists for
pub fn unmapped_type() -> impl Strategy<Value = TypeRef> {
    prop_oneof![
        (leaf_type(), leaf_type()).prop_map(|(k, v)| TypeRef::Map {
            key: Box::new(k),
            value: Box::new(v),
        }),
        type_name().prop_map(|name| TypeRef::Interface(hdi_gen::ast::InterfaceRef {
            name,
            callback: false,
        })),
        leaf_type().prop_map(|ty| TypeRef::array_of(TypeRef::array_of(ty))),
    ]
}

// ════════════════════════════════════════════════════════════
// Composite Strategies
// ════════════════════════════════════════════════════════════

pub fn method() -> impl Strategy<Value = MethodDecl> {
    (
        type_name(),
        prop::collection::btree_set(param_name(), 0..5),
        prop::collection::vec((direction(), param_type()), 5),
    )
        .prop_map(|(name, names, params)| {
            let mut method = MethodDecl::new(&name);
            for (name, (direction, ty)) in names.into_iter().zip(params) {
                method = method.param(ParamDecl::new(&name, direction, ty));
            }
            method
        })
}

/// Interface with 0..8 uniquely named methods
pub fn interface() -> impl Strategy<Value = InterfaceDecl> {
    (
        type_name(),
        prop::collection::btree_set(method_name(), 0..8),
        prop::collection::vec(method(), 8),
    )
        .prop_map(|(name, names, methods)| {
            let mut iface = InterfaceDecl::new(&name);
            for (name, mut method) in names.into_iter().zip(methods) {
                method.name = name;
                iface = iface.method(method);
            }
            iface
        })
}

// ════════════════════════════════════════════════════════════
// Value Strategies
// ════════════════════════════════════════════════════════════

pub fn text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _.-]{0,24}".prop_map(|s| s.to_string())
}

fn prim_value(prim: Prim) -> BoxedStrategy<Value> {
    match prim {
        Prim::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
        Prim::I8 => any::<i8>().prop_map(Value::I8).boxed(),
        Prim::I16 => any::<i16>().prop_map(Value::I16).boxed(),
        Prim::I32 => any::<i32>().prop_map(Value::I32).boxed(),
        Prim::I64 => any::<i64>().prop_map(Value::I64).boxed(),
        Prim::U8 => any::<u8>().prop_map(Value::U8).boxed(),
        Prim::U16 => any::<u16>().prop_map(Value::U16).boxed(),
        Prim::U32 => any::<u32>().prop_map(Value::U32).boxed(),
        Prim::U64 => any::<u64>().prop_map(Value::U64).boxed(),
        Prim::F32 => (-1.0e6f32..1.0e6f32).prop_map(Value::F32).boxed(),
        Prim::F64 => (-1.0e12f64..1.0e12f64).prop_map(Value::F64).boxed(),
    }
}

/// A value that fits `rule`
pub fn value_for(rule: &MarshalRule) -> BoxedStrategy<Value> {
    match rule {
        MarshalRule::Scalar(prim) => prim_value(*prim),
        MarshalRule::Enum { .. } => (0u64..16).prop_map(Value::Enum).boxed(),
        MarshalRule::String => text().prop_map(Value::String).boxed(),
        MarshalRule::Fd => (0i32..1024).prop_map(Value::Fd).boxed(),
        MarshalRule::Array { element, max_len, .. } => {
            let len = (*max_len).min(6) as usize;
            prop::collection::vec(value_for(element), 0..=len)
                .prop_map(Value::Array)
                .boxed()
        }
        MarshalRule::Struct { fields, .. } => {
            let names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
            let values: Vec<BoxedStrategy<Value>> = fields.iter().map(|f| value_for(&f.rule)).collect();
            values
                .prop_map(move |values| Value::Struct(names.iter().cloned().zip(values).collect()))
                .boxed()
        }
        MarshalRule::Callback { interface } => {
            let interface = interface.clone();
            (1u32..1000)
                .prop_map(move |handle| {
                    Value::Callback(hdi_gen::sim::CallbackHandle {
                        interface: interface.clone(),
                        handle,
                        mode: hdi_gen::Mode::User,
                    })
                })
                .boxed()
        }
    }
}
