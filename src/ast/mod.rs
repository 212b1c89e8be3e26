//! Interface model consumed by the stub generator
//!
//! The model arrives already parsed and resolved from the IDL front end
//! (serialized as JSON); nothing here is mutated during generation.

use serde::{Deserialize, Serialize};

/// A file worth of interfaces sharing one package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceFile {
    pub package: String,
    pub interfaces: Vec<InterfaceDecl>,
}

/// Interface version declared in the package statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Default for Version {
    fn default() -> Self {
        Version { major: 1, minor: 0 }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Interface declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    #[serde(default)]
    pub version: Version,
    /// Implemented by the client and invoked by the service
    #[serde(default)]
    pub callback: bool,
    pub methods: Vec<MethodDecl>,
}

/// Method declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    /// Position in the interface; absent means "declaration position"
    #[serde(default)]
    pub ordinal: Option<u32>,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
}

/// Method parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    pub direction: Direction,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

/// Parameter direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
    InOut,
}

impl Direction {
    /// Travels in the request
    pub fn is_in(self) -> bool {
        matches!(self, Direction::In | Direction::InOut)
    }

    /// Travels in the reply
    pub fn is_out(self) -> bool {
        matches!(self, Direction::Out | Direction::InOut)
    }
}

/// Fixed-width value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prim {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl Prim {
    pub const ALL: [Prim; 11] = [
        Prim::Bool,
        Prim::I8,
        Prim::I16,
        Prim::I32,
        Prim::I64,
        Prim::U8,
        Prim::U16,
        Prim::U32,
        Prim::U64,
        Prim::F32,
        Prim::F64,
    ];

    /// IDL spelling
    pub fn idl_name(self) -> &'static str {
        match self {
            Prim::Bool => "boolean",
            Prim::I8 => "byte",
            Prim::I16 => "short",
            Prim::I32 => "int",
            Prim::I64 => "long",
            Prim::U8 => "unsigned char",
            Prim::U16 => "unsigned short",
            Prim::U32 => "unsigned int",
            Prim::U64 => "unsigned long",
            Prim::F32 => "float",
            Prim::F64 => "double",
        }
    }
}

/// Struct declaration; fields marshal in declaration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

/// Enum declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

/// Reference to another interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRef {
    pub name: String,
    #[serde(default)]
    pub callback: bool,
}

/// Type reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    Prim(Prim),
    /// NUL-terminated text; decoded through the duplicate-on-read path
    String,
    /// File descriptor owned by whoever holds it
    Fd,
    Array {
        element: Box<TypeRef>,
        #[serde(default)]
        bound: Option<u32>,
    },
    Struct(StructDecl),
    Enum(EnumDecl),
    Interface(InterfaceRef),
    Map {
        key: Box<TypeRef>,
        value: Box<TypeRef>,
    },
}

impl TypeRef {
    pub fn array_of(element: TypeRef) -> Self {
        TypeRef::Array {
            element: Box::new(element),
            bound: None,
        }
    }

    pub fn bounded_array_of(element: TypeRef, bound: u32) -> Self {
        TypeRef::Array {
            element: Box::new(element),
            bound: Some(bound),
        }
    }

    pub fn callback(name: &str) -> Self {
        TypeRef::Interface(InterfaceRef {
            name: name.to_string(),
            callback: true,
        })
    }

    /// Short kind label used in logs and tests
    pub fn kind(&self) -> &'static str {
        match self {
            TypeRef::Prim(_) => "prim",
            TypeRef::String => "string",
            TypeRef::Fd => "fd",
            TypeRef::Array { .. } => "array",
            TypeRef::Struct(_) => "struct",
            TypeRef::Enum(_) => "enum",
            TypeRef::Interface(_) => "interface",
            TypeRef::Map { .. } => "map",
        }
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeRef::Prim(prim) => write!(f, "{}", prim.idl_name()),
            TypeRef::String => write!(f, "String"),
            TypeRef::Fd => write!(f, "FileDescriptor"),
            TypeRef::Array { element, bound: None } => write!(f, "{}[]", element),
            TypeRef::Array {
                element,
                bound: Some(n),
            } => write!(f, "{}[{}]", element, n),
            TypeRef::Struct(decl) => write!(f, "struct {}", decl.name),
            TypeRef::Enum(decl) => write!(f, "enum {}", decl.name),
            TypeRef::Interface(iface) => write!(f, "{}", iface.name),
            TypeRef::Map { key, value } => write!(f, "Map<{}, {}>", key, value),
        }
    }
}

impl InterfaceDecl {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: Version::default(),
            callback: false,
            methods: Vec::new(),
        }
    }

    pub fn callback(mut self) -> Self {
        self.callback = true;
        self
    }

    /// Append a method at the next ordinal
    pub fn method(mut self, mut method: MethodDecl) -> Self {
        method.ordinal = Some(self.methods.len() as u32);
        self.methods.push(method);
        self
    }
}

impl MethodDecl {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ordinal: None,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }
}

impl ParamDecl {
    pub fn new(name: &str, direction: Direction, ty: TypeRef) -> Self {
        Self {
            name: name.to_string(),
            direction,
            ty,
        }
    }

    pub fn input(name: &str, ty: TypeRef) -> Self {
        Self::new(name, Direction::In, ty)
    }

    pub fn output(name: &str, ty: TypeRef) -> Self {
        Self::new(name, Direction::Out, ty)
    }

    pub fn in_out(name: &str, ty: TypeRef) -> Self {
        Self::new(name, Direction::InOut, ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_assigns_declaration_ordinals() {
        let iface = InterfaceDecl::new("Sensor")
            .method(MethodDecl::new("A"))
            .method(MethodDecl::new("B"));
        let ordinals: Vec<_> = iface.methods.iter().map(|m| m.ordinal).collect();
        assert_eq!(ordinals, vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_type_display() {
        let ty = TypeRef::array_of(TypeRef::Prim(Prim::U16));
        assert_eq!(ty.to_string(), "unsigned short[]");
        let map = TypeRef::Map {
            key: Box::new(TypeRef::String),
            value: Box::new(TypeRef::Prim(Prim::I32)),
        };
        assert_eq!(map.to_string(), "Map<String, int>");
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{
            "package": "ohos.hdi.sensor.v1_0",
            "interfaces": [{
                "name": "Sensor",
                "methods": [{
                    "name": "ReadState",
                    "params": [
                        {"name": "channel", "direction": "in", "type": {"prim": "u16"}},
                        {"name": "label", "direction": "inout", "type": "string"},
                        {"name": "cb", "direction": "in",
                         "type": {"interface": {"name": "SensorCallback", "callback": true}}}
                    ]
                }]
            }]
        }"#;
        let file: InterfaceFile = serde_json::from_str(json).unwrap();
        let params = &file.interfaces[0].methods[0].params;
        assert_eq!(params[0].ty, TypeRef::Prim(Prim::U16));
        assert_eq!(params[1].direction, Direction::InOut);
        assert_eq!(params[2].ty, TypeRef::callback("SensorCallback"));
        assert_eq!(file.interfaces[0].version, Version { major: 1, minor: 0 });
    }
}
