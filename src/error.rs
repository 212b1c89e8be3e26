//! Unified error types for hdi-gen using thiserror

use thiserror::Error;

/// Top-level error type for generation runs
#[derive(Error, Debug)]
pub enum GenError {
    #[error("invalid interface model: {0}")]
    Model(#[from] serde_json::Error),

    #[error("generation integrity failure: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("code generation error: {0}")]
    Codegen(#[from] CodegenError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where in the interface model an integrity failure was found
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub interface: String,
    pub method: Option<String>,
    pub param: Option<String>,
}

impl Location {
    pub fn interface(name: &str) -> Self {
        Self {
            interface: name.to_string(),
            method: None,
            param: None,
        }
    }

    pub fn method(mut self, name: &str) -> Self {
        self.method = Some(name.to_string());
        self
    }

    pub fn param(mut self, name: &str) -> Self {
        self.param = Some(name.to_string());
        self
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.interface)?;
        if let Some(method) = &self.method {
            write!(f, ".{}", method)?;
        }
        if let Some(param) = &self.param {
            write!(f, "({})", param)?;
        }
        Ok(())
    }
}

/// Violations that abort generation of an interface
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("{at}: ordinal {found} does not match declaration position {expected}")]
    OrdinalMismatch {
        at: Location,
        expected: u32,
        found: u32,
    },

    #[error("{at}: duplicate interface name")]
    DuplicateInterface { at: Location },

    #[error("{at}: duplicate method name")]
    DuplicateMethod { at: Location },

    #[error("{at}: duplicate parameter name")]
    DuplicateParam { at: Location },

    #[error("{at}: no marshalling rule for {ty}")]
    UnmappedType { at: Location, ty: String },

    #[error("{at}: {ty} cannot be passed in this direction")]
    UnsupportedDirection { at: Location, ty: String },

    #[error("{at}: interface {name} is not declared as a callback")]
    NotACallback { at: Location, name: String },

    #[error("{at}: name {name} collides with a generated identifier")]
    NameCollision { at: Location, name: String },

    #[error("{at}: array bound {bound} exceeds buffer ceiling {max}")]
    ArrayTooLarge { at: Location, bound: u32, max: u32 },

    #[error("{at}: not a valid identifier")]
    EmptyName { at: Location },
}

impl IntegrityError {
    pub fn location(&self) -> &Location {
        match self {
            IntegrityError::OrdinalMismatch { at, .. }
            | IntegrityError::DuplicateInterface { at }
            | IntegrityError::DuplicateMethod { at }
            | IntegrityError::DuplicateParam { at }
            | IntegrityError::UnmappedType { at, .. }
            | IntegrityError::UnsupportedDirection { at, .. }
            | IntegrityError::NotACallback { at, .. }
            | IntegrityError::NameCollision { at, .. }
            | IntegrityError::ArrayTooLarge { at, .. }
            | IntegrityError::EmptyName { at } => at,
        }
    }
}

/// Code generation errors
#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        let at = Location::interface("Sensor").method("ReadState").param("channel");
        assert_eq!(at.to_string(), "Sensor.ReadState(channel)");
        assert_eq!(Location::interface("Sensor").to_string(), "Sensor");
    }

    #[test]
    fn test_integrity_message_names_location() {
        let err = IntegrityError::UnmappedType {
            at: Location::interface("Sensor").method("Get").param("table"),
            ty: "map<string, int32>".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Sensor.Get(table): no marshalling rule for map<string, int32>"
        );
        assert_eq!(err.location().method.as_deref(), Some("Get"));
    }
}
