//! Semantic analyzer: interface model to stub plans

use std::collections::{BTreeMap, BTreeSet};

use super::catalog::{Catalog, MarshalRule};
use super::plan::{InterfacePlan, MethodPlan, ParamPlan};
use crate::ast::{EnumDecl, InterfaceDecl, InterfaceFile, MethodDecl, StructDecl, TypeRef};
use crate::codegen::{remote_local, to_upper_snake};
use crate::error::{IntegrityError, Location};

/// Identifiers the generated stub body declares itself
const RESERVED: &[&str] = &[
    "data", "reply", "serviceImpl", "self", "ec", "FINISHED", "cp", "enumTmp", "cbServiceId", "auto",
    "bool", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "int", "long", "return", "short", "signed",
    "sizeof", "static", "struct", "switch", "typedef", "union", "unsigned", "void", "volatile",
    "while",
];

fn is_loop_index(name: &str) -> bool {
    name.len() > 1 && name.starts_with('i') && name[1..].bytes().all(|b| b.is_ascii_digit())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Command id suffix taken by the `CMD_<IFACE>_MAX` sentinel
const MAX_COMMAND: &str = "MAX";

/// A struct or enum definition, keyed by its C tag
#[derive(Clone, Copy, PartialEq)]
enum UserType<'a> {
    Struct(&'a StructDecl),
    Enum(&'a EnumDecl),
}

/// Every user type tag in one header must name exactly one definition
fn register_user_types<'a>(
    ty: &'a TypeRef,
    types: &mut BTreeMap<&'a str, UserType<'a>>,
    at: &Location,
) -> Result<(), IntegrityError> {
    let (name, found) = match ty {
        TypeRef::Struct(decl) => (decl.name.as_str(), UserType::Struct(decl)),
        TypeRef::Enum(decl) => (decl.name.as_str(), UserType::Enum(decl)),
        TypeRef::Array { element, .. } => return register_user_types(element, types, at),
        _ => return Ok(()),
    };
    if let Some(known) = types.get(name) {
        if *known == found {
            return Ok(());
        }
        return Err(IntegrityError::NameCollision {
            at: at.clone(),
            name: name.to_string(),
        });
    }
    types.insert(name, found);
    if let TypeRef::Struct(decl) = ty {
        for field in &decl.fields {
            register_user_types(&field.ty, types, at)?;
        }
    }
    Ok(())
}

/// Field names of every struct under `rule`, including derived `<field>Len` members
fn check_struct_fields(rule: &MarshalRule, at: &Location) -> Result<(), IntegrityError> {
    match rule {
        MarshalRule::Array { element, .. } => check_struct_fields(element, at),
        MarshalRule::Struct { name, fields } => {
            let mut members = BTreeSet::new();
            for field in fields {
                if !is_identifier(&field.name) {
                    return Err(IntegrityError::EmptyName { at: at.clone() });
                }
                if !members.insert(field.name.clone()) {
                    return Err(IntegrityError::NameCollision {
                        at: at.clone(),
                        name: format!("{}.{}", name, field.name),
                    });
                }
            }
            for field in fields {
                if matches!(field.rule, MarshalRule::Array { .. }) {
                    let len = format!("{}Len", field.name);
                    if !members.insert(len.clone()) {
                        return Err(IntegrityError::NameCollision {
                            at: at.clone(),
                            name: format!("{}.{}", name, len),
                        });
                    }
                }
                check_struct_fields(&field.rule, at)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Semantic analyzer
pub struct SemanticAnalyzer {
    catalog: Catalog,
}

impl SemanticAnalyzer {
    /// Create an analyzer with the standard catalog
    pub fn new() -> Self {
        Self::with_catalog(Catalog::new())
    }

    pub fn with_catalog(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Analyze every interface in a file; the first failure aborts all of them
    pub fn analyze_file(&self, file: &InterfaceFile) -> Result<Vec<InterfacePlan>, IntegrityError> {
        let mut seen = BTreeSet::new();
        for iface in &file.interfaces {
            if !seen.insert(iface.name.as_str()) {
                return Err(IntegrityError::DuplicateInterface {
                    at: Location::interface(&iface.name),
                });
            }
        }

        let mut plans = Vec::with_capacity(file.interfaces.len());
        for iface in &file.interfaces {
            let plan = self.analyze(&file.package, iface)?;
            self.check_callback_refs(file, iface)?;
            plans.push(plan);
        }
        Ok(plans)
    }

    /// Analyze one interface
    pub fn analyze(&self, package: &str, iface: &InterfaceDecl) -> Result<InterfacePlan, IntegrityError> {
        let at = Location::interface(&iface.name);
        if !is_identifier(&iface.name) {
            return Err(IntegrityError::EmptyName { at });
        }

        let mut names = BTreeSet::new();
        let mut command_ids = BTreeSet::from([MAX_COMMAND.to_string()]);
        let mut user_types = BTreeMap::new();
        let mut methods = Vec::with_capacity(iface.methods.len());
        for (position, method) in iface.methods.iter().enumerate() {
            let at = at.clone().method(&method.name);
            if !is_identifier(&method.name) {
                return Err(IntegrityError::EmptyName { at });
            }
            if !names.insert(method.name.as_str()) {
                return Err(IntegrityError::DuplicateMethod { at });
            }
            // Command ids are derived from the name and must stay distinct
            let command_id = to_upper_snake(&method.name);
            if !command_ids.insert(command_id.clone()) {
                return Err(IntegrityError::NameCollision {
                    at,
                    name: command_id,
                });
            }
            for param in &method.params {
                register_user_types(&param.ty, &mut user_types, &at.clone().param(&param.name))?;
            }
            methods.push(self.analyze_method(method, position as u32, &at)?);
        }

        tracing::debug!(
            interface = %iface.name,
            methods = methods.len(),
            callback = iface.callback,
            "interface analyzed"
        );

        Ok(InterfacePlan {
            package: package.to_string(),
            name: iface.name.clone(),
            version: iface.version,
            callback: iface.callback,
            methods,
        })
    }

    fn analyze_method(
        &self,
        method: &MethodDecl,
        position: u32,
        at: &Location,
    ) -> Result<MethodPlan, IntegrityError> {
        // The ordinal is the declaration position, never anything else
        if let Some(found) = method.ordinal {
            if found != position {
                return Err(IntegrityError::OrdinalMismatch {
                    at: at.clone(),
                    expected: position,
                    found,
                });
            }
        }

        let mut params = Vec::with_capacity(method.params.len());
        let mut locals = BTreeSet::new();
        for param in &method.params {
            let at = at.clone().param(&param.name);
            if !is_identifier(&param.name) {
                return Err(IntegrityError::EmptyName { at });
            }
            if RESERVED.contains(&param.name.as_str()) || is_loop_index(&param.name) {
                return Err(IntegrityError::NameCollision {
                    at,
                    name: param.name.clone(),
                });
            }
            let rule = self.catalog.rule_for_param(param, &at)?;
            check_struct_fields(&rule, &at)?;
            if !locals.insert(param.name.clone()) {
                return Err(IntegrityError::DuplicateParam { at });
            }
            if matches!(rule, MarshalRule::Array { .. }) {
                let len = format!("{}Len", param.name);
                if !locals.insert(len.clone()) {
                    return Err(IntegrityError::NameCollision { at, name: len });
                }
            }
            params.push(ParamPlan {
                name: param.name.clone(),
                direction: param.direction,
                ty: param.ty.clone(),
                rule,
            });
        }

        // Callback decode blocks declare a remote-service local of their own
        for param in &params {
            if let MarshalRule::Callback { interface } = &param.rule {
                let remote = remote_local(interface);
                if locals.contains(&remote) {
                    return Err(IntegrityError::NameCollision {
                        at: at.clone().param(&remote),
                        name: remote,
                    });
                }
            }
        }

        Ok(MethodPlan {
            name: method.name.clone(),
            ordinal: position,
            params,
        })
    }

    fn check_callback_refs(&self, file: &InterfaceFile, iface: &InterfaceDecl) -> Result<(), IntegrityError> {
        for method in &iface.methods {
            for param in &method.params {
                let TypeRef::Interface(target) = &param.ty else {
                    continue;
                };
                let declared = file.interfaces.iter().find(|i| i.name == target.name);
                if let Some(declared) = declared {
                    if !declared.callback {
                        return Err(IntegrityError::NotACallback {
                            at: Location::interface(&iface.name)
                                .method(&method.name)
                                .param(&param.name),
                            name: target.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
