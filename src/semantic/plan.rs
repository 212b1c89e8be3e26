//! Per-method stub plans
//!
//! A plan fixes, once, every ordering the wire contract depends on:
//! which parameters are decoded and in what order, which are encoded into
//! the reply, and the order in which acquired resources are released.
//! Both the C emitter and the simulator walk the same plan.

use super::catalog::MarshalRule;
use crate::ast::{Direction, TypeRef, Version};

/// Analyzed interface; `methods[i].ordinal == i`
#[derive(Debug, Clone)]
pub struct InterfacePlan {
    pub package: String,
    pub name: String,
    pub version: Version,
    pub callback: bool,
    pub methods: Vec<MethodPlan>,
}

/// Analyzed method
#[derive(Debug, Clone)]
pub struct MethodPlan {
    pub name: String,
    pub ordinal: u32,
    pub params: Vec<ParamPlan>,
}

/// Analyzed parameter with its marshalling rule resolved
#[derive(Debug, Clone)]
pub struct ParamPlan {
    pub name: String,
    pub direction: Direction,
    pub ty: TypeRef,
    pub rule: MarshalRule,
}

impl InterfacePlan {
    /// Method bound to `ordinal`, if any
    pub fn method(&self, ordinal: u32) -> Option<&MethodPlan> {
        self.methods.get(ordinal as usize)
    }

    /// Callback interfaces referenced by any parameter, first use first
    pub fn callback_refs(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = Vec::new();
        for param in self.methods.iter().flat_map(|m| m.params.iter()) {
            if let MarshalRule::Callback { interface } = &param.rule {
                if !refs.contains(&interface.as_str()) {
                    refs.push(interface);
                }
            }
        }
        refs
    }

    pub fn uses_rule(&self, pred: impl Fn(&MarshalRule) -> bool) -> bool {
        fn walk(rule: &MarshalRule, pred: &dyn Fn(&MarshalRule) -> bool) -> bool {
            if pred(rule) {
                return true;
            }
            match rule {
                MarshalRule::Array { element, .. } => walk(element, pred),
                MarshalRule::Struct { fields, .. } => fields.iter().any(|f| walk(&f.rule, pred)),
                _ => false,
            }
        }
        self.methods
            .iter()
            .flat_map(|m| m.params.iter())
            .any(|p| walk(&p.rule, &pred))
    }
}

impl MethodPlan {
    /// Parameters read from the request, in declaration order
    pub fn decode_order(&self) -> impl Iterator<Item = &ParamPlan> {
        self.params.iter().filter(|p| p.direction.is_in())
    }

    /// Parameters written to the reply, in declaration order
    pub fn encode_order(&self) -> impl Iterator<Item = &ParamPlan> {
        self.params.iter().filter(|p| p.direction.is_out())
    }

    /// Order in which parameters can acquire resources
    ///
    /// In and inout parameters acquire while decoding; out-only parameters
    /// acquire when the implementation fills them.
    pub fn acquisition_order(&self) -> Vec<&ParamPlan> {
        self.decode_order()
            .chain(self.params.iter().filter(|p| p.direction == Direction::Out))
            .filter(|p| p.rule.may_acquire())
            .collect()
    }

    /// Reverse of [`acquisition_order`](Self::acquisition_order)
    pub fn release_order(&self) -> Vec<&ParamPlan> {
        let mut order = self.acquisition_order();
        order.reverse();
        order
    }

    pub fn param(&self, name: &str) -> Option<&ParamPlan> {
        self.params.iter().find(|p| p.name == name)
    }
}
