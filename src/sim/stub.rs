//! Executable model of a generated server stub
//!
//! [`ServiceStub`] walks the same [`MethodPlan`]s the C emitter walks and
//! follows the same shape: decode in/inout parameters in order, check the
//! implementation, call, encode out/inout parameters, release. Every
//! acquisition and release is recorded in a [`Trace`], so cleanup order is
//! observable.

use hdf_rt::sbuf::HdfSbuf;
use hdf_rt::service::IoService;
use hdf_rt::status::{HdfStatus, HDF_ERR_INVALID_OBJECT, HDF_ERR_NOT_SUPPORT, HDF_SUCCESS};

use super::codec::{decode, encode, AllocBudget, DecodeCtx};
use super::value::Value;
use crate::ast::Direction;
use crate::codegen::{accessor_for, CallbackAccessor, Mode};
use crate::semantic::{InterfacePlan, MethodPlan};

/// The real implementation a stub dispatches to
pub trait ServiceImpl {
    /// Whether the method table has an entry for `method`
    fn implements(&self, _method: &str) -> bool {
        true
    }

    /// Run `method`; out and inout slots of `frame` receive the results
    fn call(&mut self, method: &str, frame: &mut CallFrame) -> HdfStatus;
}

/// Arguments of one call, one slot per parameter in declaration order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallFrame {
    slots: Vec<(String, Direction, Value)>,
}

impl CallFrame {
    pub fn push(&mut self, name: &str, direction: Direction, value: Value) {
        self.slots.push((name.to_string(), direction, value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.slots.iter().find(|(n, _, _)| n == name).map(|(_, _, v)| v)
    }

    /// Store into an out or inout slot; in slots are read-only
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.slots.iter_mut().find(|(n, _, _)| n == name) {
            Some((_, direction, slot)) if direction.is_out() => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Acquire(String),
    Release(String),
    Call(String),
}

/// Ordered record of what a stub did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    events: Vec<TraceEvent>,
}

impl Trace {
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Names released, in release order
    pub fn released(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TraceEvent::Release(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn acquired(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TraceEvent::Acquire(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn called(&self) -> bool {
        self.events.iter().any(|e| matches!(e, TraceEvent::Call(_)))
    }
}

/// Releases everything acquired so far when dropped, in the reverse of the
/// method's acquisition order
struct CleanupChain<'t> {
    trace: &'t mut Trace,
    order: Vec<String>,
    held: Vec<String>,
}

impl<'t> CleanupChain<'t> {
    fn new(trace: &'t mut Trace, method: &MethodPlan) -> Self {
        Self {
            trace,
            order: method.acquisition_order().into_iter().map(|p| p.name.clone()).collect(),
            held: Vec::new(),
        }
    }

    fn acquire(&mut self, name: &str) {
        self.trace.events.push(TraceEvent::Acquire(name.to_string()));
        self.held.push(name.to_string());
    }

    fn holds(&self, name: &str) -> bool {
        self.held.iter().any(|held| held == name)
    }

    fn call(&mut self, method: &str) {
        self.trace.events.push(TraceEvent::Call(method.to_string()));
    }
}

impl Drop for CleanupChain<'_> {
    fn drop(&mut self) {
        let mut held = std::mem::take(&mut self.held);
        held.sort_by_key(|name| self.order.iter().position(|n| n == name));
        while let Some(name) = held.pop() {
            tracing::trace!(param = %name, "release");
            self.trace.events.push(TraceEvent::Release(name));
        }
    }
}

/// Server stub for one interface
pub struct ServiceStub<S: ServiceImpl> {
    plan: InterfacePlan,
    service: S,
    accessor: Box<dyn CallbackAccessor>,
    budget: AllocBudget,
    trace: Trace,
}

impl<S: ServiceImpl> ServiceStub<S> {
    pub fn new(plan: InterfacePlan, service: S, mode: Mode) -> Self {
        Self {
            plan,
            service,
            accessor: accessor_for(mode),
            budget: AllocBudget::unlimited(),
            trace: Trace::default(),
        }
    }

    /// Fail allocations once `allocations` have been made
    pub fn with_alloc_budget(mut self, allocations: usize) -> Self {
        self.budget = AllocBudget::limited(allocations);
        self
    }

    pub fn plan(&self) -> &InterfacePlan {
        &self.plan
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut S {
        &mut self.service
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn take_trace(&mut self) -> Trace {
        std::mem::take(&mut self.trace)
    }

    /// Ordinal dispatch; unknown ordinals never enter a method body
    pub fn on_remote_request(&mut self, cmd: i32, data: &mut HdfSbuf, reply: &mut HdfSbuf) -> HdfStatus {
        let method = match u32::try_from(cmd).ok().and_then(|ordinal| self.plan.method(ordinal)) {
            Some(method) => method,
            None => {
                tracing::warn!(interface = %self.plan.name, cmd, "unsupported command");
                return HDF_ERR_NOT_SUPPORT;
            }
        };
        let status = run_method(
            method,
            &mut self.service,
            self.accessor.as_ref(),
            &mut self.budget,
            &mut self.trace,
            data,
            reply,
        );
        tracing::debug!(interface = %self.plan.name, method = %method.name, %status, "dispatched");
        status
    }
}

fn run_method<S: ServiceImpl>(
    method: &MethodPlan,
    service: &mut S,
    accessor: &dyn CallbackAccessor,
    budget: &mut AllocBudget,
    trace: &mut Trace,
    data: &mut HdfSbuf,
    reply: &mut HdfSbuf,
) -> HdfStatus {
    let mut chain = CleanupChain::new(trace, method);
    let mut frame = CallFrame::default();

    for param in &method.params {
        if !param.direction.is_in() {
            frame.push(&param.name, param.direction, Value::zero(&param.rule));
            continue;
        }
        let mut ctx = DecodeCtx::new(accessor, budget);
        let decoded = decode(&param.rule, data, &mut ctx, &param.name);
        if ctx.acquired {
            chain.acquire(&param.name);
        }
        match decoded {
            Ok(value) => frame.push(&param.name, param.direction, value),
            Err(fault) => {
                tracing::warn!(method = %method.name, error = %fault, "decode failed");
                return fault.status();
            }
        }
    }

    if !service.implements(&method.name) {
        tracing::warn!(method = %method.name, "invalid service or null function pointer");
        return HDF_ERR_INVALID_OBJECT;
    }

    chain.call(&method.name);
    let ec = service.call(&method.name, &mut frame);

    // Whatever the implementation stored into an out slot is ours to release
    for param in method.params.iter().filter(|p| p.direction.is_out()) {
        if !chain.holds(&param.name) && frame.get(&param.name).is_some_and(Value::holds_resource) {
            chain.acquire(&param.name);
        }
    }

    if !ec.is_success() {
        tracing::warn!(method = %method.name, status = %ec, "call failed");
        return ec;
    }

    for param in method.encode_order() {
        let value = match frame.get(&param.name) {
            Some(value) => value,
            None => return HDF_ERR_INVALID_OBJECT,
        };
        if let Err(fault) = encode(&param.rule, value, reply, &param.name) {
            tracing::warn!(method = %method.name, error = %fault, "encode failed");
            return fault.status();
        }
    }

    HDF_SUCCESS
}

impl<S: ServiceImpl> IoService for ServiceStub<S> {
    fn dispatch(&mut self, cmd: i32, data: &mut HdfSbuf, reply: &mut HdfSbuf) -> HdfStatus {
        self.on_remote_request(cmd, data, reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{InterfaceDecl, MethodDecl, ParamDecl, Prim, TypeRef};
    use crate::semantic::SemanticAnalyzer;
    use crate::sim::Client;
    use hdf_rt::status::HDF_ERR_INVALID_PARAM;

    struct Missing;

    impl ServiceImpl for Missing {
        fn implements(&self, _method: &str) -> bool {
            false
        }

        fn call(&mut self, _method: &str, _frame: &mut CallFrame) -> HdfStatus {
            HDF_SUCCESS
        }
    }

    fn plan() -> InterfacePlan {
        let decl = InterfaceDecl::new("Sensor").method(
            MethodDecl::new("SetName").param(ParamDecl::input("name", TypeRef::String)),
        );
        SemanticAnalyzer::new().analyze("ohos.hdi.sensor.v1_0", &decl).unwrap()
    }

    /// Fills the `label` out slot and the `buf` in-out slot
    struct Filler;

    impl ServiceImpl for Filler {
        fn call(&mut self, _method: &str, frame: &mut CallFrame) -> HdfStatus {
            frame.set("label", Value::String("east".to_string()));
            frame.set("buf", Value::Array(vec![Value::U16(1), Value::U16(2)]));
            HDF_SUCCESS
        }
    }

    #[test]
    fn test_release_follows_acquisition_order() {
        let decl = InterfaceDecl::new("Sensor").method(
            MethodDecl::new("Fill")
                .param(ParamDecl::output("label", TypeRef::String))
                .param(ParamDecl::in_out("buf", TypeRef::array_of(TypeRef::Prim(Prim::U16))))
                .param(ParamDecl::input("name", TypeRef::String)),
        );
        let plan = SemanticAnalyzer::new().analyze("ohos.hdi.sensor.v1_0", &decl).unwrap();
        let expected: Vec<&str> = plan.methods[0]
            .release_order()
            .into_iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(expected, ["label", "name", "buf"]);

        let mut stub = ServiceStub::new(plan.clone(), Filler, Mode::User);
        let client = Client::new(&plan, Mode::User);
        client
            .call(&mut stub, "Fill", &[Value::Array(Vec::new()), Value::String("west".to_string())])
            .unwrap();
        assert_eq!(stub.trace().released(), expected);
    }

    #[test]
    fn test_frame_slots() {
        let mut frame = CallFrame::default();
        frame.push("channel", Direction::In, Value::U16(3));
        frame.push("delta", Direction::Out, Value::I32(0));
        assert!(!frame.set("channel", Value::U16(4)));
        assert!(frame.set("delta", Value::I32(-1)));
        assert_eq!(frame.get("delta"), Some(&Value::I32(-1)));
        assert_eq!(frame.len(), 2);
    }

    #[test]
    fn test_missing_method_still_releases() {
        let mut stub = ServiceStub::new(plan(), Missing, Mode::User);
        let mut data = HdfSbuf::new();
        data.write_string(Some("left")).unwrap();
        let status = stub.on_remote_request(0, &mut data, &mut HdfSbuf::new());
        assert_eq!(status, HDF_ERR_INVALID_OBJECT);
        assert!(!stub.trace().called());
        assert_eq!(stub.trace().released(), ["name"]);
    }

    #[test]
    fn test_empty_request_is_invalid() {
        let mut stub = ServiceStub::new(plan(), Missing, Mode::Kernel);
        let status = stub.on_remote_request(0, &mut HdfSbuf::new(), &mut HdfSbuf::new());
        assert_eq!(status, HDF_ERR_INVALID_PARAM);
        assert!(stub.trace().events().is_empty());
    }

    #[test]
    fn test_negative_command_not_supported() {
        let mut stub = ServiceStub::new(plan(), Missing, Mode::User);
        let status = stub.dispatch(-1, &mut HdfSbuf::new(), &mut HdfSbuf::new());
        assert_eq!(status, HDF_ERR_NOT_SUPPORT);
    }
}
