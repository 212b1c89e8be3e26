//! Client side of the wire contract
//!
//! Marshals requests and unmarshals replies exactly as a proxy generated
//! for the same interface would, so stubs can be exercised end to end.

use hdf_rt::sbuf::HdfSbuf;
use hdf_rt::service::IoService;
use hdf_rt::status::{HdfStatus, HDF_ERR_INVALID_PARAM};

use super::codec::{decode, encode, AllocBudget, DecodeCtx, Fault};
use super::value::Value;
use crate::codegen::{accessor_for, CallbackAccessor, Mode};
use crate::semantic::{InterfacePlan, MethodPlan};

/// Proxy model for one interface
pub struct Client<'p> {
    plan: &'p InterfacePlan,
    accessor: Box<dyn CallbackAccessor>,
}

impl<'p> Client<'p> {
    pub fn new(plan: &'p InterfacePlan, mode: Mode) -> Self {
        Self {
            plan,
            accessor: accessor_for(mode),
        }
    }

    pub fn method(&self, name: &str) -> Option<&'p MethodPlan> {
        self.plan.methods.iter().find(|m| m.name == name)
    }

    /// Encode in/inout arguments, given in decode order
    pub fn encode_request(&self, method: &MethodPlan, args: &[Value]) -> Result<HdfSbuf, Fault> {
        let inputs: Vec<_> = method.decode_order().collect();
        if inputs.len() != args.len() {
            return Err(Fault::Mismatch {
                label: method.name.clone(),
            });
        }
        let mut data = HdfSbuf::new();
        for (param, value) in inputs.into_iter().zip(args) {
            encode(&param.rule, value, &mut data, &param.name)?;
        }
        Ok(data)
    }

    /// Decode out/inout results, in declaration order
    pub fn decode_reply(&self, method: &MethodPlan, reply: &mut HdfSbuf) -> Result<Vec<(String, Value)>, Fault> {
        let mut budget = AllocBudget::unlimited();
        let mut results = Vec::new();
        for param in method.encode_order() {
            let mut ctx = DecodeCtx::new(self.accessor.as_ref(), &mut budget);
            results.push((param.name.clone(), decode(&param.rule, reply, &mut ctx, &param.name)?));
        }
        Ok(results)
    }

    /// Full round trip through `service`
    pub fn call(
        &self,
        service: &mut dyn IoService,
        method: &str,
        args: &[Value],
    ) -> Result<Vec<(String, Value)>, HdfStatus> {
        let method = self.method(method).ok_or(HDF_ERR_INVALID_PARAM)?;
        let mut data = self.encode_request(method, args).map_err(|f| f.status())?;
        let mut reply = HdfSbuf::new();
        service
            .dispatch(method.ordinal as i32, &mut data, &mut reply)
            .to_result()?;
        self.decode_reply(method, &mut reply).map_err(|f| f.status())
    }
}
