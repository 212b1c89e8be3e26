//! Value codec driven by marshalling rules
//!
//! Reads and writes exactly what the generated C does for the same rule,
//! so buffers produced here are interchangeable with generated stubs.

use hdf_rt::sbuf::HdfSbuf;
use hdf_rt::status::{HdfStatus, HDF_ERR_INVALID_PARAM, HDF_ERR_MALLOC_FAIL};
use hdf_rt::SbufError;
use thiserror::Error;

use super::value::Value;
use crate::ast::Prim;
use crate::codegen::CallbackAccessor;
use crate::semantic::catalog::MarshalRule;

/// Run-time failure inside a simulated stub or client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("{label}: {source}")]
    Malformed {
        label: String,
        #[source]
        source: SbufError,
    },

    #[error("{label}: element count {count} exceeds limit {max}")]
    TooLong { label: String, count: u32, max: u32 },

    #[error("{label}: allocation failed")]
    Exhausted { label: String },

    #[error("{label}: value does not fit its marshalling rule")]
    Mismatch { label: String },
}

impl Fault {
    /// Status the generated stub returns for this failure
    pub fn status(&self) -> HdfStatus {
        match self {
            Fault::Exhausted { .. } => HDF_ERR_MALLOC_FAIL,
            Fault::Malformed { .. } | Fault::TooLong { .. } | Fault::Mismatch { .. } => {
                HDF_ERR_INVALID_PARAM
            }
        }
    }
}

/// Allocation allowance for one stub
///
/// Every duplicate or array allocation draws one unit; an exhausted budget
/// makes the next allocation fail the way `OsalMemCalloc` returning `NULL`
/// does.
#[derive(Debug, Clone, Default)]
pub struct AllocBudget {
    remaining: Option<usize>,
    used: usize,
}

impl AllocBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn limited(allocations: usize) -> Self {
        Self {
            remaining: Some(allocations),
            used: 0,
        }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    fn take(&mut self, label: &str) -> Result<(), Fault> {
        match self.remaining.as_mut() {
            Some(0) => {
                tracing::debug!(label, "allocation budget exhausted");
                Err(Fault::Exhausted {
                    label: label.to_string(),
                })
            }
            Some(left) => {
                *left -= 1;
                self.used += 1;
                Ok(())
            }
            None => {
                self.used += 1;
                Ok(())
            }
        }
    }
}

/// State for decoding one parameter
pub struct DecodeCtx<'a> {
    pub accessor: &'a dyn CallbackAccessor,
    pub budget: &'a mut AllocBudget,
    /// Something was allocated or taken over while decoding
    pub acquired: bool,
}

impl<'a> DecodeCtx<'a> {
    pub fn new(accessor: &'a dyn CallbackAccessor, budget: &'a mut AllocBudget) -> Self {
        Self {
            accessor,
            budget,
            acquired: false,
        }
    }
}

fn malformed(label: &str) -> impl FnOnce(SbufError) -> Fault + '_ {
    move |source| Fault::Malformed {
        label: label.to_string(),
        source,
    }
}

/// Decode one value from `data`
pub fn decode(
    rule: &MarshalRule,
    data: &mut HdfSbuf,
    ctx: &mut DecodeCtx<'_>,
    label: &str,
) -> Result<Value, Fault> {
    let value = match rule {
        MarshalRule::Scalar(prim) => decode_scalar(*prim, data).map_err(malformed(label))?,
        MarshalRule::Enum { .. } => Value::Enum(data.read_u64().map_err(malformed(label))?),
        MarshalRule::String => {
            let text = data.read_string().map_err(malformed(label))?.to_owned();
            ctx.budget.take(label)?;
            ctx.acquired = true;
            Value::String(text)
        }
        MarshalRule::Fd => {
            let fd = data.read_file_descriptor().map_err(malformed(label))?;
            ctx.acquired = true;
            Value::Fd(fd)
        }
        MarshalRule::Array {
            element, max_len, ..
        } => {
            let count = data.read_u32().map_err(malformed(label))?;
            if count > *max_len {
                return Err(Fault::TooLong {
                    label: label.to_string(),
                    count,
                    max: *max_len,
                });
            }
            let mut items = Vec::new();
            if count > 0 {
                ctx.budget.take(label)?;
                ctx.acquired = true;
                items.reserve(count as usize);
                for _ in 0..count {
                    items.push(decode(element, data, ctx, label)?);
                }
            }
            Value::Array(items)
        }
        MarshalRule::Struct { fields, .. } => {
            let mut out = Vec::with_capacity(fields.len());
            for field in fields {
                let label = format!("{}.{}", label, field.name);
                out.push((field.name.clone(), decode(&field.rule, data, ctx, &label)?));
            }
            Value::Struct(out)
        }
        MarshalRule::Callback { interface } => {
            let handle = ctx.accessor.read_handle(data).map_err(malformed(label))?;
            ctx.acquired = true;
            Value::Callback(ctx.accessor.materialize(interface, handle))
        }
    };
    Ok(value)
}

fn decode_scalar(prim: Prim, data: &mut HdfSbuf) -> hdf_rt::Result<Value> {
    Ok(match prim {
        Prim::Bool => Value::Bool(data.read_i8()? != 0),
        Prim::I8 => Value::I8(data.read_i8()?),
        Prim::I16 => Value::I16(data.read_i16()?),
        Prim::I32 => Value::I32(data.read_i32()?),
        Prim::I64 => Value::I64(data.read_i64()?),
        Prim::U8 => Value::U8(data.read_u8()?),
        Prim::U16 => Value::U16(data.read_u16()?),
        Prim::U32 => Value::U32(data.read_u32()?),
        Prim::U64 => Value::U64(data.read_u64()?),
        Prim::F32 => Value::F32(data.read_f32()?),
        Prim::F64 => Value::F64(data.read_f64()?),
    })
}

/// Encode one value into `out`
pub fn encode(rule: &MarshalRule, value: &Value, out: &mut HdfSbuf, label: &str) -> Result<(), Fault> {
    let mismatch = || Fault::Mismatch {
        label: label.to_string(),
    };
    let written = match (rule, value) {
        (MarshalRule::Scalar(prim), value) => encode_scalar(*prim, value, out).ok_or_else(mismatch)?,
        (MarshalRule::Enum { .. }, Value::Enum(v)) => out.write_u64(*v),
        (MarshalRule::String, Value::String(text)) => out.write_string(Some(text.as_str())),
        (MarshalRule::String, Value::Null) => out.write_string(None),
        (MarshalRule::Fd, Value::Fd(fd)) => out.write_file_descriptor(*fd),
        (MarshalRule::Array { element, .. }, Value::Array(items)) => {
            let count = u32::try_from(items.len()).map_err(|_| mismatch())?;
            out.write_u32(count).map_err(malformed(label))?;
            for item in items {
                encode(element, item, out, label)?;
            }
            Ok(())
        }
        (MarshalRule::Array { .. }, Value::Null) => out.write_u32(0),
        (MarshalRule::Struct { fields, .. }, Value::Struct(values)) => {
            if fields.len() != values.len() {
                return Err(mismatch());
            }
            for (field, (name, value)) in fields.iter().zip(values) {
                if field.name != *name {
                    return Err(mismatch());
                }
                encode(&field.rule, value, out, &format!("{}.{}", label, field.name))?;
            }
            Ok(())
        }
        (MarshalRule::Callback { .. }, Value::Callback(cb)) => out.write_remote_service(cb.handle),
        _ => return Err(mismatch()),
    };
    written.map_err(malformed(label))
}

fn encode_scalar(prim: Prim, value: &Value, out: &mut HdfSbuf) -> Option<hdf_rt::Result<()>> {
    Some(match (prim, value) {
        (Prim::Bool, Value::Bool(v)) => out.write_i8(i8::from(*v)),
        (Prim::I8, Value::I8(v)) => out.write_i8(*v),
        (Prim::I16, Value::I16(v)) => out.write_i16(*v),
        (Prim::I32, Value::I32(v)) => out.write_i32(*v),
        (Prim::I64, Value::I64(v)) => out.write_i64(*v),
        (Prim::U8, Value::U8(v)) => out.write_u8(*v),
        (Prim::U16, Value::U16(v)) => out.write_u16(*v),
        (Prim::U32, Value::U32(v)) => out.write_u32(*v),
        (Prim::U64, Value::U64(v)) => out.write_u64(*v),
        (Prim::F32, Value::F32(v)) => out.write_f32(*v),
        (Prim::F64, Value::F64(v)) => out.write_f64(*v),
        _ => return None,
    })
}
