//! C fragments for each marshalling rule
//!
//! Every rule renders four pieces: the local declaration, the decode
//! statements (reading `data`), the encode statements (writing `reply`)
//! and the release statements run under the shared `FINISHED` label.
//! Decode failures set `ec` and jump to that label; releases are guarded
//! so they only touch what was actually acquired.

use super::accessor::CallbackAccessor;
use super::{iface_struct, CodegenError};
use crate::ast::{Direction, Prim};
use crate::semantic::catalog::{prim_c_type, wire_kind, MarshalRule, ENUM_WIRE};
use crate::semantic::plan::ParamPlan;

/// Label every stub function jumps to on failure
pub const FAIL_LABEL: &str = "FINISHED";

/// Indenting line writer
#[derive(Debug, Default)]
pub struct CWriter {
    out: String,
    indent: usize,
}

impl CWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indent(indent: usize) -> Self {
        Self {
            out: String::new(),
            indent,
        }
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.out.push_str("    ");
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Write `head {` and indent
    pub fn open(&mut self, head: impl AsRef<str>) {
        let head = head.as_ref();
        if head.is_empty() {
            self.line("{");
        } else {
            self.line(format!("{} {{", head));
        }
        self.indent += 1;
    }

    /// Dedent and write `}`
    pub fn close(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.line("}");
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Log, set the status and jump to the shared exit
pub fn emit_fail(w: &mut CWriter, status: &str, message: &str) {
    w.line(format!("HDF_LOGE(\"%{{public}}s: {}\", __func__);", message));
    w.line(format!("ec = {};", status));
    w.line(format!("goto {};", FAIL_LABEL));
}

/// `if (cond) { fail }`
pub fn emit_check(w: &mut CWriter, cond: &str, status: &str, message: &str) {
    w.open(format!("if ({})", cond));
    emit_fail(w, status, message);
    w.close();
}

/// C value type of a rule
pub fn c_type(rule: &MarshalRule) -> String {
    match rule {
        MarshalRule::Scalar(prim) => prim_c_type(*prim).to_string(),
        MarshalRule::Enum { name } => format!("enum {}", name),
        MarshalRule::String => "char *".to_string(),
        MarshalRule::Fd => "int".to_string(),
        MarshalRule::Array { element, .. } => pointer_to(&c_type(element)),
        MarshalRule::Struct { name, .. } => format!("struct {}", name),
        MarshalRule::Callback { interface } => format!("struct {} *", iface_struct(interface)),
    }
}

fn pointer_to(ty: &str) -> String {
    if ty.ends_with('*') {
        format!("{}*", ty)
    } else {
        format!("{} *", ty)
    }
}

/// Join a C type and a declarator without a stray space after `*`
pub fn c_decl(ty: &str, name: &str) -> String {
    if ty.ends_with('*') {
        format!("{}{}", ty, name)
    } else {
        format!("{} {}", ty, name)
    }
}

fn zero_value(rule: &MarshalRule) -> String {
    match rule {
        MarshalRule::Scalar(Prim::Bool) => "false".to_string(),
        MarshalRule::Scalar(_) => "0".to_string(),
        MarshalRule::Enum { name } => format!("(enum {})0", name),
        MarshalRule::String | MarshalRule::Array { .. } | MarshalRule::Callback { .. } => {
            "NULL".to_string()
        }
        MarshalRule::Fd => "-1".to_string(),
        MarshalRule::Struct { .. } => "{0}".to_string(),
    }
}

/// Local declarations for one parameter
pub fn local_decls(param: &ParamPlan) -> Vec<String> {
    let mut lines = vec![format!(
        "{} = {};",
        c_decl(&c_type(&param.rule), &param.name),
        zero_value(&param.rule)
    )];
    if matches!(param.rule, MarshalRule::Array { .. }) {
        lines.push(format!("uint32_t {}Len = 0;", param.name));
    }
    lines
}

/// Arguments passed to the implementation for one parameter
pub fn call_args(param: &ParamPlan) -> Vec<String> {
    let name = &param.name;
    match (&param.rule, param.direction) {
        (MarshalRule::Array { .. }, Direction::In) => vec![name.clone(), format!("{}Len", name)],
        (MarshalRule::Array { .. }, _) => vec![format!("&{}", name), format!("&{}Len", name)],
        (MarshalRule::Struct { .. }, _) => vec![format!("&{}", name)],
        (_, Direction::In) => vec![name.clone()],
        (_, _) => vec![format!("&{}", name)],
    }
}

/// Parameters of the implementation's method-table entry
pub fn impl_params(param: &ParamPlan) -> Vec<String> {
    let name = &param.name;
    let ty = c_type(&param.rule);
    match (&param.rule, param.direction) {
        (MarshalRule::Array { element, .. }, Direction::In) => vec![
            c_decl(&pointer_to(&format!("const {}", c_type(element))), name),
            format!("uint32_t {}Len", name),
        ],
        (MarshalRule::Array { .. }, _) => vec![
            c_decl(&pointer_to(&ty), name),
            format!("uint32_t *{}Len", name),
        ],
        (MarshalRule::String, Direction::In) => vec![c_decl("const char *", name)],
        (MarshalRule::Struct { .. }, Direction::In) => {
            vec![c_decl(&pointer_to(&format!("const {}", ty)), name)]
        }
        (_, Direction::In) => vec![c_decl(&ty, name)],
        (_, _) => vec![c_decl(&pointer_to(&ty), name)],
    }
}

/// Array element bound as a C expression
fn array_limit(element: &MarshalRule, max_len: u32, bounded: bool) -> String {
    if bounded {
        max_len.to_string()
    } else {
        format!("HDI_BUFF_MAX_SIZE / sizeof({})", c_type(element))
    }
}

/// Decode statements reading `data` into `lvalue`
pub fn emit_decode(
    w: &mut CWriter,
    rule: &MarshalRule,
    lvalue: &str,
    label: &str,
    accessor: &dyn CallbackAccessor,
    depth: usize,
) {
    let invalid = "HDF_ERR_INVALID_PARAM";
    let read_failed = format!("read {} failed!", label);
    match rule {
        MarshalRule::Scalar(Prim::Bool) => {
            let cond = format!("!HdfSbufReadInt8(data, (int8_t *)&{})", lvalue);
            emit_check(w, &cond, invalid, &read_failed);
        }
        MarshalRule::Scalar(prim) => {
            let cond = format!(
                "!HdfSbufRead{}(data, &{})",
                wire_kind(*prim).sbuf_suffix(),
                lvalue
            );
            emit_check(w, &cond, invalid, &read_failed);
        }
        MarshalRule::Enum { name } => {
            w.open("");
            w.line(format!("{} enumTmp = 0;", ENUM_WIRE.c_type()));
            let cond = format!("!HdfSbufRead{}(data, &enumTmp)", ENUM_WIRE.sbuf_suffix());
            emit_check(w, &cond, invalid, &read_failed);
            w.line(format!("{} = (enum {})enumTmp;", lvalue, name));
            w.close();
        }
        MarshalRule::String => {
            w.open("");
            w.line("const char *cp = HdfSbufReadString(data);");
            emit_check(w, "cp == NULL", invalid, &read_failed);
            w.line(format!("{} = strdup(cp);", lvalue));
            emit_check(
                w,
                &format!("{} == NULL", lvalue),
                "HDF_ERR_MALLOC_FAIL",
                &format!("duplicate {} failed!", label),
            );
            w.close();
        }
        MarshalRule::Fd => {
            w.line(format!("{} = HdfSbufReadFileDescriptor(data);", lvalue));
            emit_check(w, &format!("{} < 0", lvalue), invalid, &read_failed);
        }
        MarshalRule::Array {
            element,
            max_len,
            bounded,
        } => {
            let len = format!("{}Len", lvalue);
            let index = format!("i{}", depth);
            let elem_ty = c_type(element);
            emit_check(
                w,
                &format!("!HdfSbufReadUint32(data, &{})", len),
                invalid,
                &format!("read {} size failed!", label),
            );
            emit_check(
                w,
                &format!("{} > {}", len, array_limit(element, *max_len, *bounded)),
                invalid,
                &format!("{} size exceeds limit!", label),
            );
            w.open(format!("if ({} > 0)", len));
            w.line(format!(
                "{} = ({})OsalMemCalloc(sizeof({}) * {});",
                lvalue,
                pointer_to(&elem_ty),
                elem_ty,
                len
            ));
            emit_check(
                w,
                &format!("{} == NULL", lvalue),
                "HDF_ERR_MALLOC_FAIL",
                &format!("malloc {} failed!", label),
            );
            w.open(format!(
                "for (uint32_t {i} = 0; {i} < {len}; {i}++)",
                i = index,
                len = len
            ));
            emit_decode(
                w,
                element,
                &format!("{}[{}]", lvalue, index),
                label,
                accessor,
                depth + 1,
            );
            w.close();
            w.close();
        }
        MarshalRule::Struct { fields, .. } => {
            for field in fields {
                emit_decode(
                    w,
                    &field.rule,
                    &format!("{}.{}", lvalue, field.name),
                    &format!("{}.{}", label, field.name),
                    accessor,
                    depth,
                );
            }
        }
        MarshalRule::Callback { interface } => {
            accessor.emit_param_decode(w, interface, lvalue, label);
        }
    }
}

/// Encode statements writing `rvalue` into `reply`
pub fn emit_encode(
    w: &mut CWriter,
    rule: &MarshalRule,
    rvalue: &str,
    label: &str,
    depth: usize,
) -> Result<(), CodegenError> {
    let invalid = "HDF_ERR_INVALID_PARAM";
    let write_failed = format!("write {} failed!", label);
    match rule {
        MarshalRule::Scalar(Prim::Bool) => {
            let cond = format!("!HdfSbufWriteInt8(reply, {} ? 1 : 0)", rvalue);
            emit_check(w, &cond, invalid, &write_failed);
        }
        MarshalRule::Scalar(prim) => {
            let cond = format!(
                "!HdfSbufWrite{}(reply, {})",
                wire_kind(*prim).sbuf_suffix(),
                rvalue
            );
            emit_check(w, &cond, invalid, &write_failed);
        }
        MarshalRule::Enum { .. } => {
            let cond = format!(
                "!HdfSbufWrite{}(reply, ({}){})",
                ENUM_WIRE.sbuf_suffix(),
                ENUM_WIRE.c_type(),
                rvalue
            );
            emit_check(w, &cond, invalid, &write_failed);
        }
        MarshalRule::String => {
            let cond = format!("!HdfSbufWriteString(reply, {})", rvalue);
            emit_check(w, &cond, invalid, &write_failed);
        }
        MarshalRule::Fd => {
            let cond = format!("!HdfSbufWriteFileDescriptor(reply, {})", rvalue);
            emit_check(w, &cond, invalid, &write_failed);
        }
        MarshalRule::Array { element, .. } => {
            let len = format!("{}Len", rvalue);
            let index = format!("i{}", depth);
            emit_check(
                w,
                &format!("{} == NULL && {} > 0", rvalue, len),
                invalid,
                &format!("{} is null with nonzero size!", label),
            );
            emit_check(
                w,
                &format!("!HdfSbufWriteUint32(reply, {})", len),
                invalid,
                &format!("write {} size failed!", label),
            );
            w.open(format!(
                "for (uint32_t {i} = 0; {i} < {len}; {i}++)",
                i = index,
                len = len
            ));
            emit_encode(w, element, &format!("{}[{}]", rvalue, index), label, depth + 1)?;
            w.close();
        }
        MarshalRule::Struct { fields, .. } => {
            for field in fields {
                emit_encode(
                    w,
                    &field.rule,
                    &format!("{}.{}", rvalue, field.name),
                    &format!("{}.{}", label, field.name),
                    depth,
                )?;
            }
        }
        MarshalRule::Callback { interface } => {
            return Err(CodegenError::UnsupportedFeature(format!(
                "{}: callback {} cannot be written to a reply",
                label, interface
            )));
        }
    }
    Ok(())
}

/// Release statements for whatever `lvalue` holds
pub fn emit_release(
    w: &mut CWriter,
    rule: &MarshalRule,
    lvalue: &str,
    accessor: &dyn CallbackAccessor,
    depth: usize,
) {
    match rule {
        MarshalRule::Scalar(_) | MarshalRule::Enum { .. } => {}
        MarshalRule::String => {
            w.open(format!("if ({} != NULL)", lvalue));
            w.line(format!("OsalMemFree({});", lvalue));
            w.line(format!("{} = NULL;", lvalue));
            w.close();
        }
        MarshalRule::Fd => {
            w.open(format!("if ({} >= 0)", lvalue));
            w.line(format!("close({});", lvalue));
            w.line(format!("{} = -1;", lvalue));
            w.close();
        }
        MarshalRule::Array { element, .. } => {
            w.open(format!("if ({} != NULL)", lvalue));
            if element.may_acquire() {
                let index = format!("i{}", depth);
                w.open(format!(
                    "for (uint32_t {i} = 0; {i} < {lv}Len; {i}++)",
                    i = index,
                    lv = lvalue
                ));
                emit_release(w, element, &format!("{}[{}]", lvalue, index), accessor, depth + 1);
                w.close();
            }
            w.line(format!("OsalMemFree({});", lvalue));
            w.line(format!("{} = NULL;", lvalue));
            w.close();
        }
        MarshalRule::Struct { fields, .. } => {
            // Fields were acquired in declaration order
            for field in fields.iter().rev() {
                emit_release(
                    w,
                    &field.rule,
                    &format!("{}.{}", lvalue, field.name),
                    accessor,
                    depth,
                );
            }
        }
        MarshalRule::Callback { interface } => {
            accessor.emit_param_release(w, interface, lvalue);
        }
    }
}
