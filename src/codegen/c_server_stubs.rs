//! C server stub generation: per-method marshalling and ordinal dispatch

use std::collections::BTreeSet;

use super::accessor::{accessor_for, CallbackAccessor};
use super::c_fragments::{
    call_args, emit_decode, emit_encode, emit_fail, emit_release, local_decls, CWriter, FAIL_LABEL,
};
use super::{base_name, iface_struct, lower_camel, to_snake, to_upper_snake, CodegenError, GeneratorConfig};
use crate::semantic::catalog::MarshalRule;
use crate::semantic::{InterfacePlan, MethodPlan};

/// Includes every stub source needs
const BASE_INCLUDES: &[&str] = &["<hdf_base.h>", "<hdf_log.h>", "<hdf_sbuf.h>", "<osal_mem.h>"];

pub struct CServerStubGenerator {
    config: GeneratorConfig,
    accessor: Box<dyn CallbackAccessor>,
}

impl CServerStubGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        let accessor = accessor_for(config.mode);
        Self { config, accessor }
    }

    pub fn accessor(&self) -> &dyn CallbackAccessor {
        self.accessor.as_ref()
    }

    /// Generate the complete stub source for one interface
    pub fn generate(&self, plan: &InterfacePlan) -> Result<String, CodegenError> {
        let base = base_name(&plan.name);
        let mut w = CWriter::new();

        w.line(format!(
            "/* Server stub for {}.{} ({} mode). Generated by hdi-gen, do not edit. */",
            plan.package, plan.name, self.config.mode
        ));
        w.blank();
        for include in self.includes(plan) {
            w.line(format!("#include {}", include));
        }
        w.line(format!("#include \"{}_stub.h\"", to_snake(base)));
        w.blank();
        w.line(format!("#define HDF_LOG_TAG {}_stub", to_snake(base)));
        w.blank();

        self.accessor.emit_construct_decls(&mut w, plan, &self.config);
        w.blank();

        let refs = plan.callback_refs();
        if !refs.is_empty() {
            for interface in refs {
                for decl in self.accessor.proxy_decls(interface) {
                    w.line(decl);
                }
            }
            w.blank();
        }

        if !plan.methods.is_empty() {
            w.line(format!(
                "typedef int32_t (*{}StubFunc)(struct {} *serviceImpl, struct HdfSBuf *data, struct HdfSBuf *reply);",
                base,
                iface_struct(&plan.name)
            ));
            w.blank();
        }

        for method in &plan.methods {
            tracing::debug!(interface = %plan.name, method = %method.name, ordinal = method.ordinal, "emitting stub");
            self.generate_method(&mut w, plan, method)?;
            w.blank();
        }

        self.generate_dispatch(&mut w, plan);
        w.blank();
        self.accessor.emit_stub_accessors(&mut w, plan);

        Ok(w.finish())
    }

    /// Standard inclusions, sorted so the order never depends on the model
    fn includes(&self, plan: &InterfacePlan) -> BTreeSet<&'static str> {
        let mut includes: BTreeSet<&'static str> = BASE_INCLUDES.iter().copied().collect();
        if plan.uses_rule(|r| matches!(r, MarshalRule::String)) {
            includes.insert("<string.h>");
        }
        if plan.uses_rule(|r| matches!(r, MarshalRule::Fd)) {
            includes.insert("<unistd.h>");
        }
        includes.extend(self.accessor.includes(plan));
        includes
    }

    /// One stub function: locals, decode, call, encode, release
    fn generate_method(
        &self,
        w: &mut CWriter,
        plan: &InterfacePlan,
        method: &MethodPlan,
    ) -> Result<(), CodegenError> {
        let accessor = self.accessor.as_ref();
        w.line(format!(
            "static int32_t SerStub{}(struct {} *serviceImpl, struct HdfSBuf *data, struct HdfSBuf *reply)",
            method.name,
            iface_struct(&plan.name)
        ));
        w.open("");

        // 1. Locals
        w.line("int32_t ec = HDF_FAILURE;");
        for param in &method.params {
            for decl in local_decls(param) {
                w.line(decl);
            }
        }
        w.blank();

        // 2. Decode
        let mut decoded = false;
        for param in method.decode_order() {
            emit_decode(w, &param.rule, &param.name, &param.name, accessor, 0);
            decoded = true;
        }
        if decoded {
            w.blank();
        }

        // 3. Call
        w.open(format!(
            "if (serviceImpl == NULL || serviceImpl->{} == NULL)",
            method.name
        ));
        emit_fail(w, "HDF_ERR_INVALID_OBJECT", "invalid service or null function pointer");
        w.close();
        w.blank();
        let mut args = vec!["serviceImpl".to_string()];
        for param in &method.params {
            args.extend(call_args(param));
        }
        w.line(format!("ec = serviceImpl->{}({});", method.name, args.join(", ")));
        // 4. A failed call skips encoding
        w.open("if (ec != HDF_SUCCESS)");
        w.line(format!(
            "HDF_LOGE(\"%{{public}}s: call {} failed, error code is %{{public}}d\", __func__, ec);",
            method.name
        ));
        w.line(format!("goto {};", FAIL_LABEL));
        w.close();

        // 5. Encode
        let mut encoded = false;
        for param in method.encode_order() {
            if !encoded {
                w.blank();
                encoded = true;
            }
            emit_encode(w, &param.rule, &param.name, &param.name, 0)?;
        }

        // 6. Release, reverse acquisition order
        w.dedent();
        w.line(format!("{}:", FAIL_LABEL));
        w.indent();
        for param in method.release_order() {
            emit_release(w, &param.rule, &param.name, accessor, 0);
        }
        w.line("return ec;");
        w.close();
        Ok(())
    }

    /// Dispatch table plus the OnRemoteRequest entry point
    fn generate_dispatch(&self, w: &mut CWriter, plan: &InterfacePlan) {
        let base = base_name(&plan.name);
        let upper = to_upper_snake(base);
        let table = format!("g_{}StubMethods", lower_camel(base));

        if !plan.methods.is_empty() {
            w.line(format!("static {}StubFunc {}[] = {{", base, table));
            w.indent();
            for method in &plan.methods {
                w.line(format!(
                    "[CMD_{}_{}] = SerStub{},",
                    upper,
                    to_upper_snake(&method.name),
                    method.name
                ));
            }
            w.dedent();
            w.line("};");
            w.blank();
        }

        w.line(format!(
            "int32_t {}ServiceOnRemoteRequest(struct {} *serviceImpl, int cmdId, struct HdfSBuf *data, struct HdfSBuf *reply)",
            base,
            iface_struct(&plan.name)
        ));
        w.open("");
        if plan.methods.is_empty() {
            w.line("(void)serviceImpl;");
            w.line("(void)data;");
            w.line("(void)reply;");
            w.line("HDF_LOGE(\"%{public}s: interface has no methods, cmdId %{public}d\", __func__, cmdId);");
            w.line("return HDF_ERR_NOT_SUPPORT;");
            w.close();
            return;
        }
        w.open(format!("if (cmdId < 0 || cmdId >= CMD_{}_MAX)", upper));
        w.line("HDF_LOGE(\"%{public}s: invalid cmdId %{public}d\", __func__, cmdId);");
        w.line("return HDF_ERR_NOT_SUPPORT;");
        w.close();
        w.blank();
        w.line(format!("{}StubFunc func = {}[cmdId];", base, table));
        w.open("if (func == NULL)");
        w.line("HDF_LOGE(\"%{public}s: not support cmdId %{public}d\", __func__, cmdId);");
        w.line("return HDF_ERR_NOT_SUPPORT;");
        w.close();
        w.line("return func(serviceImpl, data, reply);");
        w.close();
    }
}

impl Default for CServerStubGenerator {
    fn default() -> Self {
        Self::new(GeneratorConfig::default())
    }
}
