//! Kernel and user accessor variants
//!
//! Generated stubs reach two things through an accessor: the proxies of
//! callback interfaces passed as parameters, and the implementation
//! instance the stub dispatches to. Kernel stubs do both with direct
//! calls; user stubs go through remote-service objects and a dynamically
//! loaded implementation library. One variant is chosen per run.

use super::c_fragments::{emit_check, CWriter};
use super::{base_name, iface_struct, remote_local, to_snake, GeneratorConfig, Mode};
use crate::semantic::InterfacePlan;
use crate::sim::value::CallbackHandle;
use hdf_rt::{HdfSbuf, SbufError};

/// One way of reaching implementations and callback proxies
pub trait CallbackAccessor {
    fn mode(&self) -> Mode;

    /// Extra `#include` targets the accessor code needs
    fn includes(&self, plan: &InterfacePlan) -> Vec<&'static str>;

    /// Decode a callback parameter into `lvalue`
    fn emit_param_decode(&self, w: &mut CWriter, interface: &str, lvalue: &str, label: &str);

    /// Release a decoded callback proxy
    fn emit_param_release(&self, w: &mut CWriter, interface: &str, lvalue: &str);

    /// Prototypes of a callback interface's proxy get/release pair
    fn proxy_decls(&self, interface: &str) -> Vec<String>;

    /// Declarations the get accessor needs ahead of the stub bodies
    fn emit_construct_decls(&self, w: &mut CWriter, plan: &InterfacePlan, config: &GeneratorConfig);

    /// `<Base>StubGetInstance` / `<Base>StubRelease` bodies
    fn emit_stub_accessors(&self, w: &mut CWriter, plan: &InterfacePlan);

    /// Header declarations for the accessor pair
    fn header_decls(&self, plan: &InterfacePlan) -> Vec<String>;

    /// Read a callback reference off the wire the way generated code does
    fn read_handle(&self, data: &mut HdfSbuf) -> hdf_rt::Result<u32>;

    /// Local view of a decoded callback reference
    fn materialize(&self, interface: &str, handle: u32) -> CallbackHandle {
        CallbackHandle {
            interface: interface.to_string(),
            handle,
            mode: self.mode(),
        }
    }
}

/// Pick the accessor for a run
pub fn accessor_for(mode: Mode) -> Box<dyn CallbackAccessor> {
    match mode {
        Mode::Kernel => Box::new(KernelAccessor),
        Mode::User => Box::new(UserAccessor),
    }
}

fn get_instance_name(plan: &InterfacePlan) -> String {
    format!("{}StubGetInstance", base_name(&plan.name))
}

fn release_name(plan: &InterfacePlan) -> String {
    format!("{}StubRelease", base_name(&plan.name))
}

fn construct_name(plan: &InterfacePlan) -> String {
    format!("{}ImplConstruct", base_name(&plan.name))
}

fn emit_release_fn(w: &mut CWriter, plan: &InterfacePlan) {
    w.line(format!(
        "void {}(struct {} *instance)",
        release_name(plan),
        iface_struct(&plan.name)
    ));
    w.open("");
    w.open("if (instance == NULL)");
    w.line("return;");
    w.close();
    w.line("OsalMemFree(instance);");
    w.close();
}

fn emit_calloc_instance(w: &mut CWriter, var: &str, ty: &str) {
    w.line(format!(
        "struct {ty} *{var} = (struct {ty} *)OsalMemCalloc(sizeof(struct {ty}));",
        ty = ty,
        var = var
    ));
    w.open(format!("if ({} == NULL)", var));
    w.line("HDF_LOGE(\"%{public}s: OsalMemCalloc failed!\", __func__);");
    w.line("return NULL;");
    w.close();
}

fn common_header_decls(plan: &InterfacePlan) -> Vec<String> {
    let ty = iface_struct(&plan.name);
    vec![
        format!("struct {} *{}(void);", ty, get_instance_name(plan)),
        format!("void {}(struct {} *instance);", release_name(plan), ty),
    ]
}

/// Privileged accessor: service ids and direct construction
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelAccessor;

impl CallbackAccessor for KernelAccessor {
    fn mode(&self) -> Mode {
        Mode::Kernel
    }

    fn includes(&self, _plan: &InterfacePlan) -> Vec<&'static str> {
        Vec::new()
    }

    fn emit_param_decode(&self, w: &mut CWriter, interface: &str, lvalue: &str, label: &str) {
        w.open("");
        w.line("uint32_t cbServiceId = 0;");
        emit_check(
            w,
            "!HdfSbufReadUint32(data, &cbServiceId) || cbServiceId == 0",
            "HDF_ERR_INVALID_PARAM",
            &format!("read {} failed!", label),
        );
        w.line(format!(
            "{} = {}KernelGet(cbServiceId);",
            lvalue,
            iface_struct(interface)
        ));
        emit_check(
            w,
            &format!("{} == NULL", lvalue),
            "HDF_ERR_INVALID_OBJECT",
            &format!("get {} proxy failed!", label),
        );
        w.close();
    }

    fn emit_param_release(&self, w: &mut CWriter, interface: &str, lvalue: &str) {
        w.open(format!("if ({} != NULL)", lvalue));
        w.line(format!("{}KernelRelease({});", iface_struct(interface), lvalue));
        w.line(format!("{} = NULL;", lvalue));
        w.close();
    }

    fn proxy_decls(&self, interface: &str) -> Vec<String> {
        let ty = iface_struct(interface);
        vec![
            format!("extern struct {ty} *{ty}KernelGet(uint32_t serviceId);", ty = ty),
            format!("extern void {ty}KernelRelease(struct {ty} *instance);", ty = ty),
        ]
    }

    fn emit_construct_decls(&self, w: &mut CWriter, plan: &InterfacePlan, _config: &GeneratorConfig) {
        w.line(format!(
            "extern void {}(struct {} *instance);",
            construct_name(plan),
            iface_struct(&plan.name)
        ));
    }

    fn emit_stub_accessors(&self, w: &mut CWriter, plan: &InterfacePlan) {
        let ty = iface_struct(&plan.name);
        w.line(format!("struct {} *{}(void)", ty, get_instance_name(plan)));
        w.open("");
        emit_calloc_instance(w, "instance", &ty);
        w.line(format!("{}(instance);", construct_name(plan)));
        w.line("return instance;");
        w.close();
        w.blank();
        emit_release_fn(w, plan);
    }

    fn header_decls(&self, plan: &InterfacePlan) -> Vec<String> {
        common_header_decls(plan)
    }

    fn read_handle(&self, data: &mut HdfSbuf) -> hdf_rt::Result<u32> {
        let start = data.read_offset();
        let id = data.read_u32()?;
        if id == 0 {
            return Err(SbufError::NullRemote(start));
        }
        Ok(id)
    }
}

/// Unprivileged accessor: remote-service objects and a loaded library
#[derive(Debug, Clone, Copy, Default)]
pub struct UserAccessor;

impl UserAccessor {
    fn stub_struct(plan: &InterfacePlan) -> String {
        format!("{}Stub", base_name(&plan.name))
    }

    fn emit_loaded_get(&self, w: &mut CWriter, plan: &InterfacePlan) {
        let ty = iface_struct(&plan.name);
        w.line(format!("struct {} *{}(void)", ty, get_instance_name(plan)));
        w.open("");
        w.line("SERVICE_CONSTRUCT_FUNC serviceConstructFunc = NULL;");
        emit_calloc_instance(w, "instance", &ty);
        w.blank();
        w.line("void *handler = dlopen(DRIVER_LIB_PATH, RTLD_LAZY);");
        w.open("if (handler == NULL)");
        w.line("HDF_LOGE(\"%{public}s: dlopen failed %{public}s\", __func__, dlerror());");
        w.line("OsalMemFree(instance);");
        w.line("return NULL;");
        w.close();
        w.blank();
        w.line(format!(
            "serviceConstructFunc = (SERVICE_CONSTRUCT_FUNC)dlsym(handler, \"{}\");",
            construct_name(plan)
        ));
        w.open("if (serviceConstructFunc == NULL)");
        w.line("HDF_LOGE(\"%{public}s: dlsym failed %{public}s\", __func__, dlerror());");
        w.line("dlclose(handler);");
        w.line("OsalMemFree(instance);");
        w.line("return NULL;");
        w.close();
        w.blank();
        w.line("serviceConstructFunc(instance);");
        w.line("return instance;");
        w.close();
        w.blank();
        emit_release_fn(w, plan);
    }

    fn emit_callback_stub(&self, w: &mut CWriter, plan: &InterfacePlan) {
        let base = base_name(&plan.name);
        let ty = iface_struct(&plan.name);
        let stub = Self::stub_struct(plan);

        w.line(format!(
            "static int32_t {}OnRequest(struct HdfRemoteService *remote, int code, struct HdfSBuf *data, struct HdfSBuf *reply)",
            stub
        ));
        w.open("");
        w.line(format!(
            "struct {} *stub = (struct {} *)remote->target;",
            stub, stub
        ));
        w.open("if (stub == NULL)");
        w.line("HDF_LOGE(\"%{public}s: invalid stub object\", __func__);");
        w.line("return HDF_ERR_INVALID_OBJECT;");
        w.close();
        w.line(format!(
            "return {}ServiceOnRemoteRequest(&stub->interface, code, data, reply);",
            base
        ));
        w.close();
        w.blank();

        w.line(format!("static void {}LinkService(struct {} *stub)", stub, stub));
        w.open("");
        w.line(format!("stub->dispatcher.Dispatch = {}OnRequest;", stub));
        w.line("stub->remote = HdfRemoteServiceObtain((struct HdfObject *)stub, &stub->dispatcher);");
        w.close();
        w.blank();

        w.line(format!("struct {} *{}(void)", ty, get_instance_name(plan)));
        w.open("");
        emit_calloc_instance(w, "stub", &stub);
        w.blank();
        w.line(format!("{}LinkService(stub);", stub));
        w.open("if (stub->remote == NULL)");
        w.line("HDF_LOGE(\"%{public}s: obtain remote service failed!\", __func__);");
        w.line("OsalMemFree(stub);");
        w.line("return NULL;");
        w.close();
        w.line(format!("{}(&stub->interface);", construct_name(plan)));
        w.line("return &stub->interface;");
        w.close();
        w.blank();

        w.line(format!(
            "void {}(struct {} *instance)",
            release_name(plan),
            ty
        ));
        w.open("");
        w.open("if (instance == NULL)");
        w.line("return;");
        w.close();
        w.line(format!(
            "struct {} *stub = CONTAINER_OF(instance, struct {}, interface);",
            stub, stub
        ));
        w.line("HdfRemoteServiceRecycle(stub->remote);");
        w.line("OsalMemFree(stub);");
        w.close();
    }
}

impl CallbackAccessor for UserAccessor {
    fn mode(&self) -> Mode {
        Mode::User
    }

    fn includes(&self, plan: &InterfacePlan) -> Vec<&'static str> {
        let mut includes = Vec::new();
        if plan.callback || !plan.callback_refs().is_empty() {
            includes.push("<hdf_remote_service.h>");
        }
        if !plan.callback {
            includes.push("<dlfcn.h>");
        }
        includes
    }

    fn emit_param_decode(&self, w: &mut CWriter, interface: &str, lvalue: &str, label: &str) {
        let remote = remote_local(interface);
        w.open("");
        w.line(format!(
            "struct HdfRemoteService *{} = HdfSbufReadRemoteService(data);",
            remote
        ));
        emit_check(
            w,
            &format!("{} == NULL", remote),
            "HDF_ERR_INVALID_PARAM",
            &format!("read {} failed!", label),
        );
        w.line(format!("{} = {}Get({});", lvalue, iface_struct(interface), remote));
        w.open(format!("if ({} == NULL)", lvalue));
        w.line(format!("HdfRemoteServiceRecycle({});", remote));
        super::c_fragments::emit_fail(
            w,
            "HDF_ERR_INVALID_OBJECT",
            &format!("get {} proxy failed!", label),
        );
        w.close();
        w.close();
    }

    fn emit_param_release(&self, w: &mut CWriter, interface: &str, lvalue: &str) {
        w.open(format!("if ({} != NULL)", lvalue));
        w.line(format!("{}Release({});", iface_struct(interface), lvalue));
        w.line(format!("{} = NULL;", lvalue));
        w.close();
    }

    fn proxy_decls(&self, interface: &str) -> Vec<String> {
        let ty = iface_struct(interface);
        vec![
            format!("extern struct {ty} *{ty}Get(struct HdfRemoteService *remote);", ty = ty),
            format!("extern void {ty}Release(struct {ty} *instance);", ty = ty),
        ]
    }

    fn emit_construct_decls(&self, w: &mut CWriter, plan: &InterfacePlan, config: &GeneratorConfig) {
        let ty = iface_struct(&plan.name);
        if plan.callback {
            w.line(format!(
                "extern void {}(struct {} *instance);",
                construct_name(plan),
                ty
            ));
            return;
        }
        w.line(format!(
            "#define DRIVER_LIB_PATH \"{}/lib{}_driver.z.so\"",
            config.driver_lib_dir.trim_end_matches('/'),
            to_snake(base_name(&plan.name))
        ));
        w.blank();
        w.line(format!("typedef void (*SERVICE_CONSTRUCT_FUNC)(struct {} *);", ty));
    }

    fn emit_stub_accessors(&self, w: &mut CWriter, plan: &InterfacePlan) {
        if plan.callback {
            self.emit_callback_stub(w, plan);
        } else {
            self.emit_loaded_get(w, plan);
        }
    }

    fn header_decls(&self, plan: &InterfacePlan) -> Vec<String> {
        let mut decls = Vec::new();
        if plan.callback {
            let stub = Self::stub_struct(plan);
            decls.push(format!("struct {} {{", stub));
            decls.push(format!("    struct {} interface;", iface_struct(&plan.name)));
            decls.push("    struct HdfRemoteService *remote;".to_string());
            decls.push("    struct HdfRemoteDispatcher dispatcher;".to_string());
            decls.push("};".to_string());
            decls.push(String::new());
        }
        decls.extend(common_header_decls(plan));
        decls
    }

    fn read_handle(&self, data: &mut HdfSbuf) -> hdf_rt::Result<u32> {
        data.read_remote_service()
    }
}
