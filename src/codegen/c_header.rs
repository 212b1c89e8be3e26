//! C header file generation for HDI server stubs
//!
//! Generates `<iface>_stub.h` with the command ids, the implementation
//! method table, user type declarations and the stub entry points.

use super::accessor::CallbackAccessor;
use super::c_fragments::{c_decl, c_type, impl_params};
use super::{base_name, iface_struct, to_snake, to_upper_snake, CodegenError};
use crate::ast::{EnumDecl, TypeRef};
use crate::semantic::catalog::MarshalRule;
use crate::semantic::InterfacePlan;

/// File name of the header for an interface
pub fn header_file_name(plan: &InterfacePlan) -> String {
    format!("{}_stub.h", to_snake(base_name(&plan.name)))
}

/// Generate the stub header for one interface
pub fn generate_stub_header(
    plan: &InterfacePlan,
    accessor: &dyn CallbackAccessor,
) -> Result<String, CodegenError> {
    let base = base_name(&plan.name);
    let upper = to_upper_snake(base);
    let iface = iface_struct(&plan.name);
    let guard_name = format!("HDI_{}_STUB_H", upper);
    let mut output = String::new();

    output.push_str(&format!(
        "/* Server stub header for {}.{}. Generated by hdi-gen, do not edit. */\n\n",
        plan.package, plan.name
    ));

    // Include guard start
    output.push_str(&format!("#ifndef {}\n", guard_name));
    output.push_str(&format!("#define {}\n\n", guard_name));

    output.push_str("#include <stdbool.h>\n");
    output.push_str("#include <stdint.h>\n");
    output.push_str("#include <hdf_sbuf.h>\n");
    if accessor.includes(plan).contains(&"<hdf_remote_service.h>") {
        output.push_str("#include <hdf_remote_service.h>\n");
    }
    output.push('\n');

    // C++ compatibility
    output.push_str("#ifdef __cplusplus\n");
    output.push_str("extern \"C\" {\n");
    output.push_str("#endif /* __cplusplus */\n\n");

    output.push_str(&format!(
        "#define I{}_INTERFACE_DESC \"{}.{}\"\n",
        upper, plan.package, iface
    ));
    output.push_str(&format!(
        "#define I{}_MAJOR_VERSION {}\n",
        upper, plan.version.major
    ));
    output.push_str(&format!(
        "#define I{}_MINOR_VERSION {}\n\n",
        upper, plan.version.minor
    ));

    // Command ids; the value is the ordinal
    output.push_str(&format!("enum {}CmdId {{\n", base));
    for method in &plan.methods {
        output.push_str(&format!(
            "    CMD_{}_{} = {},\n",
            upper,
            to_upper_snake(&method.name),
            method.ordinal
        ));
    }
    output.push_str(&format!("    CMD_{}_MAX,\n", upper));
    output.push_str("};\n\n");

    let types = collect_user_types(plan);
    for decl in &types.enums {
        output.push_str(&format!("enum {} {{\n", decl.name));
        for member in &decl.members {
            output.push_str(&format!("    {} = {},\n", member.name, member.value));
        }
        output.push_str("};\n\n");
    }
    for (name, fields) in &types.structs {
        output.push_str(&format!("struct {} {{\n", name));
        for (field, rule) in fields {
            output.push_str(&format!("    {};\n", c_decl(&c_type(rule), field)));
            if matches!(rule, MarshalRule::Array { .. }) {
                output.push_str(&format!("    uint32_t {}Len;\n", field));
            }
        }
        output.push_str("};\n\n");
    }

    let refs = plan.callback_refs();
    if !refs.is_empty() {
        for interface in refs {
            output.push_str(&format!("struct {};\n", iface_struct(interface)));
        }
        output.push('\n');
    }

    // Implementation method table
    output.push_str(&format!("struct {} {{\n", iface));
    if plan.methods.is_empty() {
        output.push_str("    void *reserved;\n");
    }
    for method in &plan.methods {
        let mut params = vec![format!("struct {} *self", iface)];
        for param in &method.params {
            params.extend(impl_params(param));
        }
        output.push_str(&format!(
            "    int32_t (*{})({});\n",
            method.name,
            params.join(", ")
        ));
    }
    output.push_str("};\n\n");

    output.push_str(&format!(
        "int32_t {}ServiceOnRemoteRequest(struct {} *serviceImpl, int cmdId, struct HdfSBuf *data, struct HdfSBuf *reply);\n\n",
        base, iface
    ));

    for decl in accessor.header_decls(plan) {
        output.push_str(&decl);
        output.push('\n');
    }
    output.push('\n');

    // C++ compatibility end
    output.push_str("#ifdef __cplusplus\n");
    output.push_str("}\n");
    output.push_str("#endif /* __cplusplus */\n\n");

    // Include guard end
    output.push_str(&format!("#endif /* {} */\n", guard_name));

    Ok(output)
}

/// Struct and enum declarations reachable from the parameters
#[derive(Default)]
struct UserTypes<'a> {
    enums: Vec<&'a EnumDecl>,
    /// Dependencies first
    structs: Vec<(String, Vec<(String, MarshalRule)>)>,
}

impl<'a> UserTypes<'a> {
    fn visit(&mut self, ty: &'a TypeRef, rule: &MarshalRule) {
        match (ty, rule) {
            (TypeRef::Enum(decl), _) => {
                if !self.enums.iter().any(|e| e.name == decl.name) {
                    self.enums.push(decl);
                }
            }
            (TypeRef::Array { element, .. }, MarshalRule::Array { element: rule, .. }) => {
                self.visit(element, rule);
            }
            (TypeRef::Struct(decl), MarshalRule::Struct { fields, .. }) => {
                if self.structs.iter().any(|(name, _)| *name == decl.name) {
                    return;
                }
                for (field, field_rule) in decl.fields.iter().zip(fields) {
                    self.visit(&field.ty, &field_rule.rule);
                }
                self.structs.push((
                    decl.name.clone(),
                    fields
                        .iter()
                        .map(|f| (f.name.clone(), f.rule.clone()))
                        .collect(),
                ));
            }
            _ => {}
        }
    }
}

fn collect_user_types(plan: &InterfacePlan) -> UserTypes<'_> {
    let mut types = UserTypes::default();
    for param in plan.methods.iter().flat_map(|m| m.params.iter()) {
        types.visit(&param.ty, &param.rule);
    }
    types
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        EnumMember, FieldDecl, InterfaceDecl, MethodDecl, ParamDecl, Prim, StructDecl,
    };
    use crate::codegen::{KernelAccessor, UserAccessor};
    use crate::semantic::SemanticAnalyzer;

    fn analyze(decl: &InterfaceDecl) -> InterfacePlan {
        SemanticAnalyzer::new()
            .analyze("ohos.hdi.sensor.v1_0", decl)
            .unwrap()
    }

    #[test]
    fn test_header_structure() {
        let plan = analyze(
            &InterfaceDecl::new("Sensor").method(
                MethodDecl::new("ReadState")
                    .param(ParamDecl::input("channel", TypeRef::Prim(Prim::U16)))
                    .param(ParamDecl::output("delta", TypeRef::Prim(Prim::I32))),
            ),
        );
        let header = generate_stub_header(&plan, &UserAccessor).unwrap();
        assert_eq!(header_file_name(&plan), "sensor_stub.h");
        assert!(header.contains("#ifndef HDI_SENSOR_STUB_H\n#define HDI_SENSOR_STUB_H"));
        assert!(header.contains("extern \"C\" {"));
        assert!(header.contains("#define ISENSOR_INTERFACE_DESC \"ohos.hdi.sensor.v1_0.ISensor\""));
        assert!(header.contains("    CMD_SENSOR_READ_STATE = 0,\n    CMD_SENSOR_MAX,"));
        assert!(header.contains(
            "    int32_t (*ReadState)(struct ISensor *self, uint16_t channel, int32_t *delta);"
        ));
        assert!(header.contains("struct ISensor *SensorStubGetInstance(void);"));
        assert!(header.ends_with("#endif /* HDI_SENSOR_STUB_H */\n"));
    }

    #[test]
    fn test_user_types_declared_before_use() {
        let level = TypeRef::Enum(EnumDecl {
            name: "Level".to_string(),
            members: vec![
                EnumMember {
                    name: "LEVEL_LOW".to_string(),
                    value: 0,
                },
                EnumMember {
                    name: "LEVEL_HIGH".to_string(),
                    value: 1,
                },
            ],
        });
        let inner = TypeRef::Struct(StructDecl {
            name: "Range".to_string(),
            fields: vec![
                FieldDecl {
                    name: "low".to_string(),
                    ty: TypeRef::Prim(Prim::I32),
                },
                FieldDecl {
                    name: "level".to_string(),
                    ty: level,
                },
            ],
        });
        let outer = TypeRef::Struct(StructDecl {
            name: "Config".to_string(),
            fields: vec![
                FieldDecl {
                    name: "range".to_string(),
                    ty: inner,
                },
                FieldDecl {
                    name: "samples".to_string(),
                    ty: TypeRef::array_of(TypeRef::Prim(Prim::U8)),
                },
            ],
        });
        let plan = analyze(
            &InterfaceDecl::new("Sensor")
                .method(MethodDecl::new("Configure").param(ParamDecl::input("config", outer))),
        );
        let header = generate_stub_header(&plan, &KernelAccessor).unwrap();
        let level = header.find("enum Level {").unwrap();
        let range = header.find("struct Range {").unwrap();
        let config = header.find("struct Config {").unwrap();
        assert!(level < range && range < config);
        assert!(header.contains("    uint8_t *samples;\n    uint32_t samplesLen;\n"));
        assert!(header.contains("const struct Config *config"));
        assert!(!header.contains("hdf_remote_service.h"));
    }

    #[test]
    fn test_callback_header_declares_stub_struct() {
        let plan = analyze(
            &InterfaceDecl::new("SensorCallback")
                .callback()
                .method(MethodDecl::new("OnEvent").param(ParamDecl::input("value", TypeRef::Prim(Prim::I32)))),
        );
        let header = generate_stub_header(&plan, &UserAccessor).unwrap();
        assert!(header.contains("#include <hdf_remote_service.h>"));
        assert!(header.contains("struct SensorCallbackStub {\n    struct ISensorCallback interface;"));
        assert!(header.contains("struct ISensorCallback *SensorCallbackStubGetInstance(void);"));
    }
}
