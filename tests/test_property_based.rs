//! Property-based tests for hdi-gen
//!
//! These tests use proptest to generate random valid interface models
//! and verify ordinal stability, deterministic output, exhaustive type
//! handling and the wire round trip through the simulated stub.

mod proptest_strategies;

use hdf_rt::status::{HdfStatus, HDF_ERR_INVALID_PARAM, HDF_SUCCESS};
use hdf_rt::HdfSbuf;
use hdi_gen::codegen::c_header::generate_stub_header;
use hdi_gen::codegen::c_server_stubs::CServerStubGenerator;
use hdi_gen::codegen::to_upper_snake;
use hdi_gen::semantic::Catalog;
use hdi_gen::sim::{CallFrame, Client, ServiceImpl, ServiceStub, Value};
use hdi_gen::*;
use proptest::prelude::*;
use proptest_strategies::*;

/// Copies `pin` into `pout`
struct Echo;

impl ServiceImpl for Echo {
    fn call(&mut self, _method: &str, frame: &mut CallFrame) -> HdfStatus {
        match frame.get("pin").cloned() {
            Some(value) => {
                frame.set("pout", value);
                HDF_SUCCESS
            }
            None => HDF_ERR_INVALID_PARAM,
        }
    }
}

fn echo_plan(ty: TypeRef) -> InterfacePlan {
    let decl = InterfaceDecl::new("Echo").method(
        MethodDecl::new("Echo")
            .param(ParamDecl::input("pin", ty.clone()))
            .param(ParamDecl::output("pout", ty)),
    );
    SemanticAnalyzer::new()
        .analyze("ohos.hdi.echo.v1_0", &decl)
        .expect("echo interface analyzes")
}

fn echo_plan_and_value() -> impl Strategy<Value = (InterfacePlan, Value)> {
    param_type().prop_flat_map(|ty| {
        let plan = echo_plan(ty);
        let value = value_for(&plan.methods[0].params[0].rule);
        (Just(plan), value)
    })
}

// ════════════════════════════════════════════════════════════
// Analyzer Property Tests
// ════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Ordinals are declaration positions, and the command ids follow them
    #[test]
    fn ordinals_follow_declaration_order(iface in interface()) {
        let plan = SemanticAnalyzer::new()
            .analyze("ohos.hdi.test.v1_0", &iface)
            .expect("valid interface analyzes");
        let generator = CServerStubGenerator::default();
        let header = generate_stub_header(&plan, generator.accessor()).unwrap();
        let upper = to_upper_snake(hdi_gen::codegen::base_name(&plan.name));

        let mut last = 0;
        for (position, method) in plan.methods.iter().enumerate() {
            prop_assert_eq!(method.ordinal as usize, position);
            prop_assert_eq!(&method.name, &iface.methods[position].name);
            let line = format!("CMD_{}_{} = {},", upper, to_upper_snake(&method.name), position);
            let at = header.find(&line);
            prop_assert!(at.is_some(), "missing {}", line);
            let at = at.unwrap();
            prop_assert!(at >= last);
            last = at;
        }
    }

    /// Every parameter maps to exactly one rule
    #[test]
    fn every_param_has_a_rule(ty in param_type()) {
        let at = Location::interface("T").method("M").param("p");
        prop_assert!(Catalog::new().rule_for_type(&ty, &at).is_ok());
    }

    /// Variants without a C rule fail loudly, naming the parameter
    #[test]
    fn unmapped_types_are_integrity_failures(ty in unmapped_type()) {
        let decl = InterfaceDecl::new("Sensor")
            .method(MethodDecl::new("Set").param(ParamDecl::input("pvalue", ty)));
        let err = SemanticAnalyzer::new().analyze("ohos.hdi.sensor.v1_0", &decl).unwrap_err();
        prop_assert!(
            matches!(err, IntegrityError::UnmappedType { .. }),
            "unexpected error {:?}",
            err
        );
        prop_assert_eq!(err.location().param.as_deref(), Some("pvalue"));
    }
}

// ════════════════════════════════════════════════════════════
// Generation Property Tests
// ════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Same input, same bytes, in either mode
    #[test]
    fn generation_is_deterministic(iface in interface(), kernel in any::<bool>()) {
        let file = InterfaceFile {
            package: "ohos.hdi.test.v1_0".to_string(),
            interfaces: vec![iface],
        };
        let config = if kernel { GeneratorConfig::kernel() } else { GeneratorConfig::default() };
        let first = generate_file(&file, &config).unwrap();
        let second = generate_file(&file, &config).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Method bodies and table entries appear in ordinal order
    #[test]
    fn stubs_emitted_in_ordinal_order(iface in interface()) {
        let plan = SemanticAnalyzer::new().analyze("ohos.hdi.test.v1_0", &iface).unwrap();
        let source = CServerStubGenerator::default().generate(&plan).unwrap();
        let mut last = 0;
        for method in &plan.methods {
            let at = source.find(&format!("static int32_t SerStub{}(", method.name));
            prop_assert!(at.is_some());
            let at = at.unwrap();
            prop_assert!(at >= last);
            last = at;
        }
    }
}

// ════════════════════════════════════════════════════════════
// Wire Round Trip
// ════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A value sent by the client comes back unchanged through the stub
    #[test]
    fn values_round_trip_through_stub((plan, value) in echo_plan_and_value()) {
        let mut stub = ServiceStub::new(plan.clone(), Echo, Mode::User);
        let client = Client::new(&plan, Mode::User);
        let results = client.call(&mut stub, "Echo", std::slice::from_ref(&value));
        prop_assert_eq!(results, Ok(vec![("pout".to_string(), value)]));

        // Everything acquired was released, newest first
        let trace = stub.trace();
        let mut acquired = trace.acquired();
        acquired.reverse();
        prop_assert_eq!(trace.released(), acquired);
    }

    /// Any strict prefix of a valid request is rejected without a call
    #[test]
    fn truncated_requests_are_rejected((plan, value) in echo_plan_and_value(), cut in any::<prop::sample::Index>()) {
        let client = Client::new(&plan, Mode::User);
        let method = &plan.methods[0];
        let data = client.encode_request(method, std::slice::from_ref(&value)).unwrap();
        let len = data.data_size();
        prop_assume!(len > 0);
        let keep = cut.index(len);

        let mut truncated = HdfSbuf::from_bytes(&data.as_bytes()[..keep]);
        let mut stub = ServiceStub::new(plan.clone(), Echo, Mode::User);
        let status = stub.on_remote_request(0, &mut truncated, &mut HdfSbuf::new());
        prop_assert_eq!(status, HDF_ERR_INVALID_PARAM);
        prop_assert!(!stub.trace().called());
    }
}
