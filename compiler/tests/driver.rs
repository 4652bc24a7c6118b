use pact_compiler::natspec::DocumentationKind;
use pact_compiler::{AssemblyItem, CompileError, Driver, RevertStrings};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

#[test]
fn single_anonymous_source_compiles() {
    let mut driver = Driver::new(false);
    driver.set_source("contract A { function f() { } }");
    driver.parse().unwrap();
    driver.compile(false, 200).unwrap();

    assert_eq!(driver.contract_names().unwrap(), vec!["A".to_string()]);
    assert!(!driver.runtime_object("A").unwrap().bytecode.is_empty());
    assert_ne!(driver.contract_code_hash("A").unwrap(), [0u8; 32]);
}

#[test]
fn empty_name_falls_back_to_last_user_contract() {
    let mut driver = Driver::new(false);
    driver.set_source("contract A { function f() { } } contract B { function g() { } }");
    driver.compile(false, 200).unwrap();
    // the last user-supplied contract in source order wins
    assert_eq!(
        driver.object("").unwrap().bytecode,
        driver.object("B").unwrap().bytecode
    );
}

#[test]
fn imports_resolve_topologically() {
    let mut driver = Driver::new(false);
    driver.add_source(
        "Lib",
        "contract L { function g() returns (uint256) { return 1; } }",
        false,
    );
    driver.add_source("User", "import \"Lib\";\ncontract U is L { }", false);
    driver.parse().unwrap();

    assert_eq!(
        driver.source_order().unwrap(),
        &["Lib".to_string(), "User".to_string()][..]
    );
    // U sees L's members through inheritance
    let attrs = driver.contract_attributes("U").unwrap();
    assert!(attrs.functions.contains_key("g"));
    assert_eq!(attrs.functions["g"].defined_in, "L");

    driver.compile(false, 200).unwrap();
    assert!(!driver.runtime_object("U").unwrap().bytecode.is_empty());
}

#[test]
fn import_cycles_are_cut_silently() {
    let mut driver = Driver::new(false);
    driver.add_source("A", "import \"B\";\ncontract CA { }", false);
    driver.add_source("B", "import \"A\";\ncontract CB { }", false);
    driver.parse().unwrap();

    let order = driver.source_order().unwrap();
    assert_eq!(order.len(), 2);
    assert!(order.contains(&"A".to_string()));
    assert!(order.contains(&"B".to_string()));
}

#[test]
fn missing_import_is_a_parser_error_at_the_import() {
    let mut driver = Driver::new(false);
    driver.add_source("A", "import \"Nope\";\ncontract CA { }", false);
    let err = driver.parse().expect_err("parse should fail");
    let CompileError::Parser(parse_err) = err else {
        panic!("expected a parser error, got {}", err);
    };
    assert_eq!(parse_err.location.source, "A");
    // the location points inside "A", at the import directive
    let (line, column, _, _) = {
        let mut probe = Driver::new(false);
        probe.add_source("A", "import \"Nope\";\ncontract CA { }", false);
        let _ = probe.parse();
        probe
            .position_from_source_location(&parse_err.location)
            .unwrap()
    };
    assert_eq!((line, column), (1, 1));
}

#[test]
fn abstract_contracts_compile_to_nothing() {
    let mut driver = Driver::new(false);
    driver.set_source("contract I { function f(); }");
    driver.compile(false, 200).unwrap();

    assert!(driver.runtime_object("I").unwrap().bytecode.is_empty());
    assert_eq!(driver.contract_code_hash("I").unwrap(), [0u8; 32]);

    let mut out = Vec::new();
    let value = driver
        .stream_assembly(&mut out, "I", &BTreeMap::new(), false)
        .unwrap();
    assert!(value.is_null());
    assert!(String::from_utf8(out).unwrap().contains("not fully implemented"));
}

#[test]
fn function_entry_points_are_distinct_runtime_tags() {
    let mut driver = Driver::new(false);
    driver.set_source("contract C { function f() { } function g() { } }");
    driver.compile(false, 200).unwrap();

    let contract = driver.contract_definition("C").unwrap();
    let funcs: Vec<_> = contract.kind.functions().cloned().collect();
    let f_entry = driver.function_entry_point("C", &funcs[0]).unwrap();
    let g_entry = driver.function_entry_point("C", &funcs[1]).unwrap();

    assert_ne!(f_entry, 0);
    assert_ne!(g_entry, 0);
    assert_ne!(f_entry, g_entry);

    let items = driver.runtime_assembly_items("C").unwrap().unwrap();
    for entry in [f_entry, g_entry] {
        assert!(matches!(items[entry], AssemblyItem::Tag(_)));
    }
}

#[test]
fn reset_and_reparse_is_idempotent() {
    let mut driver = Driver::new(false);
    driver.add_source("Lib", "contract L { }", false);
    driver.add_source("User", "import \"Lib\";\ncontract U is L { }", false);
    driver.parse().unwrap();
    let order_before = driver.source_order().unwrap().to_vec();
    let names_before = driver.contract_names().unwrap();

    driver.reset(true, false);
    assert!(driver.contract_names().is_err());
    driver.parse().unwrap();
    assert_eq!(driver.source_order().unwrap(), &order_before[..]);
    assert_eq!(driver.contract_names().unwrap(), names_before);
}

#[test]
fn add_source_replaces_and_reports_existence() {
    let mut driver = Driver::new(false);
    assert!(!driver.add_source("A", "contract A { }", false));
    assert!(driver.add_source("A", "contract B { }", false));
    driver.parse().unwrap();
    assert_eq!(driver.contract_names().unwrap(), vec!["B".to_string()]);
}

#[test]
fn queries_require_a_successful_parse() {
    let driver = Driver::new(false);
    assert!(matches!(
        driver.contract_names(),
        Err(CompileError::Compiler(_))
    ));

    let mut driver = Driver::new(false);
    driver.set_source("contract A { function f() { uint256 x = true; } }");
    assert!(driver.parse().is_err());
    assert!(driver.contract_names().is_err());

    // a later successful parse clears the failure
    driver.set_source("contract A { }");
    driver.parse().unwrap();
    assert!(driver.contract_names().is_ok());
}

#[test]
fn compilation_is_deterministic() {
    let src = "contract C {\n\
        uint256 total;\n\
        function add(uint256 x) public returns (uint256) {\n\
            total = total + x;\n\
            return total;\n\
        }\n\
    }";
    let first = Driver::static_compile(src, false).unwrap();
    let second = Driver::static_compile(src, false).unwrap();
    assert_eq!(first.bytecode, second.bytecode);
    assert!(first.is_sealed());
}

#[test]
fn optimized_objects_are_not_larger() {
    let src = "contract C { function f(uint256 x) public returns (uint256) { return x + 1; } }";
    let plain = Driver::static_compile(src, false).unwrap();
    let optimized = Driver::static_compile(src, true).unwrap();
    assert!(optimized.bytecode.len() <= plain.bytecode.len());
}

#[test]
fn clone_objects_delegate_through_a_link_reference() {
    let mut driver = Driver::new(false);
    driver.set_source("contract A { function f() { } }");
    driver.compile(false, 200).unwrap();

    let clone = driver.clone_object("A").unwrap();
    assert!(!clone.bytecode.is_empty());
    assert_eq!(clone.link_references.len(), 1);
    assert_eq!(clone.link_references[0].symbol, "A");
    assert!(!clone.is_sealed());
}

#[test]
fn library_address_references_unseal_the_runtime() {
    let mut driver = Driver::new(false);
    driver.add_source("Registry", "contract Registry { function r() { } }", false);
    driver.add_source(
        "User",
        "import \"Registry\";\n\
         contract User {\n\
            function reg() public returns (address) { return address(Registry); }\n\
         }",
        false,
    );
    driver.compile(false, 200).unwrap();

    let runtime = driver.runtime_object("User").unwrap();
    assert!(!runtime.is_sealed());
    assert_eq!(runtime.link_references[0].symbol, "Registry");
    // hashing is defined only for sealed objects
    assert_eq!(driver.contract_code_hash("User").unwrap(), [0u8; 32]);
}

#[test]
fn created_contracts_nest_as_sub_objects() {
    let mut driver = Driver::new(false);
    driver.set_source(
        "contract D { function d() { } }\n\
         contract C {\n\
            function make() public returns (address) { return address(new D()); }\n\
         }",
    );
    driver.compile(false, 200).unwrap();

    let d_deploy = driver.object("D").unwrap();
    let c_runtime = driver.runtime_object("C").unwrap();
    // D's full deployment bytecode is embedded in C's runtime
    assert!(windows_contain(&c_runtime.bytecode, &d_deploy.bytecode));
}

#[test]
fn immutables_live_in_code_not_storage() {
    let mut driver = Driver::new(false);
    driver.set_source(
        "contract C {\n\
            uint256 immutable limit;\n\
            constructor(uint256 l) { limit = l; }\n\
            function get() public returns (uint256) { return limit; }\n\
        }",
    );
    driver.compile(false, 200).unwrap();
    let items = driver.runtime_assembly_items("C").unwrap().unwrap();
    // runtime reads the immutable with CODECOPY, never SLOAD
    use pact_compiler::asm::Opcode;
    assert!(!items
        .iter()
        .any(|item| *item == AssemblyItem::Op(Opcode::SLoad)));
    assert!(items
        .iter()
        .any(|item| *item == AssemblyItem::Op(Opcode::CodeCopy)));
    assert!(!driver.runtime_object("C").unwrap().bytecode.is_empty());
}

#[test]
fn standard_sources_are_libraries() {
    let mut driver = Driver::new(true);
    driver.add_source("main", "contract Main { function f() { } }", false);
    driver.parse().unwrap();

    // unimported libraries are parsed but never enter the order
    let order = driver.source_order().unwrap();
    assert_eq!(order, &["main".to_string()][..]);

    let mut driver = Driver::new(true);
    driver.add_source(
        "main",
        "import \"mortal\";\ncontract Main is mortal { function f() { } }",
        false,
    );
    driver.parse().unwrap();
    let order = driver.source_order().unwrap().to_vec();
    assert_eq!(order, vec!["owned", "mortal", "main"]);

    driver.compile(false, 200).unwrap();
    assert!(!driver.runtime_object("Main").unwrap().bytecode.is_empty());
    // the empty-name fallback skips the standard bundle
    assert_eq!(
        driver.object("").unwrap().bytecode,
        driver.object("Main").unwrap().bytecode
    );
}

#[test]
fn metadata_is_cached_per_kind() {
    let mut driver = Driver::new(false);
    driver.set_source(
        "/// @title Counter\n\
         contract C {\n\
            /// @notice bumps the counter\n\
            /// @param x the increment\n\
            /// @return the new total\n\
            function add(uint256 x) public returns (uint256) { return x; }\n\
         }",
    );
    driver.parse().unwrap();

    let user: serde_json::Value =
        serde_json::from_str(&driver.metadata("C", DocumentationKind::NatspecUser).unwrap())
            .unwrap();
    assert_eq!(
        user["methods"]["add(uint256)"]["notice"],
        "bumps the counter"
    );

    let dev: serde_json::Value =
        serde_json::from_str(&driver.metadata("C", DocumentationKind::NatspecDev).unwrap())
            .unwrap();
    assert_eq!(dev["title"], "Counter");
    assert_eq!(dev["methods"]["add(uint256)"]["params"]["x"], "the increment");

    let abi: serde_json::Value =
        serde_json::from_str(&driver.interface("C").unwrap()).unwrap();
    assert_eq!(abi[0]["name"], "add");
    assert_eq!(abi[0]["inputs"][0]["type"], "uint256");

    let interface = driver.source_interface("C").unwrap();
    assert!(interface.contains("contract C {"));
    assert!(interface.contains("function add(uint256 x) public returns (uint256);"));

    // second access returns the cached value
    let again = driver.metadata("C", DocumentationKind::NatspecDev).unwrap();
    assert_eq!(serde_json::from_str::<serde_json::Value>(&again).unwrap(), dev);
}

#[test]
fn internal_dispatch_compiles_pointer_calls() {
    let mut driver = Driver::new(false);
    driver.set_source(
        "contract C {\n\
            function twice(uint256 x) internal returns (uint256) { return x + x; }\n\
            function apply(uint256 v) public returns (uint256) {\n\
                function(uint256) returns (uint256) op = twice;\n\
                return op(v);\n\
            }\n\
        }",
    );
    driver.compile(false, 200).unwrap();
    assert!(!driver.runtime_object("C").unwrap().bytecode.is_empty());
}

#[test]
fn uninitialized_pointer_calls_still_compile() {
    let mut driver = Driver::new(false);
    driver.set_source(
        "contract C {\n\
            function run(uint256 v) public returns (uint256) {\n\
                function(uint256) returns (uint256) op;\n\
                return op(v);\n\
            }\n\
        }",
    );
    // no candidate ever lands in the dispatch set; the call traps at
    // runtime but compilation succeeds
    driver.compile(false, 200).unwrap();
    assert!(!driver.runtime_object("C").unwrap().bytecode.is_empty());
}

#[test]
fn positions_are_one_based() {
    let mut driver = Driver::new(false);
    driver.add_source("main", "contract A { }\ncontract B { }", false);
    driver.parse().unwrap();

    let contract = driver.contract_definition("B").unwrap();
    let location =
        pact_common::SourceLocation::new(contract.kind.name.span, "main".to_string());
    let (start_line, start_column, end_line, end_column) =
        driver.position_from_source_location(&location).unwrap();
    assert_eq!((start_line, start_column), (2, 10));
    assert_eq!((end_line, end_column), (2, 11));
}

#[test]
fn inline_assembly_disables_the_peephole() {
    let src = "contract C {\n\
        function f() public returns (uint256) {\n\
            assembly { sstore(0, 1) }\n\
            return 1;\n\
        }\n\
    }";
    let plain = Driver::static_compile(src, false).unwrap();
    let optimized = Driver::static_compile(src, true).unwrap();
    assert_eq!(plain.bytecode, optimized.bytecode);
}

#[test]
fn inherited_callers_bind_to_the_most_derived_override() {
    let mut driver = Driver::new(false);
    driver.set_source(
        "contract Base {\n\
            function hook() public returns (uint256) { return 1; }\n\
            function run() public returns (uint256) { return hook(); }\n\
         }\n\
         contract Derived is Base {\n\
            function hook() public returns (uint256) { return 2; }\n\
         }",
    );
    driver.compile(false, 200).unwrap();
    // `run` lowers once per contract; in Derived it must call the override
    assert_ne!(
        driver.runtime_object("Base").unwrap().bytecode,
        driver.runtime_object("Derived").unwrap().bytecode
    );
}

#[test]
fn abstract_base_calls_resolve_in_implementing_contracts() {
    let mut driver = Driver::new(false);
    driver.set_source(
        "contract I {\n\
            function f();\n\
            function g() public returns (uint256) { return f(); }\n\
         }\n\
         contract C is I {\n\
            function f() public returns (uint256) { return 7; }\n\
         }",
    );
    driver.compile(false, 200).unwrap();
    assert!(driver.runtime_object("I").unwrap().bytecode.is_empty());
    assert!(!driver.runtime_object("C").unwrap().bytecode.is_empty());
}

#[test]
fn debug_revert_strings_grow_the_runtime() {
    let src = "contract C {\n\
        function f(uint256 x) public {\n\
            require(x > 0, \"x must be positive\");\n\
        }\n\
    }";
    let mut plain = Driver::new(false);
    plain.set_source(src);
    plain.compile(false, 200).unwrap();

    let mut debug = Driver::new(false);
    debug.set_revert_strings(RevertStrings::Debug);
    debug.set_source(src);
    debug.compile(false, 200).unwrap();

    // the stored reason string only exists in debug mode
    assert!(
        debug.runtime_object("C").unwrap().bytecode.len()
            > plain.runtime_object("C").unwrap().bytecode.len()
    );
}

fn windows_contain(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}
