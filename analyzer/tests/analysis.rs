use pact_analyzer::context::{AnalysisContext, GlobalContext};
use pact_analyzer::errors::{ErrorKind, SemanticError};
use pact_analyzer::namespace::types::Type;
use pact_analyzer::traversal::contracts::ContractAsts;
use pact_analyzer::traversal::{contracts, functions, module};
use pact_parser::ast::ModuleStmt;
use pact_parser::node::Node;
use pact_parser::Scanner;
use rstest::rstest;

/// Run all three analysis phases over a single source, the way the
/// compilation driver drives them.
fn analyze(src: &str) -> Result<AnalysisContext, SemanticError> {
    let scanner = Scanner::new(src, "test");
    let module_ast: Node<pact_parser::ast::Module> =
        pact_parser::parse(&scanner).expect("source should parse");

    let mut global = GlobalContext::new();
    let mut analysis = AnalysisContext::new();
    module::register_declarations(&mut global, &module_ast, "test")?;

    let mut asts = ContractAsts::new();
    for stmt in &module_ast.kind.body {
        if let ModuleStmt::Contract(contract) = stmt {
            asts.insert(contract.kind.name.kind.clone(), (contract, "test"));
        }
    }

    for stmt in &module_ast.kind.body {
        if let ModuleStmt::Contract(contract) = stmt {
            global.set_current_contract(contract.id, &contract.kind.name.kind);
            contracts::resolve_contract(&global, &mut analysis, contract, &asts, "test")?;
        }
    }
    for stmt in &module_ast.kind.body {
        if let ModuleStmt::Contract(contract) = stmt {
            global.set_current_contract(contract.id, &contract.kind.name.kind);
            functions::check_contract(&mut analysis, contract, "test")?;
        }
    }
    Ok(analysis)
}

fn expect_error(src: &str) -> SemanticError {
    analyze(src).expect_err("analysis should fail")
}

#[test]
fn resolves_simple_contract() {
    let analysis = analyze(
        "contract A {\n\
            uint256 total;\n\
            function add(uint256 x) public returns (uint256) {\n\
                total = total + x;\n\
                return total;\n\
            }\n\
        }",
    )
    .unwrap();
    let attrs = analysis.contract_by_name("A").unwrap();
    assert!(attrs.fully_implemented);
    assert_eq!(attrs.functions.len(), 1);
    assert_eq!(attrs.variables.len(), 1);
    assert_eq!(attrs.variables[0].typ, Type::Uint);
}

#[test]
fn storage_layout_packs_across_hierarchy() {
    let analysis = analyze(
        "contract Base { address owner; bool frozen; }\n\
         contract Derived is Base { uint256 amount; bytes4 tag; }",
    )
    .unwrap();
    let attrs = analysis.contract_by_name("Derived").unwrap();
    let placements: Vec<_> = attrs
        .variables
        .iter()
        .map(|var| (var.name.as_str(), var.slot, var.byte_offset))
        .collect();
    // base-most variables first; address and bool share a slot
    assert_eq!(
        placements,
        vec![
            ("owner", 0, 0),
            ("frozen", 0, 20),
            ("amount", 1, 0),
            ("tag", 2, 0),
        ]
    );
}

#[test]
fn layout_is_deterministic() {
    let src = "contract C { address a; bool b; uint256 c; }";
    let first = analyze(src).unwrap();
    let second = analyze(src).unwrap();
    let layout = |analysis: &AnalysisContext| {
        analysis
            .contract_by_name("C")
            .unwrap()
            .variables
            .iter()
            .map(|var| (var.slot, var.byte_offset))
            .collect::<Vec<_>>()
    };
    assert_eq!(layout(&first), layout(&second));
}

#[test]
fn inherited_functions_are_merged_most_derived_wins() {
    let analysis = analyze(
        "contract L { function g() public returns (uint256) { return 1; } }\n\
         contract U is L { }\n\
         contract V is L { function g() public returns (uint256) { return 2; } }",
    )
    .unwrap();
    let u = analysis.contract_by_name("U").unwrap();
    assert!(u.functions.contains_key("g"));
    assert_eq!(u.functions["g"].defined_in, "L");

    let v = analysis.contract_by_name("V").unwrap();
    assert_eq!(v.functions["g"].defined_in, "V");
}

#[test]
fn linearization_is_most_derived_first() {
    let analysis = analyze(
        "contract A { }\n\
         contract B is A { }\n\
         contract C is B, A { }",
    )
    .unwrap();
    let attrs = analysis.contract_by_name("C").unwrap();
    let names: Vec<_> = attrs
        .linearized
        .iter()
        .map(|(_, name)| name.as_str())
        .collect();
    assert_eq!(names, vec!["C", "B", "A"]);
}

#[test]
fn abstract_contracts_are_detected() {
    let analysis = analyze("contract I { function f(); }").unwrap();
    assert!(!analysis.contract_by_name("I").unwrap().fully_implemented);

    let analysis = analyze(
        "contract I { function f(); }\n\
         contract C is I { function f() public { } }",
    )
    .unwrap();
    assert!(analysis.contract_by_name("C").unwrap().fully_implemented);
}

#[test]
fn created_contracts_are_collected() {
    let analysis = analyze(
        "contract D { }\n\
         contract C { function make() public returns (address) { return address(new D()); } }",
    )
    .unwrap();
    let attrs = analysis.contract_by_name("C").unwrap();
    assert!(attrs.created_contracts.contains("D"));
}

#[test]
fn immutables_get_no_storage_slot() {
    let analysis = analyze(
        "contract C {\n\
            uint256 immutable limit;\n\
            uint256 total;\n\
            constructor(uint256 l) { limit = l; }\n\
        }",
    )
    .unwrap();
    let attrs = analysis.contract_by_name("C").unwrap();
    let total = attrs.variable("total").unwrap();
    assert_eq!((total.slot, total.byte_offset), (0, 0));
    assert!(attrs.variable("limit").unwrap().immutable);
}

#[rstest]
#[case("contract C { function f() public { x = 1; } }", ErrorKind::DeclarationError)]
#[case("contract C { uint256 x; uint256 x; }", ErrorKind::DeclarationError)]
#[case("contract C is Nope { }", ErrorKind::DeclarationError)]
#[case("contract C is C { }", ErrorKind::DeclarationError)]
#[case("contract C { uint256 msg; }", ErrorKind::DeclarationError)]
#[case(
    "contract C { function f() public { uint256 a = true; } }",
    ErrorKind::TypeError
)]
#[case(
    "contract C { function f() public { if (1) { } } }",
    ErrorKind::TypeError
)]
#[case(
    "contract C { uint256 immutable x; function f() public { x = 1; } }",
    ErrorKind::TypeError
)]
#[case(
    "contract C { function f() public { break; } }",
    ErrorKind::TypeError
)]
#[case(
    "contract L { function g() public returns (uint256) { return 1; } }\n\
     contract U is L { function g() public { } }",
    ErrorKind::TypeError
)]
#[case(
    "contract L { function g() private { } }\n\
     contract U is L { function f() public { g(); } }",
    ErrorKind::TypeError
)]
#[case(
    "contract C { function f() public { bool b = true && 1; } }",
    ErrorKind::TypeError
)]
fn rejected_sources(#[case] src: &str, #[case] kind: ErrorKind) {
    let err = expect_error(src);
    assert_eq!(err.kind, kind, "unexpected error: {}", err);
}

#[test]
fn function_pointers_resolve() {
    let analysis = analyze(
        "contract C {\n\
            function twice(uint256 x) internal returns (uint256) { return x + x; }\n\
            function apply(uint256 v) public returns (uint256) {\n\
                function(uint256) returns (uint256) op = twice;\n\
                return op(v);\n\
            }\n\
        }",
    )
    .unwrap();
    let attrs = analysis.contract_by_name("C").unwrap();
    assert_eq!(attrs.functions.len(), 2);
}

#[test]
fn magic_globals_have_types() {
    let analysis = analyze(
        "contract C {\n\
            address last;\n\
            uint256 stamp;\n\
            function touch() public {\n\
                last = msg.sender;\n\
                stamp = block.timestamp;\n\
            }\n\
        }",
    )
    .unwrap();
    let attrs = analysis.contract_by_name("C").unwrap();
    assert_eq!(attrs.variable("last").unwrap().typ, Type::Address);
}

#[test]
fn super_calls_resolve_to_bases() {
    let analysis = analyze(
        "contract L { function g() public returns (uint256) { return 1; } }\n\
         contract U is L {\n\
            function g() public returns (uint256) { return super.g() + 1; }\n\
         }",
    )
    .unwrap();
    assert!(analysis.contract_by_name("U").unwrap().fully_implemented);
}
