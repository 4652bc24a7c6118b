use pact_parser::ast::{ContractStmt, Expr, FuncStmt, ModuleStmt, TypeDesc, Visibility};
use pact_parser::{parse, Scanner};
use rstest::rstest;

fn parse_ok(src: &str) -> pact_parser::ast::Module {
    let scanner = Scanner::new(src, "test");
    parse(&scanner).expect("source should parse").kind
}

#[test]
fn empty_contract() {
    let module = parse_ok("contract A { }");
    assert_eq!(module.body.len(), 1);
    let ModuleStmt::Contract(contract) = &module.body[0] else {
        panic!("expected a contract");
    };
    assert_eq!(contract.kind.name.kind, "A");
    assert!(contract.kind.bases.is_empty());
    assert!(contract.kind.is_fully_implemented());
}

#[test]
fn imports_and_inheritance() {
    let module = parse_ok("import \"Lib\";\ncontract U is L, M { }");
    let ModuleStmt::Import(import) = &module.body[0] else {
        panic!("expected an import");
    };
    assert_eq!(import.kind.name.kind, "Lib");
    let ModuleStmt::Contract(contract) = &module.body[1] else {
        panic!("expected a contract");
    };
    let bases: Vec<_> = contract
        .kind
        .bases
        .iter()
        .map(|base| base.kind.as_str())
        .collect();
    assert_eq!(bases, vec!["L", "M"]);
}

#[test]
fn function_bodies_and_abstractness() {
    let module = parse_ok("contract I { function f(); function g() { } }");
    let ModuleStmt::Contract(contract) = &module.body[0] else {
        panic!("expected a contract");
    };
    let funcs: Vec<_> = contract.kind.functions().collect();
    assert!(funcs[0].kind.body.is_none());
    assert!(funcs[1].kind.body.is_some());
    assert!(!contract.kind.is_fully_implemented());
}

#[test]
fn function_ids_ascend_in_parse_order() {
    let module = parse_ok("contract C { function f() { } function g() { } }");
    let ModuleStmt::Contract(contract) = &module.body[0] else {
        panic!("expected a contract");
    };
    let funcs: Vec<_> = contract.kind.functions().collect();
    assert!(funcs[0].id < funcs[1].id);
}

#[test]
fn state_variables_and_immutables() {
    let module = parse_ok("contract C { uint256 a; address immutable creator; }");
    let ModuleStmt::Contract(contract) = &module.body[0] else {
        panic!("expected a contract");
    };
    let vars: Vec<_> = contract.kind.variables().collect();
    assert_eq!(vars.len(), 2);
    assert!(!vars[0].kind.immutable);
    assert!(vars[1].kind.immutable);
    assert_eq!(vars[1].kind.name.kind, "creator");
}

#[test]
fn function_typed_state_variable() {
    let module = parse_ok("contract C { function(uint256) returns (uint256) handler; }");
    let ModuleStmt::Contract(contract) = &module.body[0] else {
        panic!("expected a contract");
    };
    let var = contract.kind.variables().next().expect("one variable");
    let TypeDesc::Function { params, returns } = &var.kind.typ.kind else {
        panic!("expected a function type");
    };
    assert_eq!(params.len(), 1);
    assert_eq!(returns.len(), 1);
}

#[test]
fn visibility_defaults_to_public() {
    let module = parse_ok("contract C { function f() { } function g() private { } }");
    let ModuleStmt::Contract(contract) = &module.body[0] else {
        panic!("expected a contract");
    };
    let funcs: Vec<_> = contract.kind.functions().collect();
    assert_eq!(funcs[0].kind.visibility, Visibility::Public);
    assert_eq!(funcs[1].kind.visibility, Visibility::Private);
}

#[test]
fn expression_precedence() {
    let module = parse_ok("contract C { function f() returns (uint256) { return 1 + 2 * 3; } }");
    let ModuleStmt::Contract(contract) = &module.body[0] else {
        panic!("expected a contract");
    };
    let func = contract.kind.functions().next().expect("one function");
    let body = func.kind.body.as_ref().expect("body");
    let FuncStmt::Return { value: Some(value) } = &body[0].kind else {
        panic!("expected a return");
    };
    // the addition is the root; the multiplication binds tighter
    let Expr::BinOperation { left, .. } = &value.kind else {
        panic!("expected a binary operation");
    };
    assert!(matches!(left.kind, Expr::Num(_)));
}

#[test]
fn doc_comments_attach() {
    let module = parse_ok(
        "/// @title A registry\ncontract C {\n    /// @notice does f\n    function f() { }\n}",
    );
    let ModuleStmt::Contract(contract) = &module.body[0] else {
        panic!("expected a contract");
    };
    assert_eq!(contract.kind.doc.as_deref(), Some("@title A registry"));
    let func = contract.kind.functions().next().expect("one function");
    assert_eq!(func.kind.doc.as_deref(), Some("@notice does f"));
}

#[test]
fn assembly_block_collects_raw_tokens() {
    let module =
        parse_ok("contract C { function f() { assembly { mstore(0, 1) sstore(0, 2) } } }");
    let ModuleStmt::Contract(contract) = &module.body[0] else {
        panic!("expected a contract");
    };
    let func = contract.kind.functions().next().expect("one function");
    let body = func.kind.body.as_ref().expect("body");
    let FuncStmt::Assembly { body: asm } = &body[0].kind else {
        panic!("expected an assembly block");
    };
    assert!(asm.contains("mstore"));
    assert!(asm.contains("sstore"));
}

#[test]
fn constructors_are_anonymous() {
    let module = parse_ok("contract C { constructor(uint256 x) { } }");
    let ModuleStmt::Contract(contract) = &module.body[0] else {
        panic!("expected a contract");
    };
    let func = contract.kind.functions().next().expect("constructor");
    assert!(func.kind.is_constructor());
    assert_eq!(func.kind.params.len(), 1);
}

#[test]
fn statements_round_out() {
    let module = parse_ok(
        "contract C { function f(uint256 n) returns (uint256) {\n\
            uint256 acc = 0;\n\
            uint256 i = 0;\n\
            while (i < n) {\n\
                if (i == 3) { break; } else { acc = acc + i; }\n\
                i = i + 1;\n\
            }\n\
            return acc;\n\
        } }",
    );
    let ModuleStmt::Contract(contract) = &module.body[0] else {
        panic!("expected a contract");
    };
    let func = contract.kind.functions().next().expect("one function");
    assert_eq!(func.kind.body.as_ref().expect("body").len(), 4);
}

#[rstest]
#[case("contract { }")]
#[case("contract A { function f() }")]
#[case("contract A { uint256 }")]
#[case("import Lib;")]
#[case("contract A { function f() { return 1 + ; } }")]
fn rejects_malformed_sources(#[case] src: &str) {
    let scanner = Scanner::new(src, "bad");
    let err = parse(&scanner).expect_err("source should not parse");
    assert_eq!(err.location.source, "bad");
}

#[test]
fn new_expression() {
    let module = parse_ok("contract C { function f() { address a = address(new D()); } }");
    let ModuleStmt::Contract(contract) = &module.body[0] else {
        panic!("expected a contract");
    };
    let func = contract.kind.functions().next().expect("one function");
    let body = func.kind.body.as_ref().expect("body");
    assert!(matches!(body[0].kind, FuncStmt::VarDecl { .. }));
}

#[test]
fn member_access_chains() {
    let module = parse_ok("contract C { function f() returns (address) { return msg.sender; } }");
    let ModuleStmt::Contract(contract) = &module.body[0] else {
        panic!("expected a contract");
    };
    let func = contract.kind.functions().next().expect("one function");
    let body = func.kind.body.as_ref().expect("body");
    let FuncStmt::Return { value: Some(value) } = &body[0].kind else {
        panic!("expected a return");
    };
    assert!(matches!(value.kind, Expr::Attribute { .. }));
}

#[test]
fn contract_stmt_kinds() {
    let module = parse_ok("contract C { uint256 x; function f() { } }");
    let ModuleStmt::Contract(contract) = &module.body[0] else {
        panic!("expected a contract");
    };
    assert!(matches!(contract.kind.body[0], ContractStmt::Variable(_)));
    assert!(matches!(contract.kind.body[1], ContractStmt::Function(_)));
}
