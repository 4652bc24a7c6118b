//! The multi-use function collector and the generators that feed it.
//!
//! Every helper routine (checked math, storage packing, ABI coding) is
//! requested by name through the shared collector; the first request wins
//! and later ones reuse it, so emission order is first-request order and
//! helpers are never duplicated even across different generators.

use super::names;
use crate::constants::{PANIC_DIV_OR_MOD_BY_ZERO, PANIC_OVER_OR_UNDERFLOW, PANIC_SELECTOR};
use crate::ir::{Expression, FunctionDefinition, Statement};
use indexmap::IndexMap;
use pact_analyzer::namespace::scopes::Shared;
use pact_analyzer::namespace::types::Type;

#[derive(Default)]
pub struct FunctionCollector {
    requested: IndexMap<String, Option<FunctionDefinition>>,
}

impl FunctionCollector {
    pub fn contains(&self, name: &str) -> bool {
        self.requested.contains_key(name)
    }

    fn begin(&mut self, name: &str) -> bool {
        if self.requested.contains_key(name) {
            return false;
        }
        self.requested.insert(name.to_string(), None);
        true
    }

    fn finish(&mut self, name: &str, def: FunctionDefinition) {
        self.requested.insert(name.to_string(), Some(def));
    }

    /// All collected functions, in first-request order.
    ///
    /// # Panics
    ///
    /// Panics if a requested function was never finished (a generator bug).
    pub fn requested_functions(&self) -> Vec<FunctionDefinition> {
        self.requested
            .iter()
            .map(|(name, def)| {
                def.clone()
                    .unwrap_or_else(|| panic!("function `{}` was requested but never built", name))
            })
            .collect()
    }
}

/// Request `name` from the collector, building it with `builder` only on
/// first use. The builder may itself request further functions.
pub fn create_function(
    collector: &Shared<FunctionCollector>,
    name: &str,
    builder: impl FnOnce() -> FunctionDefinition,
) -> String {
    if !collector.borrow_mut().begin(name) {
        return name.to_string();
    }
    let def = builder();
    collector.borrow_mut().finish(name, def);
    name.to_string()
}

fn mask_hex(bytes: usize) -> String {
    format!("0x{}", "ff".repeat(bytes))
}

fn left_mask_hex(bytes: usize) -> String {
    format!("0x{}{}", "ff".repeat(bytes), "00".repeat(32 - bytes))
}

/// Converts a value-form expression to its canonical representation:
/// booleans to 0/1, addresses masked to 160 bits, `bytesN` left-aligned
/// with the tail cleared. `uint256` needs no cleanup.
fn cleanup_body(typ: &Type, value: Expression) -> Expression {
    match typ {
        Type::Uint | Type::Function(_) => value,
        Type::Bool => Expression::call(
            "iszero",
            vec![Expression::call("iszero", vec![value])],
        ),
        Type::Address | Type::Contract(_) => {
            Expression::call("and", vec![value, Expression::lit(mask_hex(20))])
        }
        Type::Bytes(len) => Expression::call(
            "and",
            vec![value, Expression::lit(left_mask_hex(*len as usize))],
        ),
    }
}

/// Generator for the general-purpose runtime helpers.
pub struct UtilFunctions {
    collector: Shared<FunctionCollector>,
}

impl UtilFunctions {
    pub fn new(collector: Shared<FunctionCollector>) -> Self {
        Self { collector }
    }

    pub fn panic_error(&self, code: usize) -> String {
        let name = names::panic_name(code);
        create_function(&self.collector, &name, || FunctionDefinition {
            name: name.clone(),
            params: vec![],
            returns: vec![],
            body: vec![
                Statement::Expression(Expression::call(
                    "mstore",
                    vec![
                        Expression::dec(0),
                        Expression::call(
                            "shl",
                            vec![Expression::dec(224), Expression::lit(PANIC_SELECTOR)],
                        ),
                    ],
                )),
                Statement::Expression(Expression::call(
                    "mstore",
                    vec![Expression::dec(4), Expression::dec(code)],
                )),
                Statement::Expression(Expression::call(
                    "revert",
                    vec![Expression::dec(0), Expression::dec(0x24)],
                )),
            ],
        })
    }

    /// Overflow-checked arithmetic on 256-bit words. `op` is one of `add`,
    /// `sub`, `mul`, `div`, `mod`.
    pub fn checked_op(&self, op: &str) -> String {
        let name = names::checked_op_name(op);
        let panic_code = match op {
            "div" | "mod" => PANIC_DIV_OR_MOD_BY_ZERO,
            _ => PANIC_OVER_OR_UNDERFLOW,
        };
        let panic_fn = self.panic_error(panic_code);
        create_function(&self.collector, &name, || {
            let x = Expression::id("x");
            let y = Expression::id("y");
            let body = match op {
                "add" => vec![
                    Statement::Assignment {
                        name: "sum".to_string(),
                        value: Expression::call("add", vec![x.clone(), y]),
                    },
                    Statement::If {
                        condition: Expression::call("lt", vec![Expression::id("sum"), x]),
                        body: vec![Statement::Expression(Expression::call(
                            &panic_fn,
                            vec![],
                        ))],
                    },
                ],
                "sub" => vec![
                    Statement::If {
                        condition: Expression::call("lt", vec![x.clone(), y.clone()]),
                        body: vec![Statement::Expression(Expression::call(
                            &panic_fn,
                            vec![],
                        ))],
                    },
                    Statement::Assignment {
                        name: "sum".to_string(),
                        value: Expression::call("sub", vec![x, y]),
                    },
                ],
                "mul" => vec![
                    Statement::Assignment {
                        name: "sum".to_string(),
                        value: Expression::call("mul", vec![x.clone(), y.clone()]),
                    },
                    Statement::If {
                        condition: Expression::call(
                            "and",
                            vec![
                                Expression::call("iszero", vec![Expression::call(
                                    "iszero",
                                    vec![x.clone()],
                                )]),
                                Expression::call(
                                    "iszero",
                                    vec![Expression::call(
                                        "eq",
                                        vec![
                                            Expression::call(
                                                "div",
                                                vec![Expression::id("sum"), x],
                                            ),
                                            y,
                                        ],
                                    )],
                                ),
                            ],
                        ),
                        body: vec![Statement::Expression(Expression::call(
                            &panic_fn,
                            vec![],
                        ))],
                    },
                ],
                "div" | "mod" => vec![
                    Statement::If {
                        condition: Expression::call("iszero", vec![y.clone()]),
                        body: vec![Statement::Expression(Expression::call(&panic_fn, vec![]))],
                    },
                    Statement::Assignment {
                        name: "sum".to_string(),
                        value: Expression::call(op, vec![x, y]),
                    },
                ],
                other => panic!("unknown checked operation `{}`", other),
            };
            FunctionDefinition {
                name: name.clone(),
                params: vec!["x".to_string(), "y".to_string()],
                returns: vec!["sum".to_string()],
                body,
            }
        })
    }

    /// Identity-with-cleanup helper; `None` when no cleanup is needed.
    pub fn cleanup(&self, typ: &Type) -> Option<String> {
        if matches!(typ, Type::Uint | Type::Function(_)) {
            return None;
        }
        let name = names::cleanup_name(typ);
        let typ = typ.clone();
        Some(create_function(&self.collector, &name, || {
            FunctionDefinition {
                name: name.clone(),
                params: vec!["value".to_string()],
                returns: vec!["cleaned".to_string()],
                body: vec![Statement::Assignment {
                    name: "cleaned".to_string(),
                    value: cleanup_body(&typ, Expression::id("value")),
                }],
            }
        }))
    }

    /// Read a packed state variable: `fn(slot) -> value`.
    pub fn read_storage(&self, typ: &Type, byte_offset: u32) -> String {
        let name = names::read_storage_name(typ, byte_offset);
        let typ = typ.clone();
        create_function(&self.collector, &name, || {
            let size = typ.size_bytes();
            let raw = Expression::call(
                "and",
                vec![
                    Expression::call(
                        "shr",
                        vec![
                            Expression::dec(byte_offset as usize * 8),
                            Expression::call("sload", vec![Expression::id("slot")]),
                        ],
                    ),
                    Expression::lit(mask_hex(size)),
                ],
            );
            // bytesN values are left-aligned; everything else is kept as
            // the raw right-aligned word
            let value = match typ {
                Type::Bytes(len) => Expression::call(
                    "shl",
                    vec![Expression::dec((32 - len as usize) * 8), raw],
                ),
                _ => raw,
            };
            FunctionDefinition {
                name: name.clone(),
                params: vec!["slot".to_string()],
                returns: vec!["value".to_string()],
                body: vec![Statement::Assignment {
                    name: "value".to_string(),
                    value,
                }],
            }
        })
    }

    /// Write a packed state variable: `fn(slot, value)`.
    pub fn update_storage(&self, typ: &Type, byte_offset: u32) -> String {
        let name = names::update_storage_name(typ, byte_offset);
        let typ = typ.clone();
        create_function(&self.collector, &name, || {
            let size = typ.size_bytes();
            let raw = match &typ {
                Type::Bytes(len) => Expression::call(
                    "shr",
                    vec![
                        Expression::dec((32 - *len as usize) * 8),
                        Expression::id("value"),
                    ],
                ),
                _ => cleanup_body(&typ, Expression::id("value")),
            };
            let cleared = Expression::call(
                "and",
                vec![
                    Expression::call("sload", vec![Expression::id("slot")]),
                    Expression::call(
                        "not",
                        vec![Expression::call(
                            "shl",
                            vec![
                                Expression::dec(byte_offset as usize * 8),
                                Expression::lit(mask_hex(size)),
                            ],
                        )],
                    ),
                ],
            );
            FunctionDefinition {
                name: name.clone(),
                params: vec!["slot".to_string(), "value".to_string()],
                returns: vec![],
                body: vec![Statement::Expression(Expression::call(
                    "sstore",
                    vec![
                        Expression::id("slot"),
                        Expression::call(
                            "or",
                            vec![
                                cleared,
                                Expression::call(
                                    "shl",
                                    vec![Expression::dec(byte_offset as usize * 8), raw],
                                ),
                            ],
                        ),
                    ],
                )),
            ]}
        })
    }
}

/// Generator for calldata decoding and return-data encoding helpers.
/// Shares the collector with [`UtilFunctions`], so cleanup helpers
/// requested from either side exist exactly once.
pub struct AbiFunctions {
    collector: Shared<FunctionCollector>,
}

impl AbiFunctions {
    pub fn new(collector: Shared<FunctionCollector>) -> Self {
        Self { collector }
    }

    /// `fn(offset) -> value`: load a static value from calldata and
    /// validate its encoding.
    pub fn decode(&self, typ: &Type) -> String {
        let name = names::abi_decode_name(typ);
        let typ = typ.clone();
        create_function(&self.collector, &name, || {
            let mut body = vec![Statement::Assignment {
                name: "value".to_string(),
                value: Expression::call("calldataload", vec![Expression::id("offset")]),
            }];
            if !matches!(typ, Type::Uint) {
                body.push(Statement::If {
                    condition: Expression::call(
                        "iszero",
                        vec![Expression::call(
                            "eq",
                            vec![
                                Expression::id("value"),
                                cleanup_body(&typ, Expression::id("value")),
                            ],
                        )],
                    ),
                    body: vec![Statement::Expression(Expression::call(
                        "revert",
                        vec![Expression::dec(0), Expression::dec(0)],
                    ))],
                });
            }
            FunctionDefinition {
                name: name.clone(),
                params: vec!["offset".to_string()],
                returns: vec!["value".to_string()],
                body,
            }
        })
    }

    /// `fn(head, value)`: store a static value into the encoding head.
    pub fn encode(&self, typ: &Type) -> String {
        let name = names::abi_encode_name(typ);
        let typ = typ.clone();
        create_function(&self.collector, &name, || FunctionDefinition {
            name: name.clone(),
            params: vec!["head".to_string(), "value".to_string()],
            returns: vec![],
            body: vec![Statement::Expression(Expression::call(
                "mstore",
                vec![
                    Expression::id("head"),
                    cleanup_body(&typ, Expression::id("value")),
                ],
            ))],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{create_function, FunctionCollector, UtilFunctions};
    use crate::ir::FunctionDefinition;
    use pact_analyzer::namespace::types::Type;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn collector_deduplicates_and_keeps_order() {
        let collector = Rc::new(RefCell::new(FunctionCollector::default()));
        let mut built = 0;
        for name in ["b", "a", "b"] {
            create_function(&collector, name, || {
                built += 1;
                FunctionDefinition {
                    name: name.to_string(),
                    params: vec![],
                    returns: vec![],
                    body: vec![],
                }
            });
        }
        assert_eq!(built, 2);
        let names: Vec<_> = collector
            .borrow()
            .requested_functions()
            .into_iter()
            .map(|def| def.name)
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn generators_share_the_collector() {
        let collector = Rc::new(RefCell::new(FunctionCollector::default()));
        let utils = UtilFunctions::new(Rc::clone(&collector));
        let more_utils = UtilFunctions::new(Rc::clone(&collector));

        utils.checked_op("add");
        more_utils.checked_op("add");
        utils.cleanup(&Type::Bool);

        // checked_add, its panic helper, and one cleanup
        assert_eq!(collector.borrow().requested_functions().len(), 3);
    }

    #[test]
    fn uint_needs_no_cleanup() {
        let collector = Rc::new(RefCell::new(FunctionCollector::default()));
        let utils = UtilFunctions::new(collector);
        assert!(utils.cleanup(&Type::Uint).is_none());
        assert!(utils.cleanup(&Type::Address).is_some());
    }
}
