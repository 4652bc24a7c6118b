//! Compiles IR code objects into assembly item streams.
//!
//! Every function owns a memory frame: slot 0 holds the caller's frame
//! pointer, followed by parameters, returns and locals. The caller bumps
//! the frame pointer (held at `FRAME_PTR`) and writes the arguments before
//! jumping in; the callee writes its results into its own frame, restores
//! the pointer and jumps back, after which the caller reads the results
//! out of the dead frame. The EVM stack only ever carries the return tag
//! and expression temporaries, so recursion needs no stack scheduling.

use super::assembly::Assembly;
use super::item::{opcode_by_name, AssemblyItem, Opcode, TagId};
use crate::constants::FRAME_PTR;
use crate::errors::{CompileError, CompileResult};
use crate::ir::{Block, Code, Expression, Statement};
use pact_common::numeric;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct FrameLayout {
    offsets: BTreeMap<String, usize>,
    size: usize,
    params: usize,
    returns: Vec<String>,
    outs: usize,
}

/// The assembled item stream of one code object, along with the entry tag
/// of every function in it.
pub struct CompiledCode {
    pub assembly: Assembly,
    pub entry_tags: BTreeMap<String, TagId>,
}

pub fn compile_code(
    code: &Code,
    data_map: &BTreeMap<String, usize>,
) -> CompileResult<CompiledCode> {
    let mut layouts = BTreeMap::new();
    layouts.insert(String::new(), layout_of(&[], &[], &code.block));
    for function in &code.functions {
        layouts.insert(
            function.name.clone(),
            layout_of(&function.params, &function.returns, &function.body),
        );
    }

    let mut generator = CodeGenerator {
        items: vec![],
        tag_counter: 0,
        layouts,
        entry_tags: BTreeMap::new(),
        data_map,
        loop_stack: vec![],
        current: String::new(),
    };
    for function in &code.functions {
        let tag = generator.new_tag();
        generator.entry_tags.insert(function.name.clone(), tag);
    }

    generator.gen_block(&code.block)?;
    for function in &code.functions {
        generator.current = function.name.clone();
        generator.emit(AssemblyItem::Tag(generator.entry_tags[&function.name]));
        // previous calls may have left stale data in the reused frame
        for ret in function.returns.clone() {
            generator.emit(AssemblyItem::Push(vec![]));
            generator.store_var(&ret);
        }
        generator.gen_block(&function.body)?;
        generator.emit_epilogue();
    }

    Ok(CompiledCode {
        assembly: Assembly {
            items: generator.items,
            subs: vec![],
        },
        entry_tags: generator.entry_tags,
    })
}

/// Collect every variable declared in a function and assign frame offsets:
/// the saved frame pointer, parameters, returns, then locals.
fn layout_of(params: &[String], returns: &[String], body: &Block) -> FrameLayout {
    let mut layout = FrameLayout {
        params: params.len(),
        returns: returns.to_vec(),
        outs: returns.len(),
        ..Default::default()
    };
    let mut cursor = 32;
    for name in params.iter().chain(returns) {
        layout.offsets.insert(name.clone(), cursor);
        cursor += 32;
    }
    collect_locals(body, &mut layout.offsets, &mut cursor);
    layout.size = cursor;
    layout
}

fn collect_locals(block: &Block, offsets: &mut BTreeMap<String, usize>, cursor: &mut usize) {
    for stmt in block {
        match stmt {
            Statement::VariableDeclaration { names, .. } => {
                for name in names {
                    if !offsets.contains_key(name) {
                        offsets.insert(name.clone(), *cursor);
                        *cursor += 32;
                    }
                }
            }
            Statement::If { body, .. } => collect_locals(body, offsets, cursor),
            Statement::ForLoop {
                pre, post, body, ..
            } => {
                collect_locals(pre, offsets, cursor);
                collect_locals(post, offsets, cursor);
                collect_locals(body, offsets, cursor);
            }
            Statement::Block(body) => collect_locals(body, offsets, cursor),
            _ => {}
        }
    }
}

struct CodeGenerator<'a> {
    items: Vec<AssemblyItem>,
    tag_counter: usize,
    layouts: BTreeMap<String, FrameLayout>,
    entry_tags: BTreeMap<String, TagId>,
    data_map: &'a BTreeMap<String, usize>,
    loop_stack: Vec<(TagId, TagId)>,
    current: String,
}

impl<'a> CodeGenerator<'a> {
    fn new_tag(&mut self) -> TagId {
        let tag = TagId(self.tag_counter);
        self.tag_counter += 1;
        tag
    }

    fn emit(&mut self, item: AssemblyItem) {
        self.items.push(item);
    }

    fn emit_op(&mut self, op: Opcode) {
        self.emit(AssemblyItem::Op(op));
    }

    fn push_usize(&mut self, value: usize) {
        let bytes = value.to_be_bytes();
        let first = bytes.iter().position(|byte| *byte != 0).unwrap_or(bytes.len());
        self.emit(AssemblyItem::Push(bytes[first..].to_vec()));
    }

    fn frame_offset(&self, name: &str) -> CompileResult<usize> {
        self.layouts[&self.current]
            .offsets
            .get(name)
            .copied()
            .ok_or_else(|| {
                CompileError::compiler(format!("undeclared IR variable `{}`", name))
            })
    }

    /// Push `frame_ptr + offset`.
    fn push_var_address(&mut self, offset: usize) {
        self.push_usize(FRAME_PTR);
        self.emit_op(Opcode::MLoad);
        self.push_usize(offset);
        self.emit_op(Opcode::Add);
    }

    /// Pop the top of the stack into a frame variable.
    fn store_var(&mut self, name: &str) {
        let offset = self.frame_offset(name).expect("storing unknown variable");
        self.push_var_address(offset);
        self.emit_op(Opcode::MStore);
    }

    fn load_var(&mut self, name: &str) -> CompileResult<()> {
        let offset = self.frame_offset(name)?;
        self.push_var_address(offset);
        self.emit_op(Opcode::MLoad);
        Ok(())
    }

    /// Restore the caller's frame pointer and jump back through the return
    /// tag, which is the only value on the stack at statement boundaries.
    fn emit_epilogue(&mut self) {
        self.push_usize(FRAME_PTR);
        self.emit_op(Opcode::MLoad);
        self.emit_op(Opcode::MLoad);
        self.push_usize(FRAME_PTR);
        self.emit_op(Opcode::MStore);
        self.emit_op(Opcode::Jump);
    }

    fn gen_block(&mut self, block: &Block) -> CompileResult<()> {
        for stmt in block {
            self.gen_stmt(stmt)?;
        }
        Ok(())
    }

    fn gen_stmt(&mut self, stmt: &Statement) -> CompileResult<()> {
        match stmt {
            Statement::VariableDeclaration { names, value } => {
                match value {
                    Some(value) => {
                        let produced = self.gen_expr(value)?;
                        if produced != names.len() {
                            return Err(CompileError::compiler(format!(
                                "declaration of {} variable(s) from {} value(s)",
                                names.len(),
                                produced
                            )));
                        }
                    }
                    None => {
                        for _ in names {
                            self.emit(AssemblyItem::Push(vec![]));
                        }
                    }
                }
                for name in names.iter().rev() {
                    let offset = self.frame_offset(name)?;
                    self.push_var_address(offset);
                    self.emit_op(Opcode::MStore);
                }
                Ok(())
            }
            Statement::Assignment { name, value } => {
                let produced = self.gen_expr(value)?;
                if produced != 1 {
                    return Err(CompileError::compiler(
                        "assignment requires a single-valued expression",
                    ));
                }
                let offset = self.frame_offset(name)?;
                self.push_var_address(offset);
                self.emit_op(Opcode::MStore);
                Ok(())
            }
            Statement::Expression(expr) => {
                let produced = self.gen_expr(expr)?;
                for _ in 0..produced {
                    self.emit_op(Opcode::Pop);
                }
                Ok(())
            }
            Statement::If { condition, body } => {
                self.gen_value(condition)?;
                self.emit_op(Opcode::IsZero);
                let end = self.new_tag();
                self.emit(AssemblyItem::PushTag(end));
                self.emit_op(Opcode::JumpI);
                self.gen_block(body)?;
                self.emit(AssemblyItem::Tag(end));
                Ok(())
            }
            Statement::ForLoop {
                pre,
                condition,
                post,
                body,
            } => {
                self.gen_block(pre)?;
                let start = self.new_tag();
                let continue_tag = self.new_tag();
                let end = self.new_tag();
                self.emit(AssemblyItem::Tag(start));
                self.gen_value(condition)?;
                self.emit_op(Opcode::IsZero);
                self.emit(AssemblyItem::PushTag(end));
                self.emit_op(Opcode::JumpI);
                self.loop_stack.push((continue_tag, end));
                self.gen_block(body)?;
                self.loop_stack.pop();
                self.emit(AssemblyItem::Tag(continue_tag));
                self.gen_block(post)?;
                self.emit(AssemblyItem::PushTag(start));
                self.emit_op(Opcode::Jump);
                self.emit(AssemblyItem::Tag(end));
                Ok(())
            }
            Statement::Break => {
                let (_, end) = *self
                    .loop_stack
                    .last()
                    .ok_or_else(|| CompileError::compiler("`break` outside of a loop"))?;
                self.emit(AssemblyItem::PushTag(end));
                self.emit_op(Opcode::Jump);
                Ok(())
            }
            Statement::Continue => {
                let (continue_tag, _) = *self
                    .loop_stack
                    .last()
                    .ok_or_else(|| CompileError::compiler("`continue` outside of a loop"))?;
                self.emit(AssemblyItem::PushTag(continue_tag));
                self.emit_op(Opcode::Jump);
                Ok(())
            }
            Statement::Leave => {
                self.emit_epilogue();
                Ok(())
            }
            Statement::Block(body) => self.gen_block(body),
        }
    }

    /// Generate an expression that must produce exactly one value.
    fn gen_value(&mut self, expr: &Expression) -> CompileResult<()> {
        let produced = self.gen_expr(expr)?;
        if produced != 1 {
            return Err(CompileError::compiler(format!(
                "expected a single value, got {}",
                produced
            )));
        }
        Ok(())
    }

    /// Generate an expression, returning the number of values it leaves on
    /// the stack. Call arguments evaluate right to left.
    fn gen_expr(&mut self, expr: &Expression) -> CompileResult<usize> {
        match expr {
            Expression::Literal(text) => {
                let word = numeric::Literal::new(text).parse_word().ok_or_else(|| {
                    CompileError::compiler(format!("invalid IR literal `{}`", text))
                })?;
                let first = word.iter().position(|byte| *byte != 0).unwrap_or(32);
                self.emit(AssemblyItem::Push(word[first..].to_vec()));
                Ok(1)
            }
            Expression::StringLiteral(text) => Err(CompileError::compiler(format!(
                "string literal \"{}\" outside a data reference",
                text
            ))),
            Expression::Identifier(name) => {
                self.load_var(name)?;
                Ok(1)
            }
            Expression::Call { target, args } => self.gen_call(target, args),
        }
    }

    fn gen_call(&mut self, target: &str, args: &[Expression]) -> CompileResult<usize> {
        match target {
            "datasize" | "dataoffset" => {
                let name = data_name(args)?;
                let index = *self.data_map.get(&name).ok_or_else(|| {
                    CompileError::compiler(format!(
                        "reference to unknown data object \"{}\"",
                        name
                    ))
                })?;
                self.emit(if target == "datasize" {
                    AssemblyItem::PushSubSize(index)
                } else {
                    AssemblyItem::PushSubOffset(index)
                });
                return Ok(1);
            }
            "linkersymbol" => {
                let name = data_name(args)?;
                self.emit(AssemblyItem::PushLibraryAddress(name));
                return Ok(1);
            }
            "loadimmutable" => {
                let Some(Expression::Literal(index)) = args.first() else {
                    return Err(CompileError::compiler(
                        "loadimmutable expects an index literal",
                    ));
                };
                let index = parse_index(index)?;
                // copy the trailing code word into scratch and load it
                self.push_usize(32);
                self.emit(AssemblyItem::PushImmutable(index));
                self.push_usize(0);
                self.emit_op(Opcode::CodeCopy);
                self.push_usize(0);
                self.emit_op(Opcode::MLoad);
                return Ok(1);
            }
            _ => {}
        }

        if let Some(op) = opcode_by_name(target) {
            if args.len() != op.inputs() {
                return Err(CompileError::compiler(format!(
                    "`{}` expects {} argument(s), got {}",
                    target,
                    op.inputs(),
                    args.len()
                )));
            }
            for arg in args.iter().rev() {
                self.gen_value(arg)?;
            }
            self.emit_op(op);
            return Ok(op.outputs());
        }

        // user function: frame-stack calling convention
        let callee = self.layouts.get(target).cloned().ok_or_else(|| {
            CompileError::compiler(format!("call to unknown function `{}`", target))
        })?;
        let entry = *self
            .entry_tags
            .get(target)
            .expect("function has a layout but no entry tag");
        if args.len() != callee.params {
            return Err(CompileError::compiler(format!(
                "`{}` expects {} argument(s), got {}",
                target,
                callee.params,
                args.len()
            )));
        }
        let caller_size = self.layouts[&self.current].size;

        for arg in args.iter().rev() {
            self.gen_value(arg)?;
        }

        // allocate the callee frame and save the link
        self.push_usize(FRAME_PTR);
        self.emit_op(Opcode::MLoad);
        self.emit_op(Opcode::Dup1);
        self.push_usize(caller_size);
        self.emit_op(Opcode::Add);
        self.emit_op(Opcode::Dup2);
        self.emit_op(Opcode::Dup2);
        self.emit_op(Opcode::MStore);
        self.push_usize(FRAME_PTR);
        self.emit_op(Opcode::MStore);
        self.emit_op(Opcode::Pop);

        // arguments were evaluated right to left, so the first is on top
        for idx in 0..args.len() {
            self.push_var_address(32 * (1 + idx));
            self.emit_op(Opcode::MStore);
        }

        let ret = self.new_tag();
        self.emit(AssemblyItem::PushTag(ret));
        self.emit(AssemblyItem::PushTag(entry));
        self.emit_op(Opcode::Jump);
        self.emit(AssemblyItem::Tag(ret));

        // results sit in the (dead) callee frame right above ours
        for (idx, _) in callee.returns.iter().enumerate() {
            let offset = caller_size + 32 * (1 + args.len() + idx);
            self.push_var_address(offset);
            self.emit_op(Opcode::MLoad);
        }
        Ok(callee.outs)
    }
}

fn data_name(args: &[Expression]) -> CompileResult<String> {
    match args.first() {
        Some(Expression::StringLiteral(name)) if args.len() == 1 => Ok(name.clone()),
        _ => Err(CompileError::compiler(
            "data reference expects a single name string",
        )),
    }
}

fn parse_index(text: &str) -> CompileResult<usize> {
    let word = numeric::Literal::new(text)
        .parse_word()
        .ok_or_else(|| CompileError::compiler(format!("invalid index literal `{}`", text)))?;
    let mut value = 0usize;
    for byte in &word[24..] {
        value = (value << 8) | *byte as usize;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::compile_code;
    use crate::ir::{Code, Expression, FunctionDefinition, Statement};
    use std::collections::BTreeMap;

    fn empty_data() -> BTreeMap<String, usize> {
        BTreeMap::new()
    }

    #[test]
    fn opcode_arguments_evaluate_right_to_left() {
        let code = Code {
            name: "t".to_string(),
            block: vec![Statement::Expression(Expression::call(
                "mstore",
                vec![Expression::dec(0), Expression::dec(1)],
            ))],
            functions: vec![],
        };
        let compiled = compile_code(&code, &empty_data()).unwrap();
        let object = compiled.assembly.assemble();
        // PUSH1 1, PUSH1 0, MSTORE
        assert_eq!(object.bytecode, vec![0x60, 0x01, 0x60, 0x00, 0x52]);
    }

    #[test]
    fn functions_get_entry_tags() {
        let code = Code {
            name: "t".to_string(),
            block: vec![Statement::Expression(Expression::call(
                "stop",
                vec![],
            ))],
            functions: vec![FunctionDefinition {
                name: "fun_f_1".to_string(),
                params: vec![],
                returns: vec![],
                body: vec![],
            }],
        };
        let compiled = compile_code(&code, &empty_data()).unwrap();
        assert!(compiled.entry_tags.contains_key("fun_f_1"));
        let object = compiled.assembly.assemble();
        assert!(!object.bytecode.is_empty());
    }

    #[test]
    fn calls_allocate_and_release_frames() {
        let code = Code {
            name: "t".to_string(),
            block: vec![
                Statement::VariableDeclaration {
                    names: vec!["x".to_string()],
                    value: Some(Expression::call("fun_id_9", vec![Expression::dec(7)])),
                },
                Statement::Expression(Expression::call("stop", vec![])),
            ],
            functions: vec![FunctionDefinition {
                name: "fun_id_9".to_string(),
                params: vec!["a".to_string()],
                returns: vec!["r".to_string()],
                body: vec![Statement::Assignment {
                    name: "r".to_string(),
                    value: Expression::id("a"),
                }],
            }],
        };
        let compiled = compile_code(&code, &empty_data()).unwrap();
        let object = compiled.assembly.assemble();
        assert!(object.is_sealed());
        // deterministic: compiling twice yields identical bytecode
        let again = compile_code(&code, &empty_data()).unwrap().assembly.assemble();
        assert_eq!(object.bytecode, again.bytecode);
    }
}
