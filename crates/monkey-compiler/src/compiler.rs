//! AST → bytecode. One compiled program is a constant pool plus a flat
//! instruction stream; compiling a function literal recurses into a fresh
//! `CompilationScope`/`SymbolTable` pair and folds the result back in as a
//! `CompiledFunction` constant.
//!
//! The current-scope-as-cursor shape here (push a scope, emit into
//! whichever one is current, pop it back off when done) mirrors the
//! current-block bookkeeping used elsewhere in this pipeline for
//! structured, nested code generation, generalized from basic blocks to a
//! flat instruction buffer.

use monkey_code::{Bytecode, CompiledFunction, Instructions, Opcode, Value};
use monkey_par::{Expression, Program, Statement};
use std::rc::Rc;

use crate::error::CompileError;
use crate::symbol_table::{Scope, SymbolTable};

#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

pub struct Compiler {
    constants: Vec<Value>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            constants: Vec::new(),
            symbol_table: SymbolTable::new(),
            scopes: vec![CompilationScope::default()],
        }
    }

    pub fn compile(program: &Program) -> Result<Bytecode, CompileError> {
        let mut compiler = Self::new();
        for stmt in &program.statements {
            compiler.compile_statement(stmt)?;
        }
        Ok(compiler.into_bytecode())
    }

    fn into_bytecode(mut self) -> Bytecode {
        let instructions = std::mem::take(&mut self.current_scope_mut().instructions);
        Bytecode {
            instructions,
            constants: self.constants,
        }
    }

    fn current_scope(&self) -> &CompilationScope {
        self.scopes.last().expect("compiler always has a scope")
    }

    fn current_scope_mut(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("compiler always has a scope")
    }

    fn emit(&mut self, op: Opcode, operands: &[u16]) -> usize {
        let scope = self.current_scope_mut();
        let position = scope.instructions.push(op, operands);
        scope.previous_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction { opcode: op, position });
        position
    }

    fn last_instruction_is(&self, op: Opcode) -> bool {
        self.current_scope()
            .last_instruction
            .is_some_and(|emitted| emitted.opcode == op)
    }

    /// Drops the trailing `OpPop` an expression-statement just emitted,
    /// used when that expression is the tail of an `if` branch or a
    /// function body and its value needs to stay on the stack instead.
    fn remove_last_pop(&mut self) {
        let scope = self.current_scope_mut();
        if let Some(last) = scope.last_instruction {
            scope.instructions.truncate(last.position);
            scope.last_instruction = scope.previous_instruction;
        }
    }

    fn replace_last_pop_with_return(&mut self) {
        let scope = self.current_scope();
        if let Some(last) = scope.last_instruction {
            let pos = last.position;
            self.current_scope_mut()
                .instructions
                .replace(pos, Opcode::ReturnValue, &[]);
            self.current_scope_mut().last_instruction = Some(EmittedInstruction {
                opcode: Opcode::ReturnValue,
                position: pos,
            });
        }
    }

    fn change_operand(&mut self, pos: usize, operand: u16) {
        let op = self
            .current_scope()
            .instructions
            .opcode_at(pos)
            .expect("patched position must hold a real instruction");
        self.current_scope_mut().instructions.replace(pos, op, &[operand]);
    }

    fn add_constant(&mut self, value: Value) -> u16 {
        self.constants.push(value);
        (self.constants.len() - 1) as u16
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        let table = std::mem::replace(&mut self.symbol_table, SymbolTable::new());
        self.symbol_table = table.push();
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self.scopes.pop().expect("leave_scope without enter_scope");
        let table = std::mem::replace(&mut self.symbol_table, SymbolTable::new());
        self.symbol_table = table.pop();
        scope.instructions
    }

    fn compile_statement(&mut self, stmt: &Statement) -> Result<(), CompileError> {
        match stmt {
            Statement::Let(let_stmt) => {
                // Defined before compiling the RHS so a function literal's
                // own body can resolve its binding's name, matching the
                // evaluator's closure-over-a-shared-environment recursion.
                let symbol = self.symbol_table.define(let_stmt.name.value.clone());
                self.compile_expression(&let_stmt.value)?;
                match symbol.scope {
                    Scope::Global => self.emit(Opcode::SetGlobal, &[symbol.index as u16]),
                    Scope::Local => self.emit(Opcode::SetLocal, &[symbol.index as u16]),
                };
                Ok(())
            }
            Statement::Return(ret_stmt) => {
                self.compile_expression(&ret_stmt.value)?;
                self.emit(Opcode::ReturnValue, &[]);
                Ok(())
            }
            Statement::Expression(expr_stmt) => {
                self.compile_expression(&expr_stmt.expression)?;
                self.emit(Opcode::Pop, &[]);
                Ok(())
            }
            Statement::Block(block) => {
                for stmt in &block.statements {
                    self.compile_statement(stmt)?;
                }
                Ok(())
            }
        }
    }

    fn compile_expression(&mut self, expr: &Expression) -> Result<(), CompileError> {
        match expr {
            Expression::Integer(lit) => {
                let idx = self.add_constant(Value::Integer(lit.value));
                self.emit(Opcode::Constant, &[idx]);
                Ok(())
            }
            Expression::String(lit) => {
                let idx = self.add_constant(Value::String(lit.value.clone()));
                self.emit(Opcode::Constant, &[idx]);
                Ok(())
            }
            Expression::Boolean(lit) => {
                self.emit(if lit.value { Opcode::True } else { Opcode::False }, &[]);
                Ok(())
            }
            Expression::Prefix(pre) => {
                self.compile_expression(&pre.right)?;
                match pre.operator.as_str() {
                    "!" => self.emit(Opcode::Bang, &[]),
                    "-" => self.emit(Opcode::Minus, &[]),
                    other => return Err(CompileError::UnknownOperator(other.to_string())),
                };
                Ok(())
            }
            Expression::Infix(inf) => {
                if inf.operator == "<" {
                    self.compile_expression(&inf.right)?;
                    self.compile_expression(&inf.left)?;
                    self.emit(Opcode::Greater, &[]);
                    return Ok(());
                }
                self.compile_expression(&inf.left)?;
                self.compile_expression(&inf.right)?;
                match inf.operator.as_str() {
                    "+" => self.emit(Opcode::Add, &[]),
                    "-" => self.emit(Opcode::Sub, &[]),
                    "*" => self.emit(Opcode::Mul, &[]),
                    "/" => self.emit(Opcode::Div, &[]),
                    ">" => self.emit(Opcode::Greater, &[]),
                    "==" => self.emit(Opcode::Equal, &[]),
                    "!=" => self.emit(Opcode::NotEqual, &[]),
                    other => return Err(CompileError::UnknownOperator(other.to_string())),
                };
                Ok(())
            }
            Expression::Identifier(ident) => {
                let symbol = self
                    .symbol_table
                    .resolve(&ident.value)
                    .ok_or_else(|| CompileError::UnknownIdentifier(ident.value.clone()))?;
                match symbol.scope {
                    Scope::Global => self.emit(Opcode::GetGlobal, &[symbol.index as u16]),
                    Scope::Local => self.emit(Opcode::GetLocal, &[symbol.index as u16]),
                };
                Ok(())
            }
            Expression::Array(lit) => {
                for elem in &lit.elements {
                    self.compile_expression(elem)?;
                }
                self.emit(Opcode::Array, &[lit.elements.len() as u16]);
                Ok(())
            }
            Expression::Hash(lit) => {
                for (key, value) in &lit.pairs {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Opcode::Hash, &[(lit.pairs.len() * 2) as u16]);
                Ok(())
            }
            Expression::Index(idx) => {
                self.compile_expression(&idx.left)?;
                self.compile_expression(&idx.index)?;
                self.emit(Opcode::Index, &[]);
                Ok(())
            }
            Expression::If(if_expr) => {
                self.compile_expression(&if_expr.condition)?;
                let jump_not_truthy_pos = self.emit(Opcode::JumpNotTruthy, &[0xFFFF]);

                for stmt in &if_expr.consequence.statements {
                    self.compile_statement(stmt)?;
                }
                if self.last_instruction_is(Opcode::Pop) {
                    self.remove_last_pop();
                }

                let jump_pos = self.emit(Opcode::Jump, &[0xFFFF]);
                let after_consequence = self.current_scope().instructions.len();
                self.change_operand(jump_not_truthy_pos + 1, after_consequence as u16);

                match &if_expr.alternative {
                    Some(alt) => {
                        for stmt in &alt.statements {
                            self.compile_statement(stmt)?;
                        }
                        if self.last_instruction_is(Opcode::Pop) {
                            self.remove_last_pop();
                        }
                    }
                    None => {
                        self.emit(Opcode::Null, &[]);
                    }
                }
                let after_alternative = self.current_scope().instructions.len();
                self.change_operand(jump_pos + 1, after_alternative as u16);
                Ok(())
            }
            Expression::Function(func) => {
                self.enter_scope();
                for param in &func.parameters {
                    self.symbol_table.define(param.value.clone());
                }
                for stmt in &func.body.statements {
                    self.compile_statement(stmt)?;
                }
                if self.last_instruction_is(Opcode::Pop) {
                    self.replace_last_pop_with_return();
                }
                if !self.last_instruction_is(Opcode::ReturnValue) {
                    self.emit(Opcode::Return, &[]);
                }
                let num_locals = self.symbol_table.num_definitions();
                let instructions = self.leave_scope();
                let compiled = Value::CompiledFunction(Rc::new(CompiledFunction {
                    instructions,
                    num_locals,
                    num_parameters: func.parameters.len(),
                }));
                let idx = self.add_constant(compiled);
                self.emit(Opcode::Constant, &[idx]);
                Ok(())
            }
            Expression::Call(call) => {
                self.compile_expression(&call.function)?;
                for arg in &call.arguments {
                    self.compile_expression(arg)?;
                }
                self.emit(Opcode::Call, &[call.arguments.len() as u16]);
                Ok(())
            }
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

pub fn compile(program: &Program) -> Result<Bytecode, CompileError> {
    Compiler::compile(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use monkey_code::Opcode as Op;
    use monkey_par::parse;

    fn compiled(source: &str) -> Bytecode {
        let (program, errors) = parse(source, "test.mo");
        assert!(errors.is_empty(), "parse errors: {errors:?}");
        compile(&program).expect("compile error")
    }

    fn expect_ops(instructions: &Instructions, expected: &[Op]) {
        let mut pos = 0;
        let mut seen = Vec::new();
        while pos < instructions.len() {
            let op = instructions.opcode_at(pos).expect("valid opcode");
            seen.push(op);
            pos += op.instruction_width();
        }
        assert_eq!(seen, expected);
    }

    #[test]
    fn integer_arithmetic_emits_constants_and_add() {
        let bytecode = compiled("1 + 2");
        expect_ops(
            &bytecode.instructions,
            &[Op::Constant, Op::Constant, Op::Add, Op::Pop],
        );
        assert_eq!(bytecode.constants, vec![Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn less_than_is_rewritten_to_greater_with_swapped_operands() {
        let bytecode = compiled("1 < 2");
        expect_ops(
            &bytecode.instructions,
            &[Op::Constant, Op::Constant, Op::Greater, Op::Pop],
        );
        // operands are swapped: constant[0] is 2 (compiled first), constant[1] is 1
        assert_eq!(bytecode.constants, vec![Value::Integer(2), Value::Integer(1)]);
    }

    #[test]
    fn if_without_else_compiles_a_null_alternative() {
        let bytecode = compiled("if (true) { 10 }; 3333;");
        expect_ops(
            &bytecode.instructions,
            &[
                Op::True,
                Op::JumpNotTruthy,
                Op::Constant,
                Op::Jump,
                Op::Null,
                Op::Pop,
                Op::Constant,
                Op::Pop,
            ],
        );
    }

    #[test]
    fn global_let_and_identifier_resolve() {
        let bytecode = compiled("let one = 1; one;");
        expect_ops(
            &bytecode.instructions,
            &[Op::Constant, Op::SetGlobal, Op::GetGlobal, Op::Pop],
        );
    }

    #[test]
    fn function_body_with_trailing_expression_returns_value() {
        let bytecode = compiled("fn() { 5 + 10 }");
        assert_eq!(bytecode.constants.len(), 3);
        match &bytecode.constants[2] {
            Value::CompiledFunction(func) => {
                expect_ops(&func.instructions, &[Op::Constant, Op::Constant, Op::Add, Op::ReturnValue]);
            }
            other => panic!("expected compiled function, got {other:?}"),
        }
    }

    #[test]
    fn function_with_no_explicit_return_emits_op_return() {
        let bytecode = compiled("fn() { }");
        match &bytecode.constants[0] {
            Value::CompiledFunction(func) => {
                expect_ops(&func.instructions, &[Op::Return]);
            }
            other => panic!("expected compiled function, got {other:?}"),
        }
    }

    #[test]
    fn local_bindings_use_local_opcodes() {
        let bytecode = compiled("fn() { let num = 55; num; }");
        match &bytecode.constants[1] {
            Value::CompiledFunction(func) => {
                expect_ops(
                    &func.instructions,
                    &[Op::Constant, Op::SetLocal, Op::GetLocal, Op::ReturnValue],
                );
                assert_eq!(func.num_locals, 1);
            }
            other => panic!("expected compiled function, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_identifier_is_a_compile_error() {
        let (program, errors) = parse("foobar;", "test.mo");
        assert!(errors.is_empty());
        assert_eq!(
            compile(&program),
            Err(CompileError::UnknownIdentifier("foobar".to_string()))
        );
    }

    #[test]
    fn call_with_arguments_emits_op_call_with_argc() {
        let bytecode = compiled("let f = fn(a, b) { a + b }; f(1, 2);");
        expect_ops(
            &bytecode.instructions,
            &[
                Op::Constant,
                Op::SetGlobal,
                Op::GetGlobal,
                Op::Constant,
                Op::Constant,
                Op::Call,
                Op::Pop,
            ],
        );
    }

    #[test]
    fn let_bound_function_can_resolve_its_own_name_for_recursion() {
        let bytecode = compiled("let fact = fn(n) { if (n < 2) { 1 } else { n * fact(n - 1) } };");
        assert_eq!(bytecode.constants.len(), 4);
        match &bytecode.constants[3] {
            Value::CompiledFunction(func) => {
                // The recursive call resolves `fact` as OpGetGlobal rather
                // than failing to compile with UnknownIdentifier.
                expect_ops(
                    &func.instructions,
                    &[
                        Op::Constant,
                        Op::GetLocal,
                        Op::Greater,
                        Op::JumpNotTruthy,
                        Op::Constant,
                        Op::Jump,
                        Op::GetLocal,
                        Op::GetGlobal,
                        Op::Constant,
                        Op::GetLocal,
                        Op::Sub,
                        Op::Call,
                        Op::Mul,
                        Op::ReturnValue,
                    ],
                );
            }
            other => panic!("expected compiled function, got {other:?}"),
        }
    }
}
