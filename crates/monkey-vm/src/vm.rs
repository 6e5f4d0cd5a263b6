//! The stack machine: fetch-decode-execute over a `Bytecode`'s flat
//! instruction stream, with a frame stack for calls, a flat value stack,
//! and a globals slice addressed by index instead of by name.

use std::rc::Rc;

use indexmap::IndexMap;
use monkey_code::{Bytecode, Opcode, Value};

use crate::error::VmError;
use crate::frame::Frame;

const STACK_SIZE: usize = 2048;
const GLOBALS_SIZE: usize = 65536;
const MAX_FRAMES: usize = 1024;

pub struct VM {
    constants: Vec<Value>,
    stack: Vec<Value>,
    /// One past the top of the stack; kept alongside `stack.len()` to
    /// mirror the data model's explicit stack-pointer bookkeeping rather
    /// than relying purely on `Vec::push`/`pop`.
    sp: usize,
    globals: Vec<Value>,
    frames: Vec<Frame>,
    last_popped: Value,
}

impl VM {
    pub fn new(bytecode: Bytecode) -> Self {
        let main_fn = Rc::new(monkey_code::CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        });
        let main_frame = Frame::new(main_fn, 0);
        let mut frames = Vec::with_capacity(MAX_FRAMES);
        frames.push(main_frame);

        Self {
            constants: bytecode.constants,
            stack: Vec::with_capacity(STACK_SIZE),
            sp: 0,
            globals: std::iter::repeat(Value::Null).take(GLOBALS_SIZE).collect(),
            frames,
            last_popped: Value::Null,
        }
    }

    /// Reuses an existing globals slice across REPL lines, matching the
    /// book's REPL convention of keeping bindings alive between inputs.
    pub fn with_globals(bytecode: Bytecode, globals: Vec<Value>) -> Self {
        let mut vm = Self::new(bytecode);
        vm.globals = globals;
        vm
    }

    pub fn take_globals(self) -> Vec<Value> {
        self.globals
    }

    pub fn run(&mut self) -> Result<Value, VmError> {
        while self.current_frame().ip < self.current_frame().instructions().len() as isize - 1 {
            self.current_frame_mut().ip += 1;
            let ip = self.current_frame().ip as usize;
            let byte = self.current_frame().instructions().0[ip];
            let op = Opcode::from_byte(byte).ok_or(VmError::UnknownOpcode(byte))?;

            match op {
                Opcode::Constant => {
                    let idx = self.read_u16(ip + 1);
                    self.advance_ip(2);
                    let constant = self.constants[idx as usize].clone();
                    self.push(constant)?;
                }
                Opcode::Pop => {
                    self.pop()?;
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    self.execute_binary_op(op)?;
                }
                Opcode::True => self.push(Value::Boolean(true))?,
                Opcode::False => self.push(Value::Boolean(false))?,
                Opcode::Equal | Opcode::NotEqual | Opcode::Greater => {
                    self.execute_comparison(op)?;
                }
                Opcode::Minus => {
                    let operand = self.pop()?;
                    match operand {
                        Value::Integer(i) => self.push(Value::Integer(-i))?,
                        other => {
                            return Err(VmError::UnknownOperator(format!(
                                "-{}",
                                other.type_name()
                            )))
                        }
                    }
                }
                Opcode::Bang => {
                    let operand = self.pop()?;
                    self.push(Value::Boolean(!operand.is_truthy()))?;
                }
                Opcode::JumpNotTruthy => {
                    let target = self.read_u16(ip + 1);
                    self.advance_ip(2);
                    let condition = self.pop()?;
                    if !condition.is_truthy() {
                        self.current_frame_mut().ip = target as isize - 1;
                    }
                }
                Opcode::Jump => {
                    let target = self.read_u16(ip + 1);
                    self.current_frame_mut().ip = target as isize - 1;
                }
                Opcode::Null => self.push(Value::Null)?,
                Opcode::GetGlobal => {
                    let idx = self.read_u16(ip + 1);
                    self.advance_ip(2);
                    self.push(self.globals[idx as usize].clone())?;
                }
                Opcode::SetGlobal => {
                    let idx = self.read_u16(ip + 1);
                    self.advance_ip(2);
                    let value = self.pop()?;
                    self.globals[idx as usize] = value;
                }
                Opcode::Array => {
                    let n = self.read_u16(ip + 1) as usize;
                    self.advance_ip(2);
                    let elements = self.stack[self.sp - n..self.sp].to_vec();
                    self.sp -= n;
                    self.stack.truncate(self.sp);
                    self.push(Value::Array(elements))?;
                }
                Opcode::Hash => {
                    let n = self.read_u16(ip + 1) as usize;
                    self.advance_ip(2);
                    let entries = self.stack[self.sp - n..self.sp].to_vec();
                    self.sp -= n;
                    self.stack.truncate(self.sp);
                    let mut pairs = IndexMap::new();
                    for chunk in entries.chunks_exact(2) {
                        let key = chunk[0].clone();
                        let value = chunk[1].clone();
                        let hash_key = key
                            .hash_key()
                            .ok_or_else(|| VmError::UnhashableKey(key.type_name().to_string()))?;
                        pairs.insert(hash_key, (key, value));
                    }
                    self.push(Value::Hash(pairs))?;
                }
                Opcode::Index => {
                    let index = self.pop()?;
                    let left = self.pop()?;
                    self.execute_index(left, index)?;
                }
                Opcode::Call => {
                    let argc = self.read_u16(ip + 1) as usize;
                    self.advance_ip(2);
                    self.call_function(argc)?;
                }
                Opcode::ReturnValue => {
                    let return_value = self.pop()?;
                    let frame = self.frames.pop().expect("return without a frame");
                    self.sp = frame.base_pointer - 1;
                    self.stack.truncate(self.sp);
                    self.push(return_value)?;
                }
                Opcode::Return => {
                    let frame = self.frames.pop().expect("return without a frame");
                    self.sp = frame.base_pointer - 1;
                    self.stack.truncate(self.sp);
                    self.push(Value::Null)?;
                }
                Opcode::GetLocal => {
                    let idx = self.read_u16(ip + 1) as usize;
                    self.advance_ip(2);
                    let base = self.current_frame().base_pointer;
                    self.push(self.stack[base + idx].clone())?;
                }
                Opcode::SetLocal => {
                    let idx = self.read_u16(ip + 1) as usize;
                    self.advance_ip(2);
                    let base = self.current_frame().base_pointer;
                    let value = self.pop()?;
                    self.stack[base + idx] = value;
                }
            }
        }
        Ok(self.last_popped.clone())
    }

    fn current_frame(&self) -> &Frame {
        self.frames.last().expect("VM always has a frame")
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("VM always has a frame")
    }

    fn advance_ip(&mut self, by: isize) {
        self.current_frame_mut().ip += by;
    }

    fn read_u16(&self, pos: usize) -> u16 {
        self.current_frame().instructions().read_u16(pos)
    }

    fn push(&mut self, value: Value) -> Result<(), VmError> {
        if self.sp >= STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        if self.sp == self.stack.len() {
            self.stack.push(value);
        } else {
            self.stack[self.sp] = value;
        }
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, VmError> {
        if self.sp == 0 {
            return Err(VmError::StackUnderflow);
        }
        self.sp -= 1;
        let value = self.stack[self.sp].clone();
        self.last_popped = value.clone();
        Ok(value)
    }

    fn execute_binary_op(&mut self, op: Opcode) -> Result<(), VmError> {
        let right = self.pop()?;
        let left = self.pop()?;
        match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => {
                let result = match op {
                    Opcode::Add => l.checked_add(*r),
                    Opcode::Sub => l.checked_sub(*r),
                    Opcode::Mul => l.checked_mul(*r),
                    Opcode::Div => {
                        if *r == 0 {
                            return Err(VmError::DivisionByZero);
                        }
                        l.checked_div(*r)
                    }
                    _ => unreachable!("execute_binary_op called with non-arithmetic opcode"),
                };
                let result = result.ok_or(VmError::IntegerOverflow)?;
                self.push(Value::Integer(result))
            }
            (Value::String(l), Value::String(r)) if op == Opcode::Add => {
                self.push(Value::String(format!("{l}{r}")))
            }
            (Value::String(_), Value::String(_)) => Err(VmError::UnknownOperator(format!(
                "{} {}",
                op.mnemonic(),
                "STRING"
            ))),
            _ => Err(VmError::TypeMismatch(format!(
                "{} {} {}",
                left.type_name(),
                op.mnemonic(),
                right.type_name()
            ))),
        }
    }

    fn execute_comparison(&mut self, op: Opcode) -> Result<(), VmError> {
        let right = self.pop()?;
        let left = self.pop()?;
        match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => {
                let result = match op {
                    Opcode::Equal => l == r,
                    Opcode::NotEqual => l != r,
                    Opcode::Greater => l > r,
                    _ => unreachable!("execute_comparison called with non-comparison opcode"),
                };
                self.push(Value::Boolean(result))
            }
            _ => match op {
                Opcode::Equal => self.push(Value::Boolean(left == right)),
                Opcode::NotEqual => self.push(Value::Boolean(left != right)),
                _ => Err(VmError::TypeMismatch(format!(
                    "{} {} {}",
                    left.type_name(),
                    op.mnemonic(),
                    right.type_name()
                ))),
            },
        }
    }

    fn execute_index(&mut self, left: Value, index: Value) -> Result<(), VmError> {
        match (&left, &index) {
            (Value::Array(elems), Value::Integer(i)) => {
                if *i < 0 || *i as usize >= elems.len() {
                    self.push(Value::Null)
                } else {
                    self.push(elems[*i as usize].clone())
                }
            }
            (Value::Hash(pairs), _) => {
                let key = index
                    .hash_key()
                    .ok_or_else(|| VmError::UnhashableKey(index.type_name().to_string()))?;
                match pairs.get(&key) {
                    Some((_, value)) => self.push(value.clone()),
                    None => self.push(Value::Null),
                }
            }
            _ => Err(VmError::UnsupportedIndex(left.type_name().to_string())),
        }
    }

    fn call_function(&mut self, argc: usize) -> Result<(), VmError> {
        let callee = self.stack[self.sp - 1 - argc].clone();
        match callee {
            Value::CompiledFunction(func) => {
                if argc != func.num_parameters {
                    return Err(VmError::ArityMismatch {
                        want: func.num_parameters,
                        got: argc,
                    });
                }
                if self.frames.len() >= MAX_FRAMES {
                    return Err(VmError::StackOverflow);
                }
                let base_pointer = self.sp - argc;
                let frame = Frame::new(func.clone(), base_pointer);
                self.frames.push(frame);
                self.sp = base_pointer + func.num_locals;
                if self.sp > self.stack.len() {
                    self.stack.resize(self.sp, Value::Null);
                } else {
                    for slot in &mut self.stack[base_pointer + argc..self.sp] {
                        *slot = Value::Null;
                    }
                }
                Ok(())
            }
            _ => Err(VmError::NotCallable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monkey_compiler::compile;
    use monkey_par::parse;

    fn run(source: &str) -> Value {
        let (program, errors) = parse(source, "test.mo");
        assert!(errors.is_empty(), "parse errors: {errors:?}");
        let bytecode = compile(&program).expect("compile error");
        let mut vm = VM::new(bytecode);
        vm.run().expect("vm error")
    }

    #[test]
    fn integer_arithmetic() {
        assert_eq!(run("(5 + 10 * 2 + 15 / 3) * 2 + -10"), Value::Integer(50));
    }

    #[test]
    fn boolean_expressions_and_comparisons() {
        assert_eq!(run("1 < 2"), Value::Boolean(true));
        assert_eq!(run("1 == 1"), Value::Boolean(true));
        assert_eq!(run("(1 < 2) == true"), Value::Boolean(true));
    }

    #[test]
    fn conditionals() {
        assert_eq!(run("if (1 > 2) { 10 } else { 20 }"), Value::Integer(20));
        assert_eq!(run("if (false) { 10 }"), Value::Null);
    }

    #[test]
    fn global_let_statements() {
        assert_eq!(run("let one = 1; let two = 2; one + two"), Value::Integer(3));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(
            run(r#""mon" + "key""#),
            Value::String("monkey".to_string())
        );
    }

    #[test]
    fn array_and_hash_literals() {
        assert_eq!(
            run("[1, 2, 3][1]"),
            Value::Integer(2)
        );
        assert_eq!(run("{\"one\": 1}[\"one\"]"), Value::Integer(1));
        assert_eq!(run("{\"one\": 1}[\"missing\"]"), Value::Null);
        assert_eq!(run("[1, 2, 3][3]"), Value::Null);
        assert_eq!(run("[1, 2, 3][-1]"), Value::Null);
    }

    #[test]
    fn calling_functions_with_bindings_and_arguments() {
        assert_eq!(
            run("let add = fn(x, y) { x + y }; add(5 + 5, add(5, 5));"),
            Value::Integer(20)
        );
        assert_eq!(
            run(
                "let first = 10; let second = 10; let third = 10; \
                 let ourFunction = fn(first) { let second = 20; first + second; }; \
                 ourFunction(20) + first + second + third;"
            ),
            Value::Integer(70)
        );
    }

    #[test]
    fn division_by_zero_is_a_fatal_error() {
        let (program, errors) = parse("10 / 0", "test.mo");
        assert!(errors.is_empty());
        let bytecode = compile(&program).expect("compile error");
        let mut vm = VM::new(bytecode);
        assert_eq!(vm.run(), Err(VmError::DivisionByZero));
    }

    #[test]
    fn calling_a_non_function_is_a_fatal_error() {
        let (program, errors) = parse("let notAFunction = 1; notAFunction();", "test.mo");
        assert!(errors.is_empty());
        let bytecode = compile(&program).expect("compile error");
        let mut vm = VM::new(bytecode);
        assert_eq!(vm.run(), Err(VmError::NotCallable));
    }

    #[test]
    fn wrong_arity_is_a_fatal_error() {
        let (program, errors) = parse("let f = fn(a) { a }; f(1, 2);", "test.mo");
        assert!(errors.is_empty());
        let bytecode = compile(&program).expect("compile error");
        let mut vm = VM::new(bytecode);
        assert_eq!(vm.run(), Err(VmError::ArityMismatch { want: 1, got: 2 }));
    }

    #[test]
    fn integer_overflow_is_a_fatal_error_not_a_panic() {
        let (program, errors) = parse("9223372036854775807 + 1", "test.mo");
        assert!(errors.is_empty());
        let bytecode = compile(&program).expect("compile error");
        let mut vm = VM::new(bytecode);
        assert_eq!(vm.run(), Err(VmError::IntegerOverflow));
    }

    #[test]
    fn let_bound_function_can_recurse_through_its_own_name() {
        assert_eq!(
            run("let fact = fn(n) { if (n < 2) { 1 } else { n * fact(n - 1) } }; fact(5);"),
            Value::Integer(120)
        );
    }
}
