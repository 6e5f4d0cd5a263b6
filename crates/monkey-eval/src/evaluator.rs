//! Tree-walking evaluator: walks the AST directly, producing a [`Value`]
//! for a [`Program`] given an outer [`Environment`].
//!
//! Recursion here is genuinely structural (an `If` evaluates its condition
//! by recursing into `eval_expression`, a nested call recurses into
//! `eval_block_statement`, and so on), so a pathologically deep expression
//! or an unbounded recursive Monkey function could exhaust the host stack.
//! `MAX_DEPTH` turns that into an ordinary `Error` Value instead.

use std::rc::Rc;

use monkey_par::{
    BlockStatement, Expression, Identifier, Program, Statement,
};

use crate::builtins;
use crate::environment::Environment;
use crate::value::Value;

/// Upper bound on nested `eval_*` calls. Deep enough for any reasonable
/// Monkey program, shallow enough to return before the host stack itself
/// overflows.
const MAX_DEPTH: usize = 1_000;

/// Evaluates a whole program in a fresh top-level environment.
pub fn eval(program: &Program, env: Rc<Environment>) -> Value {
    eval_program(program, env, 0)
}

fn depth_guard(depth: usize) -> Option<Value> {
    if depth > MAX_DEPTH {
        Some(Value::Error("stack overflow: recursion too deep".to_string()))
    } else {
        None
    }
}

fn eval_program(program: &Program, env: Rc<Environment>, depth: usize) -> Value {
    if let Some(err) = depth_guard(depth) {
        return err;
    }
    let mut result = Value::Null;
    for stmt in &program.statements {
        result = eval_statement(stmt, env.clone(), depth + 1);
        match result {
            Value::ReturnValue(inner) => return *inner,
            Value::Error(ref msg) => {
                log::debug!("evaluation halted: {msg}");
                return result;
            }
            _ => {}
        }
    }
    result
}

/// Like [`eval_program`] but leaves `ReturnValue` wrapped so it propagates
/// up through nested blocks until a function call or the program boundary
/// unwraps it.
fn eval_block_statement(block: &BlockStatement, env: Rc<Environment>, depth: usize) -> Value {
    if let Some(err) = depth_guard(depth) {
        return err;
    }
    let mut result = Value::Null;
    for stmt in &block.statements {
        result = eval_statement(stmt, env.clone(), depth + 1);
        if matches!(result, Value::ReturnValue(_) | Value::Error(_)) {
            return result;
        }
    }
    result
}

fn eval_statement(stmt: &Statement, env: Rc<Environment>, depth: usize) -> Value {
    if let Some(err) = depth_guard(depth) {
        return err;
    }
    match stmt {
        Statement::Let(let_stmt) => {
            let value = eval_expression(&let_stmt.value, env.clone(), depth + 1);
            if value.is_error() {
                return value;
            }
            env.set(let_stmt.name.value.clone(), value.clone());
            value
        }
        Statement::Return(ret_stmt) => {
            let value = eval_expression(&ret_stmt.value, env, depth + 1);
            if value.is_error() {
                return value;
            }
            Value::ReturnValue(Box::new(value))
        }
        Statement::Expression(expr_stmt) => {
            eval_expression(&expr_stmt.expression, env, depth + 1)
        }
        Statement::Block(block) => eval_block_statement(block, env, depth + 1),
    }
}

fn eval_expression(expr: &Expression, env: Rc<Environment>, depth: usize) -> Value {
    if let Some(err) = depth_guard(depth) {
        return err;
    }
    match expr {
        Expression::Integer(lit) => Value::Integer(lit.value),
        Expression::Boolean(lit) => Value::Boolean(lit.value),
        Expression::String(lit) => Value::String(lit.value.clone()),
        Expression::Identifier(ident) => eval_identifier(ident, env),
        Expression::Array(lit) => {
            let elements = match eval_expressions(&lit.elements, env, depth + 1) {
                Ok(values) => values,
                Err(err) => return err,
            };
            Value::Array(elements)
        }
        Expression::Hash(lit) => eval_hash_literal(lit, env, depth + 1),
        Expression::Prefix(pre) => {
            let right = eval_expression(&pre.right, env, depth + 1);
            if right.is_error() {
                return right;
            }
            eval_prefix_expression(&pre.operator, right)
        }
        Expression::Infix(inf) => {
            let left = eval_expression(&inf.left, env.clone(), depth + 1);
            if left.is_error() {
                return left;
            }
            let right = eval_expression(&inf.right, env, depth + 1);
            if right.is_error() {
                return right;
            }
            eval_infix_expression(&inf.operator, left, right)
        }
        Expression::If(if_expr) => {
            let condition = eval_expression(&if_expr.condition, env.clone(), depth + 1);
            if condition.is_error() {
                return condition;
            }
            if condition.is_truthy() {
                eval_block_statement(&if_expr.consequence, env, depth + 1)
            } else if let Some(alt) = &if_expr.alternative {
                eval_block_statement(alt, env, depth + 1)
            } else {
                Value::Null
            }
        }
        Expression::Function(func) => Value::Function(crate::value::Function {
            parameters: func.parameters.clone(),
            body: func.body.clone(),
            env,
            name: func.name.clone(),
        }),
        Expression::Call(call) => {
            let function = eval_expression(&call.function, env.clone(), depth + 1);
            if function.is_error() {
                return function;
            }
            let args = match eval_expressions(&call.arguments, env, depth + 1) {
                Ok(values) => values,
                Err(err) => return err,
            };
            apply_function(function, args, depth + 1)
        }
        Expression::Index(idx) => {
            let left = eval_expression(&idx.left, env.clone(), depth + 1);
            if left.is_error() {
                return left;
            }
            let index = eval_expression(&idx.index, env, depth + 1);
            if index.is_error() {
                return index;
            }
            eval_index_expression(left, index)
        }
    }
}

fn eval_expressions(
    exprs: &[Expression],
    env: Rc<Environment>,
    depth: usize,
) -> Result<Vec<Value>, Value> {
    let mut values = Vec::with_capacity(exprs.len());
    for expr in exprs {
        let value = eval_expression(expr, env.clone(), depth);
        if value.is_error() {
            return Err(value);
        }
        values.push(value);
    }
    Ok(values)
}

fn eval_identifier(ident: &Identifier, env: Rc<Environment>) -> Value {
    if let Some(value) = env.get(&ident.value) {
        return value;
    }
    if let Some(builtin) = builtins::lookup(&ident.value) {
        return builtin;
    }
    Value::Error(format!("identifier not found: {}", ident.value))
}

fn eval_prefix_expression(operator: &str, right: Value) -> Value {
    match operator {
        "!" => Value::Boolean(!right.is_truthy()),
        "-" => match right {
            Value::Integer(i) => Value::Integer(-i),
            other => Value::Error(format!("unknown operator: -{}", other.type_name())),
        },
        other => Value::Error(format!("unknown operator: {other}{}", right.type_name())),
    }
}

fn eval_infix_expression(operator: &str, left: Value, right: Value) -> Value {
    match (&left, &right) {
        (Value::Integer(l), Value::Integer(r)) => eval_integer_infix(operator, *l, *r),
        (Value::String(l), Value::String(r)) => eval_string_infix(operator, l, r),
        _ if operator == "==" => Value::Boolean(left == right),
        _ if operator == "!=" => Value::Boolean(left != right),
        _ if std::mem::discriminant(&left) != std::mem::discriminant(&right) => Value::Error(
            format!(
                "type mismatch: {} {operator} {}",
                left.type_name(),
                right.type_name()
            ),
        ),
        _ => Value::Error(format!(
            "unknown operator: {} {operator} {}",
            left.type_name(),
            right.type_name()
        )),
    }
}

fn eval_integer_infix(operator: &str, left: i64, right: i64) -> Value {
    match operator {
        "+" => checked_integer(left.checked_add(right)),
        "-" => checked_integer(left.checked_sub(right)),
        "*" => checked_integer(left.checked_mul(right)),
        "/" => {
            if right == 0 {
                Value::Error("division by zero".to_string())
            } else {
                Value::Integer(left / right)
            }
        }
        "<" => Value::Boolean(left < right),
        ">" => Value::Boolean(left > right),
        "==" => Value::Boolean(left == right),
        "!=" => Value::Boolean(left != right),
        other => Value::Error(format!("unknown operator: INTEGER {other} INTEGER")),
    }
}

fn checked_integer(result: Option<i64>) -> Value {
    match result {
        Some(i) => Value::Integer(i),
        None => Value::Error("integer overflow".to_string()),
    }
}

fn eval_string_infix(operator: &str, left: &str, right: &str) -> Value {
    match operator {
        "+" => Value::String(format!("{left}{right}")),
        other => Value::Error(format!("unknown operator: STRING {other} STRING")),
    }
}

fn eval_hash_literal(
    lit: &monkey_par::HashLiteral,
    env: Rc<Environment>,
    depth: usize,
) -> Value {
    let mut pairs = indexmap::IndexMap::new();
    for (key_expr, value_expr) in &lit.pairs {
        let key = eval_expression(key_expr, env.clone(), depth);
        if key.is_error() {
            return key;
        }
        let value = eval_expression(value_expr, env.clone(), depth);
        if value.is_error() {
            return value;
        }
        let hash_key = match key.hash_key() {
            Some(hk) => hk,
            None => {
                return Value::Error(format!("unusable as hash key: {}", key.type_name()))
            }
        };
        pairs.insert(hash_key, (key, value));
    }
    Value::Hash(pairs)
}

fn eval_index_expression(left: Value, index: Value) -> Value {
    match (&left, &index) {
        (Value::Array(elems), Value::Integer(i)) => {
            if *i < 0 || *i as usize >= elems.len() {
                Value::Null
            } else {
                elems[*i as usize].clone()
            }
        }
        (Value::Hash(pairs), _) => {
            let key = match index.hash_key() {
                Some(hk) => hk,
                None => {
                    return Value::Error(format!(
                        "unusable as hash key: {}",
                        index.type_name()
                    ))
                }
            };
            match pairs.get(&key) {
                Some((_, value)) => value.clone(),
                None => Value::Null,
            }
        }
        _ => Value::Error(format!("index operator not supported: {}", left.type_name())),
    }
}

fn apply_function(function: Value, args: Vec<Value>, depth: usize) -> Value {
    match function {
        Value::Function(func) => {
            if args.len() != func.parameters.len() {
                return Value::Error(format!(
                    "wrong number of arguments. got={}, want={}",
                    args.len(),
                    func.parameters.len()
                ));
            }
            let call_env = Environment::enclosed(func.env.clone());
            for (param, arg) in func.parameters.iter().zip(args) {
                call_env.set(param.value.clone(), arg);
            }
            let result = eval_block_statement(&func.body, call_env, depth + 1);
            match result {
                Value::ReturnValue(inner) => *inner,
                other => other,
            }
        }
        Value::Builtin(f) => (f.0)(&args),
        other => Value::Error(format!("not a function: {}", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monkey_par::parse;

    fn eval_source(source: &str) -> Value {
        let (program, errors) = parse(source, "test.mo");
        assert!(errors.is_empty(), "parse errors: {errors:?}");
        eval(&program, Environment::new())
    }

    #[test]
    fn integer_arithmetic() {
        assert_eq!(eval_source("5 + 5 * 2 - 10 / 2"), Value::Integer(15));
    }

    #[test]
    fn boolean_expressions() {
        assert_eq!(eval_source("1 < 2 == true"), Value::Boolean(true));
    }

    #[test]
    fn bang_operator() {
        assert_eq!(eval_source("!true"), Value::Boolean(false));
        assert_eq!(eval_source("!!null"), Value::Boolean(false));
        assert_eq!(eval_source("!5"), Value::Boolean(false));
    }

    #[test]
    fn if_else_expressions() {
        assert_eq!(eval_source("if (false) { 10 }"), Value::Null);
        assert_eq!(eval_source("if (1 < 2) { 10 } else { 20 }"), Value::Integer(10));
    }

    #[test]
    fn return_statements_stop_the_program() {
        assert_eq!(
            eval_source("if (10 > 1) { if (10 > 1) { return 10; } return 1; }"),
            Value::Integer(10)
        );
    }

    #[test]
    fn error_handling() {
        assert_eq!(
            eval_source("5 + true;"),
            Value::Error("type mismatch: INTEGER + BOOLEAN".to_string())
        );
        assert_eq!(
            eval_source("-true"),
            Value::Error("unknown operator: -BOOLEAN".to_string())
        );
        assert_eq!(
            eval_source("foobar"),
            Value::Error("identifier not found: foobar".to_string())
        );
    }

    #[test]
    fn division_by_zero_is_an_error_value() {
        assert_eq!(
            eval_source("10 / 0"),
            Value::Error("division by zero".to_string())
        );
    }

    #[test]
    fn integer_overflow_is_an_error_value_not_a_panic() {
        assert_eq!(
            eval_source("9223372036854775807 + 1"),
            Value::Error("integer overflow".to_string())
        );
        assert_eq!(
            eval_source("-9223372036854775807 - 2"),
            Value::Error("integer overflow".to_string())
        );
    }

    #[test]
    fn let_statements() {
        assert_eq!(eval_source("let a = 5; a;"), Value::Integer(5));
        assert_eq!(eval_source("let a = 5 * 5; a;"), Value::Integer(25));
    }

    #[test]
    fn function_application_and_closures() {
        assert_eq!(eval_source("let identity = fn(x) { x; }; identity(5);"), Value::Integer(5));
        assert_eq!(
            eval_source(
                "let newAdder = fn(x) { fn(y) { x + y }; }; let addTwo = newAdder(2); addTwo(3);"
            ),
            Value::Integer(5)
        );
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(
            eval_source(r#""Hello" + " " + "World!""#),
            Value::String("Hello World!".to_string())
        );
    }

    #[test]
    fn builtin_len() {
        assert_eq!(eval_source(r#"len("hello")"#), Value::Integer(5));
        assert_eq!(eval_source("len([1, 2, 3])"), Value::Integer(3));
        assert!(matches!(eval_source("len(1)"), Value::Error(_)));
    }

    #[test]
    fn array_indexing() {
        assert_eq!(eval_source("[1, 2, 3][0]"), Value::Integer(1));
        assert_eq!(eval_source("[1, 2, 3][3]"), Value::Null);
        assert_eq!(eval_source("[1, 2, 3][-1]"), Value::Null);
    }

    #[test]
    fn hash_literals_and_indexing() {
        assert_eq!(
            eval_source(r#"let two = "two"; {"one": 1, two: 2, "thr" + "ee": 3}["two"]"#),
            Value::Integer(2)
        );
        assert_eq!(eval_source(r#"{"foo": 5}["bar"]"#), Value::Null);
    }

    #[test]
    fn recursive_function_within_depth_limit() {
        assert_eq!(
            eval_source(
                "let counter = fn(x) { if (x > 10) { return x; } counter(x + 1); }; counter(0);"
            ),
            Value::Integer(11)
        );
    }
}
