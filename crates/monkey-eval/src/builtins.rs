//! Host-provided functions, the "tiny builtin set" the language ships
//! instead of a standard library: `len` and `puts`.

use crate::value::{BuiltinFn, Value};

pub fn lookup(name: &str) -> Option<Value> {
    let f: std::rc::Rc<dyn Fn(&[Value]) -> Value> = match name {
        "len" => std::rc::Rc::new(len),
        "puts" => std::rc::Rc::new(puts),
        _ => return None,
    };
    Some(Value::Builtin(BuiltinFn(f)))
}

fn len(args: &[Value]) -> Value {
    if args.len() != 1 {
        return Value::Error(format!(
            "wrong number of arguments. got={}, want=1",
            args.len()
        ));
    }
    match &args[0] {
        Value::String(s) => Value::Integer(s.chars().count() as i64),
        Value::Array(elems) => Value::Integer(elems.len() as i64),
        other => Value::Error(format!("argument to `len` not supported, got {}", other.type_name())),
    }
}

fn puts(args: &[Value]) -> Value {
    for arg in args {
        println!("{arg}");
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_of_string_counts_chars() {
        let result = len(&[Value::String("hello".to_string())]);
        assert_eq!(result, Value::Integer(5));
    }

    #[test]
    fn len_of_array_counts_elements() {
        let result = len(&[Value::Array(vec![Value::Integer(1), Value::Integer(2)])]);
        assert_eq!(result, Value::Integer(2));
    }

    #[test]
    fn len_rejects_wrong_arity() {
        let result = len(&[]);
        assert!(matches!(result, Value::Error(_)));
    }

    #[test]
    fn len_rejects_unsupported_type() {
        let result = len(&[Value::Integer(1)]);
        assert!(matches!(result, Value::Error(_)));
    }

    #[test]
    fn unknown_builtin_is_none() {
        assert!(lookup("nope").is_none());
    }
}
