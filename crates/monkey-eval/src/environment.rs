//! Lexical environment chain for the tree-walking evaluator.
//!
//! Deliberately simple compared to the compiler's `SymbolTable`: no index
//! assignment, no scope-kind tagging, just a name→Value map with an outer
//! pointer. A closure captures `Rc<Environment>` so it keeps its defining
//! scope alive for as long as the closure itself is reachable.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

#[derive(Debug)]
pub struct Environment {
    store: RefCell<HashMap<String, Value>>,
    outer: Option<Rc<Environment>>,
}

impl Environment {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            store: RefCell::new(HashMap::new()),
            outer: None,
        })
    }

    /// A fresh environment enclosed by `outer`, used both for function
    /// calls (enclosing the captured closure environment) and for any
    /// nested block that needs its own bindings.
    pub fn enclosed(outer: Rc<Environment>) -> Rc<Self> {
        Rc::new(Self {
            store: RefCell::new(HashMap::new()),
            outer: Some(outer),
        })
    }

    /// Walks outward through enclosing environments until the name is
    /// found or the chain is exhausted.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.store.borrow().get(name) {
            return Some(value.clone());
        }
        self.outer.as_ref().and_then(|outer| outer.get(name))
    }

    /// Binds `name` in this environment only; never reaches through to an
    /// outer scope, matching `let`'s block-local semantics.
    pub fn set(&self, name: String, value: Value) {
        self.store.borrow_mut().insert(name, value);
    }
}
