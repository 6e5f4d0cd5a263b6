//! A single activation on the VM's call stack.
//!
//! `ip` starts at -1 and is pre-incremented on every dispatch (matching
//! the data model's convention) rather than post-incremented, so a freshly
//! pushed frame's first fetch lands on instruction 0.

use std::rc::Rc;

use monkey_code::{CompiledFunction, Instructions};

pub struct Frame {
    pub function: Rc<CompiledFunction>,
    pub ip: isize,
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(function: Rc<CompiledFunction>, base_pointer: usize) -> Self {
        Self {
            function,
            ip: -1,
            base_pointer,
        }
    }

    pub fn instructions(&self) -> &Instructions {
        &self.function.instructions
    }
}
