//! Library facade over the Monkey pipeline, plus the `.mb` bytecode file
//! format.
//!
//! This crate is the one place that knows about all of `monkey-lex`,
//! `monkey-par`, `monkey-eval`, `monkey-code`, `monkey-compiler` and
//! `monkey-vm` at once; each of those stays independent of the others.
//! It owns the pieces the core pipeline explicitly leaves to an outer
//! layer: choosing REPL vs. source file vs. compiled bytecode, the REPL
//! line loop, and file I/O.

use std::io::{self, BufRead, Write};
use std::path::Path;

use monkey_code::Bytecode;
use monkey_compiler::CompileError;
use monkey_eval::Environment;
use monkey_par::{ParseError, Program};
use monkey_vm::VmError;
use std::rc::Rc;
use thiserror::Error;

/// Magic bytes at the front of every `.mb` file, ahead of the bincode
/// payload. Lets `run_path` tell a stray non-Monkey file apart from a
/// genuine bytecode file instead of handing bincode garbage to decode.
const BYTECODE_MAGIC: &[u8; 4] = b"MB01";

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("parse errors in {file}: {errors:?}")]
    Parse { file: String, errors: Vec<ParseError> },
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("vm error: {0}")]
    Vm(#[from] VmError),
    #[error("not a recognized .mb bytecode file (bad magic bytes)")]
    BadMagic,
    #[error("bytecode deserialization failed: {0}")]
    Deserialize(String),
}

/// Lexes `source`, returning tokens and accumulated lex errors wrapped as
/// parse errors (the same merge `monkey_par::parse` performs).
pub fn lex(source: &str, filename: &str) -> (Vec<monkey_lex::Token>, Vec<monkey_lex::LexError>) {
    monkey_lex::lex(source, Rc::from(filename))
}

/// Parses `source` straight to a `Program`, surfacing every lex and parse
/// error as a `ParseError`.
pub fn parse(source: &str, filename: &str) -> Result<Program, DriverError> {
    let (program, errors) = monkey_par::parse(source, filename);
    if errors.is_empty() {
        Ok(program)
    } else {
        Err(DriverError::Parse {
            file: filename.to_string(),
            errors,
        })
    }
}

/// Tree-walks `program` to completion in a fresh top-level environment.
pub fn evaluate(program: &Program) -> monkey_eval::Value {
    monkey_eval::eval(program, Environment::new())
}

/// Compiles `program` to `Bytecode`.
pub fn compile(program: &Program) -> Result<Bytecode, DriverError> {
    Ok(monkey_compiler::compile(program)?)
}

/// Runs already-compiled `bytecode`, returning the last value popped off
/// the VM's stack.
pub fn run(bytecode: Bytecode) -> Result<monkey_code::Value, DriverError> {
    let mut vm = monkey_vm::VM::new(bytecode);
    Ok(vm.run()?)
}

/// Serializes `bytecode` into the `.mb` wire format: four magic bytes
/// followed by a bincode encoding of the `Bytecode` struct.
pub fn encode_bytecode(bytecode: &Bytecode) -> Result<Vec<u8>, DriverError> {
    let mut out = BYTECODE_MAGIC.to_vec();
    let payload =
        bincode::serialize(bytecode).map_err(|e| DriverError::Deserialize(e.to_string()))?;
    out.extend(payload);
    Ok(out)
}

/// Reverses [`encode_bytecode`], rejecting input that doesn't start with
/// the expected magic bytes.
pub fn decode_bytecode(bytes: &[u8]) -> Result<Bytecode, DriverError> {
    let Some(payload) = bytes.strip_prefix(BYTECODE_MAGIC) else {
        return Err(DriverError::BadMagic);
    };
    bincode::deserialize(payload).map_err(|e| DriverError::Deserialize(e.to_string()))
}

/// True for the two extensions the core treats as Monkey source; every
/// other extension is assumed to be a compiled `.mb` file.
pub fn is_source_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("mo") | Some("monkey")
    )
}

/// `build IN OUT`: compile the source at `input` and write its bytecode
/// to `output` in `.mb` framing.
pub fn build(input: &Path, output: &Path) -> Result<(), DriverError> {
    let source = std::fs::read_to_string(input)?;
    let filename = input.to_string_lossy().to_string();
    let program = parse(&source, &filename)?;
    let bytecode = compile(&program)?;
    let encoded = encode_bytecode(&bytecode)?;
    std::fs::write(output, encoded)?;
    Ok(())
}

/// Source-extension argument: parse, evaluate, print the result.
pub fn run_source_file(path: &Path) -> Result<(), DriverError> {
    let source = std::fs::read_to_string(path)?;
    let filename = path.to_string_lossy().to_string();
    let program = parse(&source, &filename)?;
    let value = evaluate(&program);
    println!("{value}");
    Ok(())
}

/// Bytecode-argument path: decode, run on the VM, print the result.
pub fn run_bytecode_file(path: &Path) -> Result<(), DriverError> {
    let bytes = std::fs::read(path)?;
    let bytecode = decode_bytecode(&bytes)?;
    let value = run(bytecode)?;
    println!("{value}");
    Ok(())
}

/// The REPL line loop: reads one line at a time from `input`, evaluates
/// it against a persistent environment, and writes the result to
/// `output`. Parse/lex errors for a line are printed and don't end the
/// session, matching the book's "keep going" REPL behavior.
pub fn repl<R: BufRead, W: Write>(mut input: R, mut output: W) -> io::Result<()> {
    let env = Environment::new();
    let mut line = String::new();
    loop {
        write!(output, ">> ")?;
        output.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let (program, errors) = monkey_par::parse(&line, "repl");
        if !errors.is_empty() {
            for err in &errors {
                writeln!(output, "parse error: {} ({})", err.message, err.position)?;
            }
            continue;
        }
        let value = monkey_eval::eval(&program, env.clone());
        writeln!(output, "{value}")?;
    }
    Ok(())
}
