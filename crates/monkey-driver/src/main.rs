use std::path::PathBuf;
use std::process::ExitCode;

use monkey_driver::{build, is_source_path, repl, run_bytecode_file, run_source_file};

fn main() -> ExitCode {
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let result = match args.as_slice() {
        [] => repl(std::io::stdin().lock(), std::io::stdout().lock()).map_err(anyhow::Error::from),
        [cmd, input, output] if cmd == "build" => {
            build(&PathBuf::from(input), &PathBuf::from(output)).map_err(anyhow::Error::from)
        }
        [path] => {
            let path = PathBuf::from(path);
            if is_source_path(&path) {
                run_source_file(&path).map_err(anyhow::Error::from)
            } else {
                run_bytecode_file(&path).map_err(anyhow::Error::from)
            }
        }
        _ => Err(anyhow::anyhow!(
            "usage: monkey [FILE | build IN OUT] (no arguments starts the REPL)"
        )),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
