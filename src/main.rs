use std::env;
use std::fs;
use std::io::{stdin, stdout, BufRead, BufReader, Write};

use anyhow::{Context, Result};

use ophid::parser::{parse, WriteErrorReporter};
use ophid::runtime::{stock_interpreter, Interpreter, Value};
use ophid::scanner::Scanner;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    match args.as_slice() {
        [_] => repl(),
        [_, script_path] => {
            let script = fs::read_to_string(script_path)
                .with_context(|| format!("Unable to read script file {}", script_path))?;
            run(&mut stock_interpreter(), &script, false);
            Ok(())
        }
        _ => {
            eprintln!("Usage: ophid [script]");
            std::process::exit(64);
        }
    }
}

fn repl() -> Result<()> {
    let mut reader = BufReader::new(stdin().lock());
    let mut interpreter = stock_interpreter();
    let mut line = String::new();
    loop {
        print!(">>> ");
        stdout().flush()?;
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed == "exit" || trimmed == "quit" {
            break;
        }
        run(&mut interpreter, &line, true);
    }
    Ok(())
}

fn run(interpreter: &mut Interpreter, code: &str, in_repl: bool) {
    let mut stderr = std::io::stderr().lock();
    let mut reporter = WriteErrorReporter::new(&mut stderr);
    match parse(&mut reporter, Scanner::new(code)) {
        Ok(program) => {
            let result = interpreter.interpret(&program);
            // Failures were isolated node by node; surface them afterwards
            for diagnostic in interpreter.take_diagnostics() {
                eprintln!("{}", diagnostic);
            }
            if in_repl && result != Value::None {
                println!("{}", result);
            }
        }
        Err(error) => eprintln!("{}", error),
    }
}
