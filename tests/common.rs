use ophid::parser::{parse, NoopReporter};
use ophid::runtime::{stock_interpreter, Interpreter, Value};
use ophid::scanner::Scanner;

pub fn run(code: &str) -> (Value, Interpreter) {
    let program = parse(&mut NoopReporter, Scanner::new(code)).expect("program should parse");
    let mut interpreter = stock_interpreter();
    let value = interpreter.interpret(&program);
    (value, interpreter)
}

pub fn eval(code: &str) -> Value {
    run(code).0
}
