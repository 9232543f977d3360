mod common;

use common::eval;
use ophid::parser::{parse, NoopReporter};
use ophid::runtime::Value;
use ophid::scanner::Scanner;

#[test]
fn parses_a_realistic_program() {
    let code = "\
# Arithmetic and assignment
a = 10
b = 5
c = a + b * 2

# Loops and lists
nums = [1, 2, 3, 4, 5]
squares = []
for n in nums:
    squares.append(n ** 2)

# Conditionals
if c > 20:
    big = True
else:
    big = False

# Dictionary and tuple usage
person = {'name': 'bar', 'age': 25}
coords = (10, 20)

def add(x, y):
    z = x + y
    return z

result = add(2, 3)
";
    let program = parse(&mut NoopReporter, Scanner::new(code)).unwrap();
    assert_eq!(11, program.0.len());
}

#[test]
fn a_bad_line_fails_the_parse_without_hanging() {
    assert!(parse(&mut NoopReporter, Scanner::new("a = = 1\n")).is_err());
    assert!(parse(&mut NoopReporter, Scanner::new("if x\n    1\n")).is_err());
    assert!(parse(&mut NoopReporter, Scanner::new("def f(:\n    1\n")).is_err());
}

#[test]
fn blocks_require_indentation() {
    assert!(parse(&mut NoopReporter, Scanner::new("if x:\ny = 1\n")).is_err());
}

#[test]
fn parsed_programs_run_end_to_end() {
    // The front half of the pipeline feeds the back half
    assert_eq!(
        Value::Int(20),
        eval("a = 10\nb = 5\nc = a + b * 2\nc\n")
    );
}

#[test]
fn deeply_nested_blocks_parse() {
    let code = "\
def outer(n):
    total = 0
    for i in range(n):
        if i % 2 == 0:
            while total < 100:
                total += i + 1
                if total > 10:
                    break_me = total
                    total = 200
    return total
outer(3)
";
    assert!(parse(&mut NoopReporter, Scanner::new(code)).is_ok());
}
