mod common;

use common::{eval, run};
use ophid::runtime::{RuntimeError, Value};

#[test]
fn arithmetic_precedence() {
    assert_eq!(Value::Int(20), eval("a = 10\nb = 5\nc = a + b * 2\nc\n"));
}

#[test]
fn true_division_yields_a_float() {
    assert_eq!(Value::Float(5.0), eval("x = 10\ny = x / 2\ny\n"));
}

#[test]
fn floor_division_yields_an_int() {
    assert_eq!(Value::Int(3), eval("x = 10\ny = x // 3\ny\n"));
}

#[test]
fn list_literal_append_and_readback() {
    let value = eval("a = [1, 2, 3]\na.append(4)\na\n");
    assert_eq!(
        Value::list(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
            Value::Int(4)
        ]),
        value
    );
}

#[test]
fn tuple_literal_subscript() {
    assert_eq!(Value::Int(1), eval("a = (1, 2, 3)\na[0]\n"));
}

#[test]
fn dict_literal_subscript() {
    assert_eq!(
        Value::string("value"),
        eval("d = {'key': 'value'}\nd['key']\n")
    );
}

#[test]
fn function_definition_and_call() {
    assert_eq!(
        Value::Int(25),
        eval("def square(x):\n    return x ** 2\nsquare(5)\n")
    );
}

#[test]
fn string_concatenation_in_a_function() {
    assert_eq!(
        Value::string("Hello, Alice"),
        eval("def greet(name):\n    return 'Hello, ' + name\ngreet('Alice')\n")
    );
}

#[test]
fn user_function_shadowing_a_builtin_name() {
    assert_eq!(
        Value::Int(5),
        eval("def add(x, y):\n    return x + y\nresult = add(2, 3)\nresult\n")
    );
}

#[test]
fn recursion() {
    let code = "def factorial(n):\n    if n == 0:\n        return 1\n    else:\n        return n * factorial(n - 1)\nfactorial(4)\n";
    assert_eq!(Value::Int(24), eval(code));
}

#[test]
fn division_by_zero_is_isolated() {
    let (value, interpreter) = run("a = 10\nb = 0\nc = a / b\nd = 7\nd\n");
    // The run carries on past the failure and the target holds None
    assert_eq!(Value::Int(7), value);
    assert_eq!(Value::None, interpreter.env().get("c"));
    assert_eq!(Value::Int(7), interpreter.env().get("d"));
    assert_eq!(1, interpreter.diagnostics().len());
    assert_eq!(
        RuntimeError::DivisionByZero,
        interpreter.diagnostics()[0].error
    );
}

#[test]
fn division_by_computed_zero_is_isolated_inside_calls() {
    let code = "def f(n):\n    return 10 / n\nr = f(0)\nr\n";
    let (value, interpreter) = run(code);
    assert_eq!(Value::None, value);
    assert_eq!(
        RuntimeError::DivisionByZero,
        interpreter.diagnostics()[0].error
    );
}

#[test]
fn boolean_operands_are_all_evaluated() {
    let code = "log = []\n\
                def t():\n    log.append(1)\n    return True\n\
                def f():\n    log.append(2)\n    return False\n\
                r = f() and t() or t()\n\
                len(log)\n";
    let (value, interpreter) = run(code);
    // Short-circuiting would have skipped the inner t(); here every operand
    // runs exactly once
    assert_eq!(Value::Int(3), value);
    assert!(interpreter.diagnostics().is_empty());
}

#[test]
fn boolean_fold_returns_the_deciding_operand() {
    assert_eq!(Value::string("a"), eval("'' or 'a'\n"));
    assert_eq!(Value::string(""), eval("'' and 'a'\n"));
}

#[test]
fn chained_comparators_are_evaluated_twice() {
    let code = "calls = []\n\
                def mid():\n    calls.append(1)\n    return 5\n\
                r = 1 < mid() < 10\n\
                len(calls)\n";
    let (value, interpreter) = run(code);
    assert_eq!(Value::Int(2), value);
    assert_eq!(Value::Bool(true), interpreter.env().get("r"));
}

#[test]
fn failed_chain_stops_evaluating_comparators() {
    let code = "calls = []\n\
                def mid():\n    calls.append(1)\n    return 5\n\
                r = 9 < 8 < mid()\n\
                len(calls)\n";
    let (value, interpreter) = run(code);
    assert_eq!(Value::Int(0), value);
    assert_eq!(Value::Bool(false), interpreter.env().get("r"));
}

#[test]
fn chain_that_fails_at_a_comparator_evaluates_it_once() {
    let code = "calls = []\n\
                def mid():\n    calls.append(1)\n    return 5\n\
                r = 7 < mid() < 10\n\
                len(calls)\n";
    let (value, _) = run(code);
    assert_eq!(Value::Int(1), value);
}

#[test]
fn chain_completion_yields_true() {
    assert_eq!(Value::Bool(true), eval("1 < 2 < 3\n"));
    assert_eq!(Value::Bool(false), eval("1 < 2 > 3\n"));
}

#[test]
fn nested_return_does_not_stop_the_loop_or_the_call() {
    let code = "def f():\n\
                \x20   i = 0\n\
                \x20   while i < 3:\n\
                \x20       if i == 1:\n\
                \x20           return 99\n\
                \x20       i = i + 1\n\
                \x20   return i\n\
                f()\n";
    // The nested return only supplies a value to its own if; the loop runs
    // to natural termination and the trailing return wins
    assert_eq!(Value::Int(3), eval(code));
}

#[test]
fn nested_return_inside_for_keeps_iterating() {
    let code = "runs = []\n\
                def g():\n\
                \x20   for x in [1, 2, 3]:\n\
                \x20       if x == 1:\n\
                \x20           return 99\n\
                \x20       runs.append(x)\n\
                \x20   return 'done'\n\
                g()\n";
    let (value, interpreter) = run(code);
    assert_eq!(Value::string("done"), value);
    // Even the rest of the first iteration runs: the nested return only
    // became the if's value
    assert_eq!(
        Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        interpreter.env().get("runs")
    );
}

#[test]
fn direct_return_ends_a_function_body() {
    let code = "def f():\n    return 1\n    return 2\nf()\n";
    assert_eq!(Value::Int(1), eval(code));
}

#[test]
fn while_loop_accumulates() {
    let code = "total = 0\ncounter = 0\nwhile counter < 5:\n    total += counter\n    counter += 1\ntotal\n";
    assert_eq!(Value::Int(10), eval(code));
}

#[test]
fn for_loop_over_a_list_of_squares() {
    let code = "nums = [1, 2, 3, 4, 5]\nsquares = []\nfor n in nums:\n    squares.append(n ** 2)\nsquares\n";
    assert_eq!(
        Value::list(vec![
            Value::Int(1),
            Value::Int(4),
            Value::Int(9),
            Value::Int(16),
            Value::Int(25)
        ]),
        eval(code)
    );
}

#[test]
fn for_loop_over_dict_keys() {
    let code = "total = 0\nd = {1: 'a', 2: 'b'}\nfor k in d:\n    total += k\ntotal\n";
    assert_eq!(Value::Int(3), eval(code));
}

#[test]
fn for_loop_over_a_string() {
    let code = "parts = []\nfor ch in 'abc':\n    parts.append(ch)\nparts\n";
    assert_eq!(
        Value::list(vec![
            Value::string("a"),
            Value::string("b"),
            Value::string("c")
        ]),
        eval(code)
    );
}

#[test]
fn calling_a_non_callable_is_a_reported_failure() {
    let (value, interpreter) = run("square = 5\nsquare(2)\n");
    assert_eq!(Value::None, value);
    assert_eq!(
        RuntimeError::NotCallable("int"),
        interpreter.diagnostics()[0].error
    );
}

#[test]
fn variadic_helpers() {
    assert_eq!(Value::Int(6), eval("add(1, 2, 3)\n"));
    assert_eq!(Value::Int(-5), eval("sub(5)\n"));
    assert_eq!(Value::Int(2), eval("sub(10, 5, 3)\n"));
    assert_eq!(Value::Int(24), eval("mul(2, 3, 4)\n"));
    assert_eq!(Value::Float(10.0), eval("div(100, 5, 2)\n"));
}

#[test]
fn variadic_helper_arity_failures_are_isolated() {
    let (value, interpreter) = run("r = add(1)\nr\n");
    assert_eq!(Value::None, value);
    assert!(matches!(
        interpreter.diagnostics()[0].error,
        RuntimeError::Arity { name: "add", .. }
    ));

    let (value, interpreter) = run("r = div(10, 0)\nafter = 1\nafter\n");
    assert_eq!(Value::Int(1), value);
    assert_eq!(
        RuntimeError::DivisionByZero,
        interpreter.diagnostics()[0].error
    );
}

#[test]
fn math_namespace() {
    assert_eq!(Value::Float(4.0), eval("math.sqrt(16)\n"));
    assert_eq!(Value::Bool(true), eval("3 < math.pi < 4\n"));
    assert_eq!(Value::Int(2), eval("math.floor(2.7)\n"));
}

#[test]
fn builtin_conversions_and_aggregates() {
    assert_eq!(Value::Int(5), eval("len('hello')\n"));
    assert_eq!(Value::Int(6), eval("sum([1, 2, 3])\n"));
    assert_eq!(Value::Int(10), eval("sum(range(5))\n"));
    assert_eq!(Value::Int(1), eval("min([3, 1, 2])\n"));
    assert_eq!(Value::Int(3), eval("max(1, 3, 2)\n"));
    assert_eq!(Value::string("10"), eval("str(10)\n"));
    assert_eq!(Value::Int(42), eval("int('42')\n"));
    assert_eq!(Value::Float(1.5), eval("float('1.5')\n"));
    assert_eq!(Value::Bool(true), eval("bool([0])\n"));
    assert_eq!(
        Value::list(vec![Value::Int(0), Value::Int(1), Value::Int(2)]),
        eval("list(range(3))\n")
    );
}

#[test]
fn missing_dict_key_is_isolated() {
    let (value, interpreter) = run("d = {'a': 1}\nx = d['nope']\ny = 2\ny\n");
    assert_eq!(Value::Int(2), value);
    assert_eq!(Value::None, interpreter.env().get("x"));
    assert!(matches!(
        interpreter.diagnostics()[0].error,
        RuntimeError::MissingKey(_)
    ));
}

#[test]
fn dict_methods() {
    assert_eq!(Value::Int(1), eval("d = {'a': 1}\nd.get('a')\n"));
    assert_eq!(Value::Int(9), eval("d = {'a': 1}\nd.get('b', 9)\n"));
    assert_eq!(Value::Int(2), eval("d = {'a': 1, 'b': 2}\nlen(d.keys())\n"));
}

#[test]
fn string_methods() {
    assert_eq!(Value::string("ABC"), eval("'abc'.upper()\n"));
    assert_eq!(Value::string("abc"), eval("'  abc  '.strip()\n"));
    assert_eq!(Value::Int(3), eval("len('a b c'.split())\n"));
}

#[test]
fn building_text_from_a_dict() {
    let code = "person = {'name': 'bar', 'age': 25}\n'Hello, ' + person['name'] + '!'\n";
    assert_eq!(Value::string("Hello, bar!"), eval(code));
}

#[test]
fn boolean_expression_over_dict_entries() {
    let code = "person = {'name': 'bar', 'age': 25}\nperson['age'] >= 18 and person['name'] != ''\n";
    assert_eq!(Value::Bool(true), eval(code));
}

#[test]
fn not_and_unary_signs() {
    assert_eq!(Value::Bool(false), eval("not True\n"));
    assert_eq!(Value::Bool(true), eval("not 0\n"));
    assert_eq!(Value::Int(-4), eval("-2 ** 2\n"));
    assert_eq!(Value::Float(0.5), eval("2 ** -1\n"));
}

#[test]
fn elif_chain() {
    let code = "def grade(n):\n\
                \x20   if n > 8:\n\
                \x20       return 'high'\n\
                \x20   elif n > 4:\n\
                \x20       return 'mid'\n\
                \x20   else:\n\
                \x20       return 'low'\n\
                grade(6)\n";
    assert_eq!(Value::string("mid"), eval(code));
}

#[test]
fn semicolon_separated_statements() {
    assert_eq!(Value::Int(20), eval("a = 10; b = 5; c = a + b * 2; c\n"));
}

#[test]
fn comments_and_blank_lines_are_ignored() {
    let code = "# setup\na = 1\n\n# bump it\na += 1\na\n";
    assert_eq!(Value::Int(2), eval(code));
}
