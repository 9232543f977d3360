use std::io::Write;
use std::rc::Rc;

use ordered_float::OrderedFloat;
use thiserror::Error;

use crate::ast::*;
use crate::scanner::Data;
use crate::scanner::Keyword;
use crate::scanner::Pos;
use crate::scanner::Scanner;
use crate::scanner::Symbol;
use crate::scanner::Token;

// Public error type that is returned from the API
#[derive(Error, Debug)]
#[error("parse error")]
pub struct Error {}

// For unwinding, we don't actually care that much about the internal cause which is reported through the reporter
#[derive(Error, Debug)]
#[error("internal parse error")]
struct ParsePanic {}

pub trait ErrorReporter {
    fn report(&mut self, pos: Pos, message: &str);
}

pub struct NoopReporter;

impl ErrorReporter for NoopReporter {
    fn report(&mut self, _pos: Pos, _message: &str) {}
}

pub struct WriteErrorReporter<'w, W>
where
    W: Write,
{
    // Store this as a mut reference so we can't accidentally lose something like stderr().lock() inside the reporter
    // that doesn't go out of scope and cause a deadlock
    write: &'w mut W,
}

impl<'w, W> WriteErrorReporter<'w, W>
where
    W: Write,
{
    pub fn new(write: &'w mut W) -> WriteErrorReporter<'w, W> {
        WriteErrorReporter { write }
    }
}

impl<'w, W> ErrorReporter for WriteErrorReporter<'w, W>
where
    W: Write,
{
    fn report(&mut self, pos: Pos, message: &str) {
        // If we can't write to our output: 🤷🏻‍♂️
        _ = writeln!(self.write, "error at {}: {}", pos, message);
    }
}

/// Track whether or not an error actually occurred and delegate to another error reporter
/// This is only meant to be used internally so that parse can piggy back on whether an error actually occurred
struct StateTrackingReporter<'a, Reporter> {
    reporter: &'a mut Reporter,
    errored: bool,
}

impl<'a, Reporter> ErrorReporter for StateTrackingReporter<'a, Reporter>
where
    Reporter: ErrorReporter,
{
    fn report(&mut self, pos: Pos, message: &str) {
        self.errored = true;
        self.reporter.report(pos, message);
    }
}

pub fn parse<'src, Reporter>(
    reporter: &mut Reporter,
    mut scanner: Scanner<'src>,
) -> Result<Program, Error>
where
    Reporter: ErrorReporter,
{
    let mut reporter = StateTrackingReporter {
        reporter,
        errored: false,
    };
    if let Ok(program) = program(&mut reporter, &mut scanner) {
        expect_eof(&mut reporter, &mut scanner);
        if reporter.errored {
            Err(Error {})
        } else {
            Ok(program)
        }
    } else {
        Err(Error {})
    }
}

fn expect_eof<'src, Reporter>(reporter: &mut Reporter, scanner: &mut Scanner<'src>)
where
    Reporter: ErrorReporter,
{
    match scanner.next() {
        // This is the success case so do nothing
        Ok(Token {
            data: Data::Eof,
            pos: _,
        }) => {}
        Ok(Token { data: _, pos }) => {
            reporter.report(pos, "expected eof");
        }
        Err(err) => {
            reporter.report(err.pos, "expected eof");
        }
    }
}

fn program<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Program, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let mut stmts = Vec::<Stmt>::new();
    while !scanner.is_at_eof() {
        // Leftover line breaks, usually after synchronize
        if scanner.next_if(|data| *data == Data::Newline).is_some() {
            continue;
        }
        match statement(reporter, scanner) {
            Ok(mut parsed) => stmts.append(&mut parsed),
            Err(_) => synchronize(scanner),
        }
    }
    Ok(Program(stmts))
}

fn synchronize(scanner: &mut Scanner) {
    // Consume tokens until we have consumed the end of the logical line
    // Avoid consuming EOF since we can abort there
    loop {
        let next = scanner.peek();
        match next {
            Ok(token) if token.data == Data::Newline || token.data == Data::Dedent => {
                _ = scanner.next();
                break;
            }
            Ok(token) if token.data == Data::Eof => {
                // Leave the EOF inplace
                break;
            }
            _ => {
                // Consume the token we saw
                _ = scanner.next();
            }
        }
    }
}

/// A statement production is a list: one compound statement, or every
/// `;`-separated simple statement on a logical line.
fn statement<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Vec<Stmt>, ParsePanic>
where
    Reporter: ErrorReporter,
{
    if let Some(token) = scanner.next_if(|data| *data == Keyword::If) {
        Ok(vec![if_stmt(reporter, scanner, token.pos)?])
    } else if let Some(token) = scanner.next_if(|data| *data == Keyword::While) {
        Ok(vec![while_stmt(reporter, scanner, token.pos)?])
    } else if let Some(token) = scanner.next_if(|data| *data == Keyword::For) {
        Ok(vec![for_stmt(reporter, scanner, token.pos)?])
    } else if let Some(token) = scanner.next_if(|data| *data == Keyword::Def) {
        Ok(vec![def_stmt(reporter, scanner, token.pos)?])
    } else {
        simple_line(reporter, scanner)
    }
}

fn if_stmt<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
    pos: Pos,
) -> Result<Stmt, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let test = expr(reporter, scanner)?;
    if let Err(pos) = expect_next_symbol(scanner, Symbol::Colon) {
        reporter.report(pos, "expected ':' after condition");
        return Err(ParsePanic {});
    }
    let then = suite(reporter, scanner)?;
    let or_else = if let Some(token) = scanner.next_if(|data| *data == Keyword::Elif) {
        // elif folds into a nested if in the else slot
        Some(vec![if_stmt(reporter, scanner, token.pos)?])
    } else if scanner.next_if(|data| *data == Keyword::Else).is_some() {
        if let Err(pos) = expect_next_symbol(scanner, Symbol::Colon) {
            reporter.report(pos, "expected ':' after else");
            return Err(ParsePanic {});
        }
        Some(suite(reporter, scanner)?)
    } else {
        None
    };
    Ok(Stmt {
        pos,
        inner: StmtInner::If {
            test,
            then,
            or_else,
        },
    })
}

fn while_stmt<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
    pos: Pos,
) -> Result<Stmt, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let test = expr(reporter, scanner)?;
    if let Err(pos) = expect_next_symbol(scanner, Symbol::Colon) {
        reporter.report(pos, "expected ':' after condition");
        return Err(ParsePanic {});
    }
    let body = suite(reporter, scanner)?;
    Ok(Stmt {
        pos,
        inner: StmtInner::While { test, body },
    })
}

fn for_stmt<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
    pos: Pos,
) -> Result<Stmt, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let target = expect_identifier(reporter, scanner)?.to_string();
    if scanner.next_if(|data| *data == Keyword::In).is_none() {
        reporter.report(scanner.peek_pos(), "expected 'in' after loop variable");
        return Err(ParsePanic {});
    }
    let iter = expr(reporter, scanner)?;
    if let Err(pos) = expect_next_symbol(scanner, Symbol::Colon) {
        reporter.report(pos, "expected ':' after iterable");
        return Err(ParsePanic {});
    }
    let body = suite(reporter, scanner)?;
    Ok(Stmt {
        pos,
        inner: StmtInner::For { target, iter, body },
    })
}

fn def_stmt<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
    pos: Pos,
) -> Result<Stmt, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let name = expect_identifier(reporter, scanner)?.to_string();
    if let Err(pos) = expect_next_symbol(scanner, Symbol::LeftParen) {
        reporter.report(pos, "expected '(' after function name");
        return Err(ParsePanic {});
    }

    let mut parameters = Vec::new();
    if scanner
        .next_if(|next| *next == Symbol::RightParen)
        .is_none()
    {
        comma_separated_identifiers(&mut parameters, reporter, scanner)?;
        if let Err(pos) = expect_next_symbol(scanner, Symbol::RightParen) {
            reporter.report(pos, "expect ')' after parameter list");
            return Err(ParsePanic {});
        }
    }
    if let Err(pos) = expect_next_symbol(scanner, Symbol::Colon) {
        reporter.report(pos, "expected ':' after function signature");
        return Err(ParsePanic {});
    }
    let body = suite(reporter, scanner)?;
    Ok(Stmt {
        pos,
        inner: StmtInner::FunctionDef(Rc::new(FunDecl {
            name,
            parameters,
            body,
        })),
    })
}

// NEWLINE INDENT statement+ DEDENT
fn suite<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Vec<Stmt>, ParsePanic>
where
    Reporter: ErrorReporter,
{
    if scanner.next_if(|data| *data == Data::Newline).is_none() {
        reporter.report(scanner.peek_pos(), "expected a newline before a block");
        return Err(ParsePanic {});
    }
    if scanner.next_if(|data| *data == Data::Indent).is_none() {
        reporter.report(scanner.peek_pos(), "expected an indented block");
        return Err(ParsePanic {});
    }
    let mut stmts = Vec::new();
    while scanner.next_if(|data| *data == Data::Dedent).is_none() {
        if scanner.is_at_eof() {
            reporter.report(scanner.peek_pos(), "unexpected end of input in a block");
            return Err(ParsePanic {});
        }
        if scanner.next_if(|data| *data == Data::Newline).is_some() {
            continue;
        }
        let mut parsed = statement(reporter, scanner)?;
        stmts.append(&mut parsed);
    }
    Ok(stmts)
}

fn simple_line<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Vec<Stmt>, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let mut stmts = vec![simple_stmt(reporter, scanner)?];
    while scanner.next_if(|data| *data == Symbol::Semicolon).is_some() {
        if at_line_end(scanner) {
            // Trailing semicolon
            break;
        }
        stmts.push(simple_stmt(reporter, scanner)?);
    }
    if scanner.next_if(|data| *data == Data::Newline).is_some() || scanner.is_at_eof() {
        Ok(stmts)
    } else {
        reporter.report(scanner.peek_pos(), "expected a newline after statement");
        Err(ParsePanic {})
    }
}

fn at_line_end(scanner: &mut Scanner) -> bool {
    matches!(
        scanner.peek(),
        Ok(token) if token.data == Data::Newline || token.data == Data::Eof
    )
}

fn simple_stmt<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Stmt, ParsePanic>
where
    Reporter: ErrorReporter,
{
    if let Some(token) = scanner.next_if(|data| *data == Keyword::Return) {
        let value = if at_line_end(scanner)
            || matches!(scanner.peek(), Ok(t) if t.data == Symbol::Semicolon)
        {
            None
        } else {
            Some(expr_list(reporter, scanner)?)
        };
        return Ok(Stmt {
            pos: token.pos,
            inner: StmtInner::Return(value),
        });
    }

    let first = expr_list(reporter, scanner)?;
    let pos = first.pos;
    if scanner.next_if(|data| *data == Symbol::Equal).is_some() {
        // a = b = expr: everything before the last '=' is a target; target
        // validity is the evaluator's problem, which keeps parsing permissive
        // the way the original tree consumers were
        let mut targets = vec![first];
        let mut value = expr_list(reporter, scanner)?;
        while scanner.next_if(|data| *data == Symbol::Equal).is_some() {
            targets.push(value);
            value = expr_list(reporter, scanner)?;
        }
        Ok(Stmt {
            pos,
            inner: StmtInner::Assign { targets, value },
        })
    } else if let Some(op) = scanner.next_if_some(augmented_op) {
        let value = expr_list(reporter, scanner)?;
        Ok(Stmt {
            pos,
            inner: StmtInner::AugAssign {
                target: first,
                op,
                value,
            },
        })
    } else {
        Ok(Stmt {
            pos,
            inner: StmtInner::Expr(first),
        })
    }
}

fn augmented_op(data: &Data) -> Option<BinOp> {
    match data {
        Data::Symbol(Symbol::PlusEqual) => Some(BinOp::Add),
        Data::Symbol(Symbol::MinusEqual) => Some(BinOp::Sub),
        Data::Symbol(Symbol::StarEqual) => Some(BinOp::Mul),
        Data::Symbol(Symbol::SlashEqual) => Some(BinOp::Div),
        Data::Symbol(Symbol::DoubleSlashEqual) => Some(BinOp::FloorDiv),
        Data::Symbol(Symbol::PercentEqual) => Some(BinOp::Mod),
        Data::Symbol(Symbol::DoubleStarEqual) => Some(BinOp::Pow),
        _ => None,
    }
}

/// expr (',' expr)* [',']. A bare comma list becomes a tuple, which is how
/// `a = 1, 2` and the (unassignable) `a, b = ...` arrive at the evaluator
fn expr_list<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let first = expr(reporter, scanner)?;
    if !matches!(scanner.peek(), Ok(token) if token.data == Symbol::Comma) {
        return Ok(first);
    }
    let pos = first.pos;
    let mut items = vec![first];
    while scanner.next_if(|data| *data == Symbol::Comma).is_some() {
        if !starts_expression(scanner) {
            break;
        }
        items.push(expr(reporter, scanner)?);
    }
    Ok(Expr {
        pos,
        inner: ExprInner::Tuple(items),
    })
}

fn starts_expression(scanner: &mut Scanner) -> bool {
    matches!(scanner.peek(), Ok(token) if match &token.data {
        Data::Int(_) | Data::Float(_) | Data::Str(_) | Data::Identifier(_) => true,
        Data::Keyword(Keyword::True | Keyword::False | Keyword::None | Keyword::Not) => true,
        Data::Symbol(
            Symbol::LeftParen
            | Symbol::LeftBracket
            | Symbol::LeftBrace
            | Symbol::Minus
            | Symbol::Plus,
        ) => true,
        _ => false,
    })
}

fn expr<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    or_expr(reporter, scanner)
}

fn or_expr<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    variadic_bool_op(reporter, scanner, Keyword::Or, BoolOp::Or, and_expr)
}

fn and_expr<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    variadic_bool_op(reporter, scanner, Keyword::And, BoolOp::And, not_expr)
}

// a or b or c collects into a single node so the evaluator sees the whole
// operand list at once
fn variadic_bool_op<'src, Reporter, F>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
    keyword: Keyword,
    op: BoolOp,
    higher_precedence: F,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
    F: Fn(&mut Reporter, &mut Scanner<'src>) -> Result<Expr, ParsePanic>,
{
    let first = higher_precedence(reporter, scanner)?;
    if !matches!(scanner.peek(), Ok(token) if token.data == keyword) {
        return Ok(first);
    }
    let pos = first.pos;
    let mut values = vec![first];
    while scanner.next_if(|data| *data == keyword).is_some() {
        values.push(higher_precedence(reporter, scanner)?);
    }
    Ok(Expr {
        pos,
        inner: ExprInner::Bool { op, values },
    })
}

fn not_expr<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    if let Some(token) = scanner.next_if(|data| *data == Keyword::Not) {
        let operand = not_expr(reporter, scanner)?;
        Ok(Expr {
            pos: token.pos,
            inner: ExprInner::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            },
        })
    } else {
        comparison(reporter, scanner)
    }
}

fn comparison_op(data: &Data) -> Option<CmpOp> {
    match data {
        Data::Symbol(Symbol::EqualEqual) => Some(CmpOp::Eq),
        Data::Symbol(Symbol::BangEqual) => Some(CmpOp::NotEq),
        Data::Symbol(Symbol::Less) => Some(CmpOp::Lt),
        Data::Symbol(Symbol::LessEqual) => Some(CmpOp::LtE),
        Data::Symbol(Symbol::Greater) => Some(CmpOp::Gt),
        Data::Symbol(Symbol::GreaterEqual) => Some(CmpOp::GtE),
        _ => None,
    }
}

// a < b < c keeps the whole chain on one node
fn comparison<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let left = term(reporter, scanner)?;
    let mut comparators = Vec::new();
    while let Some(op) = scanner.next_if_some(comparison_op) {
        comparators.push((op, term(reporter, scanner)?));
    }
    if comparators.is_empty() {
        Ok(left)
    } else {
        let pos = left.pos;
        Ok(Expr {
            pos,
            inner: ExprInner::Compare {
                left: Box::new(left),
                comparators,
            },
        })
    }
}

// This encapsulates the logic of the recursive parsing of levels of binary expression operators
// We define a table of matching symbols with their operators as well as a higher precedence parser
const TERM_SYMBOLS: [(Symbol, BinOp); 2] = [(Symbol::Plus, BinOp::Add), (Symbol::Minus, BinOp::Sub)];

const FACTOR_SYMBOLS: [(Symbol, BinOp); 4] = [
    (Symbol::Star, BinOp::Mul),
    (Symbol::Slash, BinOp::Div),
    (Symbol::DoubleSlash, BinOp::FloorDiv),
    (Symbol::Percent, BinOp::Mod),
];

fn left_recursive_binary_op<'src, Reporter, F>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
    table: &[(Symbol, BinOp)],
    higher_precedence: F,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
    F: Fn(&mut Reporter, &mut Scanner<'src>) -> Result<Expr, ParsePanic>,
{
    let mut expr = higher_precedence(reporter, scanner)?;
    while let Some(op) = scanner.next_if_some(|next| match next {
        Data::Symbol(symbol) => table
            .iter()
            .find(|(candidate, _)| candidate == symbol)
            .map(|(_, op)| *op),
        _ => None,
    }) {
        let right = Box::new(higher_precedence(reporter, scanner)?);
        let pos = expr.pos;
        expr = Expr {
            pos,
            inner: ExprInner::Binary {
                left: Box::new(expr),
                op,
                right,
            },
        };
    }
    Ok(expr)
}

fn term<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    left_recursive_binary_op(reporter, scanner, &TERM_SYMBOLS, factor)
}

fn factor<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    left_recursive_binary_op(reporter, scanner, &FACTOR_SYMBOLS, unary)
}

fn unary<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    if let Some(token) =
        scanner.next_if(|data| *data == Symbol::Minus || *data == Symbol::Plus)
    {
        let op = if token.data == Symbol::Minus {
            UnaryOp::Neg
        } else {
            UnaryOp::Pos
        };
        let operand = unary(reporter, scanner)?;
        Ok(Expr {
            pos: token.pos,
            inner: ExprInner::Unary {
                op,
                operand: Box::new(operand),
            },
        })
    } else {
        power(reporter, scanner)
    }
}

// ** binds tighter than a leading sign and associates to the right, so
// -2 ** 2 is -4 and 2 ** -1 parses
fn power<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let base = postfix(reporter, scanner)?;
    if scanner
        .next_if(|data| *data == Symbol::DoubleStar)
        .is_some()
    {
        let exponent = unary(reporter, scanner)?;
        let pos = base.pos;
        Ok(Expr {
            pos,
            inner: ExprInner::Binary {
                left: Box::new(base),
                op: BinOp::Pow,
                right: Box::new(exponent),
            },
        })
    } else {
        Ok(base)
    }
}

fn postfix<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let mut expr = primary(reporter, scanner)?;
    loop {
        if scanner.next_if(|next| *next == Symbol::LeftParen).is_some() {
            expr = finish_call(reporter, scanner, expr)?;
        } else if scanner
            .next_if(|next| *next == Symbol::LeftBracket)
            .is_some()
        {
            expr = finish_subscript(reporter, scanner, expr)?;
        } else if scanner.next_if(|next| *next == Symbol::Dot).is_some() {
            let name = expect_identifier(reporter, scanner)?;
            let pos = expr.pos;
            expr = Expr {
                pos,
                inner: ExprInner::Attribute {
                    object: Box::new(expr),
                    attr: name.to_string(),
                },
            };
        } else {
            break;
        }
    }
    Ok(expr)
}

fn finish_call<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
    callee: Expr,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let mut args = Vec::new();
    if scanner
        .next_if(|next| *next == Symbol::RightParen)
        .is_none()
    {
        loop {
            if args.len() >= 255 {
                reporter.report(scanner.peek_pos(), "too many function arguments");
            }
            args.push(expr(reporter, scanner)?);
            if scanner.next_if(|next| *next == Symbol::Comma).is_none() {
                break;
            }
        }
        // Note: we only need to consume the trailing ) if we didn't consume it in the no-args branch
        if let Err(pos) = expect_next_symbol(scanner, Symbol::RightParen) {
            reporter.report(pos, "expect ')' after arguments");
            return Err(ParsePanic {});
        }
    }
    let pos = callee.pos;
    Ok(Expr {
        pos,
        inner: ExprInner::Call {
            callee: Box::new(callee),
            arguments: args,
        },
    })
}

// Index or slice; every part of lower:upper:step may be missing
fn finish_subscript<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
    object: Expr,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let open_pos = scanner.peek_pos();
    let lower = if matches!(
        scanner.peek(),
        Ok(t) if t.data == Symbol::Colon || t.data == Symbol::RightBracket
    ) {
        None
    } else {
        Some(Box::new(expr(reporter, scanner)?))
    };
    let index = if scanner.next_if(|data| *data == Symbol::Colon).is_some() {
        let upper = if matches!(
            scanner.peek(),
            Ok(t) if t.data == Symbol::Colon || t.data == Symbol::RightBracket
        ) {
            None
        } else {
            Some(Box::new(expr(reporter, scanner)?))
        };
        let step = if scanner.next_if(|data| *data == Symbol::Colon).is_some() {
            if matches!(scanner.peek(), Ok(t) if t.data == Symbol::RightBracket) {
                None
            } else {
                Some(Box::new(expr(reporter, scanner)?))
            }
        } else {
            None
        };
        Expr {
            pos: open_pos,
            inner: ExprInner::Slice { lower, upper, step },
        }
    } else {
        match lower {
            Some(index) => *index,
            None => {
                reporter.report(open_pos, "expected an index or slice");
                return Err(ParsePanic {});
            }
        }
    };
    if let Err(pos) = expect_next_symbol(scanner, Symbol::RightBracket) {
        reporter.report(pos, "expected ']' after subscript");
        return Err(ParsePanic {});
    }
    let pos = object.pos;
    Ok(Expr {
        pos,
        inner: ExprInner::Subscript {
            object: Box::new(object),
            index: Box::new(index),
        },
    })
}

fn primary<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    match scanner.next() {
        Ok(token) => {
            let pos = token.pos;
            let inner = match token.data {
                Data::Keyword(Keyword::True) => ExprInner::Literal(Literal::Bool(true)),
                Data::Keyword(Keyword::False) => ExprInner::Literal(Literal::Bool(false)),
                Data::Keyword(Keyword::None) => ExprInner::Literal(Literal::None),
                Data::Int(number) => ExprInner::Literal(Literal::Int(number)),
                Data::Float(number) => {
                    ExprInner::Literal(Literal::Float(OrderedFloat(number)))
                }
                Data::Str(string) => ExprInner::Literal(Literal::Str(string)),
                Data::Identifier(ident) => ExprInner::Name(ident.to_string()),
                Data::Symbol(Symbol::LeftParen) => return finish_paren(reporter, scanner, pos),
                Data::Symbol(Symbol::LeftBracket) => {
                    return finish_list(reporter, scanner, pos)
                }
                Data::Symbol(Symbol::LeftBrace) => return finish_dict(reporter, scanner, pos),
                _ => {
                    reporter.report(
                        pos,
                        "unexpected token: expected a literal, a name or an opening delimiter",
                    );
                    return Err(ParsePanic {});
                }
            };
            Ok(Expr { pos, inner })
        }
        Err(scan_err) => {
            reporter.report(scan_err.pos, scan_err.error.message());
            Err(ParsePanic {})
        }
    }
}

// Group, tuple display or the empty tuple
fn finish_paren<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
    pos: Pos,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    if scanner
        .next_if(|next| *next == Symbol::RightParen)
        .is_some()
    {
        return Ok(Expr {
            pos,
            inner: ExprInner::Tuple(Vec::new()),
        });
    }
    let first = expr(reporter, scanner)?;
    let result = if matches!(scanner.peek(), Ok(t) if t.data == Symbol::Comma) {
        let mut items = vec![first];
        while scanner.next_if(|data| *data == Symbol::Comma).is_some() {
            if matches!(scanner.peek(), Ok(t) if t.data == Symbol::RightParen) {
                break;
            }
            items.push(expr(reporter, scanner)?);
        }
        Expr {
            pos,
            inner: ExprInner::Tuple(items),
        }
    } else {
        // Parentheses only affect grouping, there is no node for them
        first
    };
    if let Err(pos) = expect_next_symbol(scanner, Symbol::RightParen) {
        reporter.report(pos, "expected ')'");
        return Err(ParsePanic {});
    }
    Ok(result)
}

fn finish_list<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
    pos: Pos,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let mut items = Vec::new();
    if scanner
        .next_if(|next| *next == Symbol::RightBracket)
        .is_none()
    {
        loop {
            items.push(expr(reporter, scanner)?);
            if scanner.next_if(|data| *data == Symbol::Comma).is_none() {
                break;
            }
            if matches!(scanner.peek(), Ok(t) if t.data == Symbol::RightBracket) {
                break;
            }
        }
        if let Err(pos) = expect_next_symbol(scanner, Symbol::RightBracket) {
            reporter.report(pos, "expected ']' after list items");
            return Err(ParsePanic {});
        }
    }
    Ok(Expr {
        pos,
        inner: ExprInner::List(items),
    })
}

fn finish_dict<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
    pos: Pos,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let mut items = Vec::new();
    if scanner
        .next_if(|next| *next == Symbol::RightBrace)
        .is_none()
    {
        loop {
            let key = expr(reporter, scanner)?;
            if let Err(pos) = expect_next_symbol(scanner, Symbol::Colon) {
                reporter.report(pos, "expected ':' after dict key");
                return Err(ParsePanic {});
            }
            let value = expr(reporter, scanner)?;
            items.push((key, value));
            if scanner.next_if(|data| *data == Symbol::Comma).is_none() {
                break;
            }
            if matches!(scanner.peek(), Ok(t) if t.data == Symbol::RightBrace) {
                break;
            }
        }
        if let Err(pos) = expect_next_symbol(scanner, Symbol::RightBrace) {
            reporter.report(pos, "expected '}' after dict items");
            return Err(ParsePanic {});
        }
    }
    Ok(Expr {
        pos,
        inner: ExprInner::Dict(items),
    })
}

/// Expect that the next token from scanner is the given symbol
/// Returns the pos of the failed token (either due to error or mismatch) in Err
fn expect_next_symbol(scanner: &mut Scanner, symbol: Symbol) -> Result<(), Pos> {
    let next = scanner.next();
    match next {
        Ok(token) if token.data == symbol => Ok(()),
        Ok(token) => Err(token.pos),
        Err(err) => Err(err.pos),
    }
}

fn expect_identifier<'code, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'code>,
) -> Result<&'code str, ParsePanic>
where
    Reporter: ErrorReporter,
{
    match scanner.next() {
        Ok(Token {
            data: Data::Identifier(ident),
            pos: _,
        }) => Ok(ident),
        Ok(Token { data: _, pos }) => {
            reporter.report(pos, "expected identifier");
            Err(ParsePanic {})
        }
        Err(error) => {
            reporter.report(error.pos, "expected identifier");
            Err(ParsePanic {})
        }
    }
}

fn comma_separated_identifiers<'src, Reporter>(
    idents: &mut Vec<String>,
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<(), ParsePanic>
where
    Reporter: ErrorReporter,
{
    idents.push(expect_identifier(reporter, scanner)?.to_string());
    while scanner.next_if(|next| *next == Symbol::Comma).is_some() {
        idents.push(expect_identifier(reporter, scanner)?.to_string());
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scanner::Scanner;

    fn parse_ok(code: &str) -> Program {
        parse(&mut NoopReporter, Scanner::new(code)).unwrap()
    }

    #[test]
    fn test_parse_assignment_chain() {
        let program = parse_ok("a = b = 5\n");
        assert_eq!(1, program.0.len());
        match &program.0[0].inner {
            StmtInner::Assign { targets, value } => {
                assert_eq!(2, targets.len());
                assert_eq!(ExprInner::Literal(Literal::Int(5)), value.inner);
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_semicolon_separated_line() {
        let program = parse_ok("a = 10; b = 5; c = a + b * 2; c\n");
        assert_eq!(4, program.0.len());
    }

    #[test]
    fn test_comparison_chain_is_one_node() {
        let program = parse_ok("1 < x < 10\n");
        match &program.0[0].inner {
            StmtInner::Expr(Expr {
                inner: ExprInner::Compare { comparators, .. },
                ..
            }) => assert_eq!(2, comparators.len()),
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_bool_op_collects_operands() {
        let program = parse_ok("a or b or c\n");
        match &program.0[0].inner {
            StmtInner::Expr(Expr {
                inner: ExprInner::Bool { op, values },
                ..
            }) => {
                assert_eq!(BoolOp::Or, *op);
                assert_eq!(3, values.len());
            }
            other => panic!("expected boolean expression, got {:?}", other),
        }
    }

    #[test]
    fn test_fun_define() {
        let code = "def add(a, b):\n    z = a + b\n    return z\n\nadd(1, 2)\n";
        let program = parse_ok(code);
        assert_eq!(2, program.0.len());
        match &program.0[0].inner {
            StmtInner::FunctionDef(decl) => {
                assert_eq!("add", decl.name);
                assert_eq!(vec!["a".to_string(), "b".to_string()], decl.parameters);
                assert_eq!(2, decl.body.len());
            }
            other => panic!("expected def, got {:?}", other),
        }
    }

    #[test]
    fn test_elif_nests_into_else() {
        let code = "if a:\n    1\nelif b:\n    2\nelse:\n    3\n";
        let program = parse_ok(code);
        match &program.0[0].inner {
            StmtInner::If { or_else, .. } => {
                let nested = or_else.as_ref().unwrap();
                assert!(matches!(nested[0].inner, StmtInner::If { .. }));
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_slice_forms() {
        for code in ["a[:3]\n", "a[1:]\n", "a[::2]\n", "a[1:5:2]\n"] {
            let program = parse_ok(code);
            match &program.0[0].inner {
                StmtInner::Expr(Expr {
                    inner: ExprInner::Subscript { index, .. },
                    ..
                }) => assert!(
                    matches!(index.inner, ExprInner::Slice { .. }),
                    "{} should parse as a slice",
                    code
                ),
                other => panic!("expected subscript, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_augmented_assignment() {
        let program = parse_ok("counter += 1\n");
        match &program.0[0].inner {
            StmtInner::AugAssign { op, .. } => assert_eq!(BinOp::Add, *op),
            other => panic!("expected augmented assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_call_and_attribute() {
        let program = parse_ok("a.append(4)\n");
        match &program.0[0].inner {
            StmtInner::Expr(Expr {
                inner: ExprInner::Call { callee, arguments },
                ..
            }) => {
                assert_eq!(1, arguments.len());
                assert!(matches!(callee.inner, ExprInner::Attribute { .. }));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_error_does_not_abort_later_lines() {
        // The bad line is reported, parse returns Err, but doesn't panic or hang
        let result = parse(&mut NoopReporter, Scanner::new("a = \nb = 2\n"));
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_and_singleton_tuples() {
        let program = parse_ok("a = ()\nb = (1,)\n");
        match &program.0[0].inner {
            StmtInner::Assign { value, .. } => {
                assert_eq!(ExprInner::Tuple(Vec::new()), value.inner)
            }
            other => panic!("expected assignment, got {:?}", other),
        }
        match &program.0[1].inner {
            StmtInner::Assign { value, .. } => match &value.inner {
                ExprInner::Tuple(items) => assert_eq!(1, items.len()),
                other => panic!("expected tuple, got {:?}", other),
            },
            other => panic!("expected assignment, got {:?}", other),
        }
    }
}
