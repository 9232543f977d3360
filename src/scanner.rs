use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Pos {
    pub line: usize,
    pub offset_in_line: usize,
}

impl Display for Pos {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.offset_in_line)
    }
}

#[derive(Clone, Error, Debug, PartialEq, Eq)]
#[error("scan error: {error:?} {pos}")]
pub struct ScanError {
    pub error: ScanErrorType,
    pub pos: Pos,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanErrorType {
    UnterminatedString,
    UnrecognizedToken,
    InconsistentIndent,
}

impl ScanErrorType {
    pub fn message(&self) -> &'static str {
        match self {
            ScanErrorType::UnterminatedString => "unterminated string",
            ScanErrorType::UnrecognizedToken => "unrecognized token",
            ScanErrorType::InconsistentIndent => "inconsistent indentation",
        }
    }
}

/// A token in the input stream
/// Contains a data which is the symbol variant and a position
/// Note that pos is always defined, but in the case of EOF will describe a location
/// potentially off the end of the input stream
#[derive(Debug, PartialEq, Clone)]
pub struct Token<'code> {
    pub data: Data<'code>,
    pub pos: Pos,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Data<'code> {
    Symbol(Symbol),
    Keyword(Keyword),
    Identifier(&'code str),
    // Escapes are already processed, so the text is owned rather than a slice
    Str(String),
    Int(i64),
    Float(f64),
    // Logical line structure: one Newline per non-blank source line outside
    // brackets, Indent/Dedent as the leading whitespace grows and shrinks
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl<'code> PartialEq<Symbol> for Data<'code> {
    fn eq(&self, other: &Symbol) -> bool {
        matches!(self, Data::Symbol(symbol) if symbol == other)
    }
}

impl<'code> PartialEq<Keyword> for Data<'code> {
    fn eq(&self, other: &Keyword) -> bool {
        matches!(self, Data::Keyword(keyword) if keyword == other)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Symbol {
    // Single-character tokens.
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Colon,
    Dot,
    Semicolon,

    // Operators, including the augmented-assignment forms.
    Plus,
    PlusEqual,
    Minus,
    MinusEqual,
    Star,
    StarEqual,
    DoubleStar,
    DoubleStarEqual,
    Slash,
    SlashEqual,
    DoubleSlash,
    DoubleSlashEqual,
    Percent,
    PercentEqual,
    Equal,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    And,
    Def,
    Elif,
    Else,
    False,
    For,
    If,
    In,
    None,
    Not,
    Or,
    Return,
    True,
    While,
}

const KEYWORD_LITERAL_TO_SYMBOL: [(&str, Keyword); 14] = [
    ("and", Keyword::And),
    ("def", Keyword::Def),
    ("elif", Keyword::Elif),
    ("else", Keyword::Else),
    ("False", Keyword::False),
    ("for", Keyword::For),
    ("if", Keyword::If),
    ("in", Keyword::In),
    ("None", Keyword::None),
    ("not", Keyword::Not),
    ("or", Keyword::Or),
    ("return", Keyword::Return),
    ("True", Keyword::True),
    ("while", Keyword::While),
];

impl Display for Keyword {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone)]
pub struct Scanner<'lex> {
    code: &'lex str,
    code_iter: Peekable<CharIndices<'lex>>,
    // Indent/Dedent runs and the EOF wind-down are produced in batches
    pending: VecDeque<Token<'lex>>,
    peeked: Option<Result<Token<'lex>, ScanError>>,
    // Indentation widths of the enclosing blocks; never empty, base is 0
    indents: Vec<usize>,
    bracket_depth: usize,
    at_line_start: bool,
    line_has_tokens: bool,
    emitted_eof: bool,

    line: usize,
    offset_in_line: usize,
}

impl<'lex> Scanner<'lex> {
    pub fn new(code: &'lex str) -> Scanner<'lex> {
        Scanner {
            code,
            code_iter: code.char_indices().peekable(),
            pending: VecDeque::new(),
            peeked: None,
            indents: vec![0],
            bracket_depth: 0,
            at_line_start: true,
            line_has_tokens: false,
            emitted_eof: false,
            line: 0,
            offset_in_line: 0,
        }
    }

    /// Produce the next token. The stream never runs dry: after the input is
    /// exhausted a final Newline (if a line is open), the pending Dedents and
    /// then Eof forever.
    pub fn next(&mut self) -> Result<Token<'lex>, ScanError> {
        if let Some(token) = self.peeked.take() {
            return token;
        }
        self.advance()
    }

    pub fn peek(&mut self) -> Result<&Token<'lex>, ScanError> {
        if self.peeked.is_none() {
            let token = self.advance();
            self.peeked = Some(token);
        }
        match self.peeked.as_ref() {
            Some(Ok(token)) => Ok(token),
            Some(Err(err)) => Err(err.clone()),
            None => unreachable!("peek was filled above"),
        }
    }

    pub fn peek_pos(&mut self) -> Pos {
        match self.peek() {
            Ok(token) => token.pos,
            Err(err) => err.pos,
        }
    }

    pub fn next_if<F>(&mut self, predicate: F) -> Option<Token<'lex>>
    where
        F: FnOnce(&Data<'lex>) -> bool,
    {
        let matched = match self.peek() {
            Ok(token) => predicate(&token.data),
            Err(_) => false,
        };
        if matched {
            match self.peeked.take() {
                Some(Ok(token)) => Some(token),
                _ => None,
            }
        } else {
            None
        }
    }

    pub fn next_if_some<F, T>(&mut self, f: F) -> Option<T>
    where
        F: FnOnce(&Data<'lex>) -> Option<T>,
    {
        let result = match self.peek() {
            Ok(token) => f(&token.data),
            Err(_) => None,
        };
        if result.is_some() {
            self.peeked = None;
        }
        result
    }

    pub fn is_at_eof(&mut self) -> bool {
        matches!(self.peek(), Ok(token) if token.data == Data::Eof)
    }

    fn advance(&mut self) -> Result<Token<'lex>, ScanError> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(token);
            }
            if self.at_line_start && self.bracket_depth == 0 {
                self.measure_indentation()?;
                self.at_line_start = false;
                continue;
            }
            match self.scan_token()? {
                Some(token) => {
                    if !matches!(token.data, Data::Newline) {
                        self.line_has_tokens = true;
                    }
                    return Ok(token);
                }
                None => continue,
            }
        }
    }

    /// Consume the leading whitespace of the next non-blank line and queue
    /// the Indent/Dedent tokens implied by how it compares to the stack.
    fn measure_indentation(&mut self) -> Result<(), ScanError> {
        loop {
            let mut width = 0usize;
            loop {
                if self.consume_next_char_if_eq(' ') {
                    width += 1;
                    self.offset_in_line += 1;
                } else if self.consume_next_char_if_eq('\t') {
                    // Tabs snap to 8-column stops
                    width += 8 - width % 8;
                    self.offset_in_line += 1;
                } else if self.consume_next_char_if_eq('\r') {
                    self.offset_in_line += 1;
                } else {
                    break;
                }
            }
            match self.code_iter.peek() {
                // Blank line: no tokens, no indentation significance
                Some((_, '\n')) => {
                    self.code_iter.next();
                    self.line += 1;
                    self.offset_in_line = 0;
                }
                // Comment-only line: gobble and treat like a blank one
                Some((_, '#')) => {
                    while self.consume_next_char_if_neq('\n') {
                        self.offset_in_line += 1;
                    }
                }
                // Let scan_token produce the EOF wind-down
                None => return Ok(()),
                Some(_) => {
                    let pos = self.current_pos();
                    let current = self.indents.last().copied().unwrap_or(0);
                    if width > current {
                        self.indents.push(width);
                        self.pending.push_back(Token {
                            data: Data::Indent,
                            pos,
                        });
                    } else if width < current {
                        while self.indents.last().copied().unwrap_or(0) > width {
                            self.indents.pop();
                            self.pending.push_back(Token {
                                data: Data::Dedent,
                                pos,
                            });
                        }
                        if self.indents.last().copied().unwrap_or(0) != width {
                            return Err(ScanError {
                                error: ScanErrorType::InconsistentIndent,
                                pos,
                            });
                        }
                    }
                    return Ok(());
                }
            }
        }
    }

    fn scan_token(&mut self) -> Result<Option<Token<'lex>>, ScanError> {
        let pos = self.current_pos();
        let Some((offset, ch)) = self.code_iter.next() else {
            if !self.emitted_eof {
                self.emitted_eof = true;
                if self.line_has_tokens {
                    self.line_has_tokens = false;
                    self.pending.push_back(Token {
                        data: Data::Newline,
                        pos,
                    });
                }
                while self.indents.len() > 1 {
                    self.indents.pop();
                    self.pending.push_back(Token {
                        data: Data::Dedent,
                        pos,
                    });
                }
                self.pending.push_back(Token {
                    data: Data::Eof,
                    pos,
                });
                return Ok(None);
            }
            return Ok(Some(Token {
                data: Data::Eof,
                pos,
            }));
        };
        match ch {
            '(' | '[' | '{' => {
                self.bracket_depth += 1;
                self.offset_in_line += 1;
                let symbol = match ch {
                    '(' => Symbol::LeftParen,
                    '[' => Symbol::LeftBracket,
                    _ => Symbol::LeftBrace,
                };
                Ok(Some(Token {
                    data: Data::Symbol(symbol),
                    pos,
                }))
            }
            ')' | ']' | '}' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                self.offset_in_line += 1;
                let symbol = match ch {
                    ')' => Symbol::RightParen,
                    ']' => Symbol::RightBracket,
                    _ => Symbol::RightBrace,
                };
                Ok(Some(Token {
                    data: Data::Symbol(symbol),
                    pos,
                }))
            }
            ',' => self.single(pos, Symbol::Comma),
            ':' => self.single(pos, Symbol::Colon),
            '.' => self.single(pos, Symbol::Dot),
            ';' => self.single(pos, Symbol::Semicolon),
            '+' => self.with_equal(pos, Symbol::Plus, Symbol::PlusEqual),
            '-' => self.with_equal(pos, Symbol::Minus, Symbol::MinusEqual),
            '%' => self.with_equal(pos, Symbol::Percent, Symbol::PercentEqual),
            '=' => self.with_equal(pos, Symbol::Equal, Symbol::EqualEqual),
            '<' => self.with_equal(pos, Symbol::Less, Symbol::LessEqual),
            '>' => self.with_equal(pos, Symbol::Greater, Symbol::GreaterEqual),
            '*' => {
                if self.consume_next_char_if_eq('*') {
                    self.offset_in_line += 1;
                    self.with_equal(pos, Symbol::DoubleStar, Symbol::DoubleStarEqual)
                } else {
                    self.with_equal(pos, Symbol::Star, Symbol::StarEqual)
                }
            }
            '/' => {
                if self.consume_next_char_if_eq('/') {
                    self.offset_in_line += 1;
                    self.with_equal(pos, Symbol::DoubleSlash, Symbol::DoubleSlashEqual)
                } else {
                    self.with_equal(pos, Symbol::Slash, Symbol::SlashEqual)
                }
            }
            '!' => {
                if self.consume_next_char_if_eq('=') {
                    self.offset_in_line += 2;
                    Ok(Some(Token {
                        data: Data::Symbol(Symbol::BangEqual),
                        pos,
                    }))
                } else {
                    self.offset_in_line += 1;
                    Err(ScanError {
                        error: ScanErrorType::UnrecognizedToken,
                        pos,
                    })
                }
            }
            '#' => {
                let mut comment_len = 1;
                while self.consume_next_char_if_neq('\n') {
                    comment_len += 1;
                }
                self.offset_in_line += comment_len;
                Ok(None)
            }
            ' ' | '\r' | '\t' => {
                self.offset_in_line += 1;
                while self.consume_next_char_if_match(|ch| WS_CHARS.contains(ch)) {
                    self.offset_in_line += 1;
                }
                Ok(None)
            }
            '\n' => {
                self.line += 1;
                self.offset_in_line = 0;
                if self.bracket_depth > 0 {
                    // Implicit line joining inside brackets
                    Ok(None)
                } else {
                    self.at_line_start = true;
                    if self.line_has_tokens {
                        self.line_has_tokens = false;
                        Ok(Some(Token {
                            data: Data::Newline,
                            pos,
                        }))
                    } else {
                        Ok(None)
                    }
                }
            }
            '0'..='9' => {
                let mut num_len = 1;
                while self.consume_next_char_if_match(|ch| ch.is_ascii_digit()) {
                    num_len += 1;
                }
                // Only take the dot when a digit follows, so `a[1:]` and
                // `x.y` stay intact; that needs two characters of lookahead
                let mut ahead = self.code_iter.clone();
                let mut is_float = false;
                if matches!(ahead.next(), Some((_, '.')))
                    && matches!(ahead.next(), Some((_, ch)) if ch.is_ascii_digit())
                {
                    self.code_iter.next();
                    num_len += 1;
                    is_float = true;
                    while self.consume_next_char_if_match(|ch| ch.is_ascii_digit()) {
                        num_len += 1;
                    }
                }
                self.offset_in_line += num_len;
                let end = self.peek_offset();
                let num_slice = &self.code[offset..end];
                let data = if is_float {
                    match num_slice.parse::<f64>() {
                        Ok(number) => Data::Float(number),
                        Err(_) => {
                            return Err(ScanError {
                                error: ScanErrorType::UnrecognizedToken,
                                pos,
                            })
                        }
                    }
                } else {
                    match num_slice.parse::<i64>() {
                        Ok(number) => Data::Int(number),
                        // Out of i64 range; fall back to the float form
                        Err(_) => match num_slice.parse::<f64>() {
                            Ok(number) => Data::Float(number),
                            Err(_) => {
                                return Err(ScanError {
                                    error: ScanErrorType::UnrecognizedToken,
                                    pos,
                                })
                            }
                        },
                    }
                };
                Ok(Some(Token { data, pos }))
            }
            quote @ ('"' | '\'') => {
                let mut string = String::new();
                loop {
                    match self.code_iter.next() {
                        Some((_, ch)) if ch == quote => {
                            self.offset_in_line += 1;
                            break;
                        }
                        // Strings don't span lines
                        Some((_, '\n')) | None => {
                            return Err(ScanError {
                                error: ScanErrorType::UnterminatedString,
                                pos,
                            });
                        }
                        Some((_, '\\')) => {
                            self.offset_in_line += 1;
                            match self.code_iter.next() {
                                Some((_, 'n')) => string.push('\n'),
                                Some((_, 't')) => string.push('\t'),
                                Some((_, 'r')) => string.push('\r'),
                                Some((_, '\\')) => string.push('\\'),
                                Some((_, '\'')) => string.push('\''),
                                Some((_, '"')) => string.push('"'),
                                Some((_, other)) => {
                                    // Unknown escape: keep it verbatim
                                    string.push('\\');
                                    string.push(other);
                                }
                                None => {
                                    return Err(ScanError {
                                        error: ScanErrorType::UnterminatedString,
                                        pos,
                                    });
                                }
                            }
                            self.offset_in_line += 1;
                        }
                        Some((_, ch)) => {
                            self.offset_in_line += 1;
                            string.push(ch);
                        }
                    }
                }
                Ok(Some(Token {
                    data: Data::Str(string),
                    pos,
                }))
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident_len = 1;
                while self.consume_next_char_if_match(|ch| ch.is_alphanumeric() || ch == '_') {
                    ident_len += 1;
                }
                self.offset_in_line += ident_len;
                let end = self.peek_offset();
                let identifier = &self.code[offset..end];
                let token = if let Some((_, kw)) = KEYWORD_LITERAL_TO_SYMBOL
                    .iter()
                    .find(|(lit, _)| *lit == identifier)
                {
                    Token {
                        data: Data::Keyword(*kw),
                        pos,
                    }
                } else {
                    Token {
                        data: Data::Identifier(identifier),
                        pos,
                    }
                };
                Ok(Some(token))
            }
            _ => {
                self.offset_in_line += 1;
                Err(ScanError {
                    error: ScanErrorType::UnrecognizedToken,
                    pos,
                })
            }
        }
    }

    fn single(&mut self, pos: Pos, symbol: Symbol) -> Result<Option<Token<'lex>>, ScanError> {
        self.offset_in_line += 1;
        Ok(Some(Token {
            data: Data::Symbol(symbol),
            pos,
        }))
    }

    // A one- or two-character operator where '=' picks the augmented form
    fn with_equal(
        &mut self,
        pos: Pos,
        plain: Symbol,
        augmented: Symbol,
    ) -> Result<Option<Token<'lex>>, ScanError> {
        let symbol = if self.consume_next_char_if_eq('=') {
            self.offset_in_line += 2;
            augmented
        } else {
            self.offset_in_line += 1;
            plain
        };
        Ok(Some(Token {
            data: Data::Symbol(symbol),
            pos,
        }))
    }

    fn current_pos(&self) -> Pos {
        Pos {
            line: self.line,
            offset_in_line: self.offset_in_line,
        }
    }

    // Byte offset of the next unconsumed character
    fn peek_offset(&mut self) -> usize {
        self.code_iter
            .peek()
            .map_or(self.code.len(), |(offset, _)| *offset)
    }

    fn consume_next_char_if_eq(&mut self, next_ch: char) -> bool {
        self.code_iter.next_if(|(_, ch)| *ch == next_ch).is_some()
    }

    fn consume_next_char_if_neq(&mut self, not_next_ch: char) -> bool {
        self.code_iter
            .next_if(|(_, ch)| *ch != not_next_ch)
            .is_some()
    }

    fn consume_next_char_if_match<F>(&mut self, predicate: F) -> bool
    where
        F: FnOnce(char) -> bool,
    {
        self.code_iter.next_if(|(_, ch)| predicate(*ch)).is_some()
    }
}

const WS_CHARS: &str = " \r\t";

#[cfg(test)]
mod test {
    use super::*;

    fn scan_all(code: &str) -> Vec<Data<'_>> {
        let mut scanner = Scanner::new(code);
        let mut out = Vec::new();
        loop {
            let token = scanner.next().unwrap();
            let done = token.data == Data::Eof;
            out.push(token.data);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn scan_keyword_and_identifier() {
        let mut scanner = Scanner::new("def marco");
        let token = scanner.next().unwrap();
        assert_eq!(Data::Keyword(Keyword::Def), token.data);
        assert_eq!(
            Pos {
                line: 0,
                offset_in_line: 0
            },
            token.pos
        );
        let token = scanner.next().unwrap();
        assert_eq!(Data::Identifier("marco"), token.data);
        assert_eq!(
            Pos {
                line: 0,
                offset_in_line: 4
            },
            token.pos
        );
    }

    #[test]
    fn scan_numbers() {
        assert_eq!(
            scan_all("10 2.5"),
            vec![
                Data::Int(10),
                Data::Float(2.5),
                Data::Newline,
                Data::Eof
            ]
        );
    }

    #[test]
    fn dot_after_number_is_not_swallowed() {
        // 1. would otherwise eat the dot of a method call
        assert_eq!(
            scan_all("a[1:]"),
            vec![
                Data::Identifier("a"),
                Data::Symbol(Symbol::LeftBracket),
                Data::Int(1),
                Data::Symbol(Symbol::Colon),
                Data::Symbol(Symbol::RightBracket),
                Data::Newline,
                Data::Eof
            ]
        );
    }

    #[test]
    fn scan_augmented_operators() {
        assert_eq!(
            scan_all("x //= 2 ** 3"),
            vec![
                Data::Identifier("x"),
                Data::Symbol(Symbol::DoubleSlashEqual),
                Data::Int(2),
                Data::Symbol(Symbol::DoubleStar),
                Data::Int(3),
                Data::Newline,
                Data::Eof
            ]
        );
    }

    #[test]
    fn scan_string_with_escapes() {
        assert_eq!(
            scan_all("'a\\nb'"),
            vec![Data::Str("a\nb".to_string()), Data::Newline, Data::Eof]
        );
    }

    #[test]
    fn indent_and_dedent() {
        let code = "if x:\n    y = 1\nz = 2\n";
        assert_eq!(
            scan_all(code),
            vec![
                Data::Keyword(Keyword::If),
                Data::Identifier("x"),
                Data::Symbol(Symbol::Colon),
                Data::Newline,
                Data::Indent,
                Data::Identifier("y"),
                Data::Symbol(Symbol::Equal),
                Data::Int(1),
                Data::Newline,
                Data::Dedent,
                Data::Identifier("z"),
                Data::Symbol(Symbol::Equal),
                Data::Int(2),
                Data::Newline,
                Data::Eof
            ]
        );
    }

    #[test]
    fn dedents_close_at_eof() {
        let code = "while x:\n    if y:\n        z";
        let data = scan_all(code);
        let dedents = data.iter().filter(|d| **d == Data::Dedent).count();
        assert_eq!(2, dedents);
        assert_eq!(Data::Eof, *data.last().unwrap());
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        let code = "a = 1\n\n# just a note\nb = 2\n";
        assert_eq!(
            scan_all(code),
            vec![
                Data::Identifier("a"),
                Data::Symbol(Symbol::Equal),
                Data::Int(1),
                Data::Newline,
                Data::Identifier("b"),
                Data::Symbol(Symbol::Equal),
                Data::Int(2),
                Data::Newline,
                Data::Eof
            ]
        );
    }

    #[test]
    fn newlines_inside_brackets_are_joined() {
        let code = "a = [1,\n     2]\n";
        let data = scan_all(code);
        let newlines = data.iter().filter(|d| **d == Data::Newline).count();
        assert_eq!(1, newlines);
        assert!(!data.contains(&Data::Indent));
    }

    // Verify we don't get into an infinite loop by error conditions
    #[test]
    fn no_infinite_seq_on_unterminated_string() {
        let code = "'a string that isn't over";
        let mut scanner = Scanner::new(code);
        // The apostrophe terminates early; keep pulling until the stream
        // settles on Eof without hanging
        for _ in 0..16 {
            if matches!(scanner.next(), Ok(token) if token.data == Data::Eof) {
                return;
            }
        }
        panic!("scanner never reached eof");
    }

    #[test]
    fn no_infinite_seq_on_bad_token() {
        let mut scanner = Scanner::new("$var");
        let err = scanner.next().unwrap_err();
        assert_eq!(ScanErrorType::UnrecognizedToken, err.error);
    }

    #[test]
    fn inconsistent_dedent_is_an_error() {
        let code = "if x:\n        a\n    b\n";
        let mut scanner = Scanner::new(code);
        let mut saw_error = false;
        for _ in 0..32 {
            match scanner.next() {
                Err(err) => {
                    assert_eq!(ScanErrorType::InconsistentIndent, err.error);
                    saw_error = true;
                    break;
                }
                Ok(token) if token.data == Data::Eof => break,
                Ok(_) => {}
            }
        }
        assert!(saw_error);
    }
}
