use super::ast::Span;
use super::error::CompileError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Int(i64),
    Float(f64),
    True,
    False,

    // Identifiers & keywords
    Ident(String),
    If,
    Elif,
    Else,
    For,
    In,
    Not,
    And,
    Or,
    Is,
    Pass,
    /// A keyword of the surrounding language that VUs may not use.
    Reserved(String),

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,   // **
    Slash,
    SlashSlash, // //
    Percent,
    Tilde,
    Amp,
    Pipe,
    Caret,
    Shl,        // <<
    Shr,        // >>
    Lt,
    Gt,
    Le,         // <=
    Ge,         // >=
    EqEq,       // ==
    Ne,         // !=
    Eq,         // =

    // Layout
    Comment(String),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

const RESERVED: &[&str] = &[
    "while", "break", "continue", "def", "class", "return", "lambda", "import", "from", "with",
    "try", "except", "finally", "raise", "del", "global", "nonlocal", "yield", "assert", "async",
    "await", "None",
];

pub fn lex(source: &str) -> Result<Vec<SpannedToken>, Vec<CompileError>> {
    let mut lexer = Lexer::new(source);
    lexer.tokenize()
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    /// Open `(` / `[` count. Newlines and indentation inside brackets are
    /// not significant.
    depth: usize,
    indents: Vec<usize>,
    at_line_start: bool,
    tokens: Vec<SpannedToken>,
    errors: Vec<CompileError>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            depth: 0,
            indents: vec![0],
            at_line_start: true,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn tokenize(&mut self) -> Result<Vec<SpannedToken>, Vec<CompileError>> {
        while self.pos < self.bytes.len() {
            if self.at_line_start && self.depth == 0 {
                self.lex_line_start();
                continue;
            }

            self.skip_whitespace();
            if self.pos >= self.bytes.len() {
                break;
            }

            let start = self.pos;
            let ch = self.bytes[self.pos];

            match ch {
                b'\n' => {
                    self.pos += 1;
                    if self.depth == 0 {
                        self.push(Token::Newline, start, start);
                        self.at_line_start = true;
                    }
                }
                b'\r' => self.pos += 1,
                b'\\' if self.bytes.get(self.pos + 1) == Some(&b'\n') => {
                    // Explicit line joining
                    self.pos += 2;
                }
                b'#' => {
                    // Trailing comment: dropped
                    while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                b'(' => { self.pos += 1; self.depth += 1; self.push(Token::LParen, start, self.pos); }
                b')' => { self.pos += 1; self.depth = self.depth.saturating_sub(1); self.push(Token::RParen, start, self.pos); }
                b'[' => { self.pos += 1; self.depth += 1; self.push(Token::LBracket, start, self.pos); }
                b']' => { self.pos += 1; self.depth = self.depth.saturating_sub(1); self.push(Token::RBracket, start, self.pos); }
                b',' => { self.pos += 1; self.push(Token::Comma, start, self.pos); }
                b':' => { self.pos += 1; self.push(Token::Colon, start, self.pos); }
                b'+' => { self.pos += 1; self.push(Token::Plus, start, self.pos); }
                b'-' => { self.pos += 1; self.push(Token::Minus, start, self.pos); }
                b'%' => { self.pos += 1; self.push(Token::Percent, start, self.pos); }
                b'~' => { self.pos += 1; self.push(Token::Tilde, start, self.pos); }
                b'&' => { self.pos += 1; self.push(Token::Amp, start, self.pos); }
                b'|' => { self.pos += 1; self.push(Token::Pipe, start, self.pos); }
                b'^' => { self.pos += 1; self.push(Token::Caret, start, self.pos); }
                b'.' => {
                    if self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit) {
                        self.lex_number(start);
                    } else {
                        self.pos += 1;
                        self.push(Token::Dot, start, self.pos);
                    }
                }
                b'*' => {
                    self.pos += 1;
                    if self.peek() == Some(b'*') {
                        self.pos += 1;
                        self.push(Token::StarStar, start, self.pos);
                    } else {
                        self.push(Token::Star, start, self.pos);
                    }
                }
                b'/' => {
                    self.pos += 1;
                    if self.peek() == Some(b'/') {
                        self.pos += 1;
                        self.push(Token::SlashSlash, start, self.pos);
                    } else {
                        self.push(Token::Slash, start, self.pos);
                    }
                }
                b'<' => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'=') => { self.pos += 1; self.push(Token::Le, start, self.pos); }
                        Some(b'<') => { self.pos += 1; self.push(Token::Shl, start, self.pos); }
                        _ => self.push(Token::Lt, start, self.pos),
                    }
                }
                b'>' => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'=') => { self.pos += 1; self.push(Token::Ge, start, self.pos); }
                        Some(b'>') => { self.pos += 1; self.push(Token::Shr, start, self.pos); }
                        _ => self.push(Token::Gt, start, self.pos),
                    }
                }
                b'=' => {
                    self.pos += 1;
                    if self.peek() == Some(b'=') {
                        self.pos += 1;
                        self.push(Token::EqEq, start, self.pos);
                    } else {
                        self.push(Token::Eq, start, self.pos);
                    }
                }
                b'!' => {
                    self.pos += 1;
                    if self.peek() == Some(b'=') {
                        self.pos += 1;
                        self.push(Token::Ne, start, self.pos);
                    } else {
                        self.errors.push(CompileError::lexer(
                            "Unexpected character: '!'",
                            Span::new(start, self.pos),
                        ));
                    }
                }
                b'"' | b'\'' => {
                    self.skip_string();
                    self.errors.push(CompileError::lexer(
                        "String literals are not supported",
                        Span::new(start, self.pos),
                    ));
                }
                b'0'..=b'9' => {
                    self.lex_number(start);
                }
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                    self.lex_ident(start);
                }
                _ => {
                    let ch = self.source[start..].chars().next().unwrap_or('?');
                    self.errors.push(CompileError::lexer(
                        format!("Unexpected character: '{ch}'"),
                        Span::new(start, start + ch.len_utf8()),
                    ));
                    self.pos += ch.len_utf8();
                }
            }
        }

        // Terminate the last logical line and close open blocks
        if self
            .tokens
            .last()
            .is_some_and(|t| !matches!(t.token, Token::Newline | Token::Dedent))
        {
            self.push(Token::Newline, self.pos, self.pos);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Token::Dedent, self.pos, self.pos);
        }

        self.tokens.push(SpannedToken {
            token: Token::Eof,
            span: Span::new(self.pos, self.pos),
        });

        if self.errors.is_empty() {
            Ok(std::mem::take(&mut self.tokens))
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn push(&mut self, token: Token, start: usize, end: usize) {
        self.tokens.push(SpannedToken {
            token,
            span: Span::new(start, end),
        });
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\x0c')) {
            self.pos += 1;
        }
    }

    /// Measure the indentation of the line starting at `pos`. Returns the
    /// column and the byte offset of the first non-blank character.
    fn measure_indent(&self, mut pos: usize) -> (usize, usize) {
        let mut column = 0;
        while let Some(&b) = self.bytes.get(pos) {
            match b {
                b' ' => column += 1,
                b'\t' => column = (column / 8 + 1) * 8,
                b'\x0c' | b'\r' => {}
                _ => break,
            }
            pos += 1;
        }
        (column, pos)
    }

    fn line_end(&self, pos: usize) -> usize {
        self.source[pos..].find('\n').map_or(self.bytes.len(), |i| pos + i)
    }

    /// Indentation of the next line holding code, skipping blank and
    /// comment-only lines.
    fn next_code_indent(&self, mut pos: usize) -> Option<usize> {
        while pos < self.bytes.len() {
            let (column, first) = self.measure_indent(pos);
            match self.bytes.get(first) {
                None => return None,
                Some(b'\n' | b'#') => pos = self.line_end(first) + 1,
                Some(_) => return Some(column),
            }
        }
        None
    }

    fn lex_line_start(&mut self) {
        let (column, first) = self.measure_indent(self.pos);
        match self.bytes.get(first) {
            None => {
                self.pos = first;
            }
            Some(b'\n') => {
                // Blank line
                self.pos = first + 1;
            }
            Some(b'#') => {
                let end = self.line_end(first);
                let text = self.source[first + 1..end].trim().to_string();
                let after = (end + 1).min(self.bytes.len());
                // A comment belongs to the block of the code that follows it.
                let top = self.indents.last().copied().unwrap_or(0);
                let indent = self.next_code_indent(after).unwrap_or(column.min(top));
                self.apply_indent(indent, first);
                self.push(Token::Comment(text), first, end);
                self.push(Token::Newline, end, end);
                self.pos = after;
            }
            Some(_) => {
                self.apply_indent(column, first);
                self.pos = first;
                self.at_line_start = false;
            }
        }
    }

    fn apply_indent(&mut self, column: usize, at: usize) {
        let top = self.indents.last().copied().unwrap_or(0);
        if column > top {
            self.indents.push(column);
            self.push(Token::Indent, at, at);
            return;
        }
        while column < self.indents.last().copied().unwrap_or(0) {
            self.indents.pop();
            self.push(Token::Dedent, at, at);
        }
        if column != self.indents.last().copied().unwrap_or(0) {
            self.errors.push(CompileError::lexer(
                "Unindent does not match any outer indentation level",
                Span::new(at, at + 1),
            ));
            self.indents.push(column);
        }
    }

    fn skip_string(&mut self) {
        let quote = self.bytes[self.pos];
        self.pos += 1;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != quote && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        if self.peek() == Some(quote) {
            self.pos += 1;
        }
    }

    fn lex_number(&mut self, start: usize) {
        if self.bytes[self.pos] == b'0' && matches!(self.bytes.get(self.pos + 1), Some(b'x' | b'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_hexdigit() {
                self.pos += 1;
            }
            match i64::from_str_radix(&self.source[digits_start..self.pos], 16) {
                Ok(v) => self.push(Token::Int(v), start, self.pos),
                Err(_) => self.errors.push(CompileError::lexer(
                    "Invalid hexadecimal literal",
                    Span::new(start, self.pos),
                )),
            }
            return;
        }

        let mut is_float = false;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        // Check for decimal point
        if self.peek() == Some(b'.') && self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit) {
            is_float = true;
            self.pos += 1; // skip '.'
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }
        // Exponent
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mut p = self.pos + 1;
            if matches!(self.bytes.get(p), Some(b'+' | b'-')) {
                p += 1;
            }
            if self.bytes.get(p).is_some_and(u8::is_ascii_digit) {
                is_float = true;
                self.pos = p;
                while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                    self.pos += 1;
                }
            }
        }

        let text = &self.source[start..self.pos];
        if is_float {
            match text.parse::<f64>() {
                Ok(v) => self.push(Token::Float(v), start, self.pos),
                Err(_) => self.errors.push(CompileError::lexer(
                    format!("Invalid number: {text}"),
                    Span::new(start, self.pos),
                )),
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => self.push(Token::Int(v), start, self.pos),
                Err(_) => self.errors.push(CompileError::lexer(
                    format!("Integer literal out of range: {text}"),
                    Span::new(start, self.pos),
                )),
            }
        }
    }

    fn lex_ident(&mut self, start: usize) {
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        let word = &self.source[start..self.pos];
        let token = match word {
            "if" => Token::If,
            "elif" => Token::Elif,
            "else" => Token::Else,
            "for" => Token::For,
            "in" => Token::In,
            "not" => Token::Not,
            "and" => Token::And,
            "or" => Token::Or,
            "is" => Token::Is,
            "pass" => Token::Pass,
            "True" => Token::True,
            "False" => Token::False,
            w if RESERVED.contains(&w) => Token::Reserved(w.to_string()),
            _ => Token::Ident(word.to_string()),
        };
        self.push(token, start, self.pos);
    }
}
