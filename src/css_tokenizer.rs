//! Restartable CSS tokenizer.
//!
//! The tokenizer is a cursor over a borrowed buffer; it never allocates except
//! for token payloads, and any position it reports can be fed back through
//! [`Tokenizer::seek`] to resume from there.

use crate::values::Unit;

/// At-rule keyword.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AtKeyword {
    Media,
    Page,
    Import,
    Charset,
    FontFace,
    Namespace,
    Other(String),
}

impl AtKeyword {
    fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "media" => Self::Media,
            "page" => Self::Page,
            "import" => Self::Import,
            "charset" => Self::Charset,
            "font-face" => Self::FontFace,
            "namespace" => Self::Namespace,
            _ => Self::Other(name.to_string()),
        }
    }
}

/// One lexical token.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Ident(String),
    /// Identifier immediately followed by `(`; the parenthesis is consumed.
    Function(String),
    AtKeyword(AtKeyword),
    Hash(String),
    Str(String),
    BadString,
    Url(String),
    BadUrl,
    Number(f32),
    Percentage(f32),
    Length { value: f32, unit: Unit },
    Dimension { value: f32, unit: String },
    Colon,
    Semicolon,
    Comma,
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Greater,
    Plus,
    Tilde,
    /// `~=`
    Includes,
    /// `|=`
    DashMatch,
    /// `^=`
    PrefixMatch,
    /// `$=`
    SuffixMatch,
    /// `*=`
    SubstringMatch,
    Delim(char),
    /// `<!--`
    Cdo,
    /// `-->`
    Cdc,
    Whitespace,
    /// A character that cannot start any token.
    Error(char),
    Eof,
}

/// A token with the byte offset it starts at.
#[derive(Clone, Debug, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub offset: usize,
}

/// Lazy CSS tokenizer over a string buffer.
#[derive(Clone, Debug)]
pub struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    done: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            done: false,
        }
    }

    /// Current byte offset of the cursor.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor to `offset` (clamped, snapped back to a char boundary).
    pub fn seek(&mut self, offset: usize) {
        let mut offset = offset.min(self.src.len());
        while !self.src.is_char_boundary(offset) {
            offset -= 1;
        }
        self.pos = offset;
        self.done = false;
    }

    /// Source text between two offsets, used for diagnostics.
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        let end = end.min(self.src.len());
        self.src.get(start.min(end)..end).unwrap_or("")
    }

    /// Produce the next token, returning `Token::Eof` forever at the end.
    pub fn next_token(&mut self) -> SpannedToken {
        self.skip_comments();
        let offset = self.pos;
        let token = self.read_token();
        SpannedToken { token, offset }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn starts_with(&self, pat: &str) -> bool {
        self.src[self.pos..].starts_with(pat)
    }

    fn skip_comments(&mut self) {
        while self.starts_with("/*") {
            match self.src[self.pos + 2..].find("*/") {
                Some(end) => self.pos += 2 + end + 2,
                None => self.pos = self.src.len(),
            }
        }
    }

    fn read_token(&mut self) -> Token {
        let Some(ch) = self.peek() else {
            return Token::Eof;
        };
        match ch {
            c if is_whitespace(c) => {
                self.consume_whitespace();
                Token::Whitespace
            }
            '"' | '\'' => {
                self.bump();
                self.consume_string(ch)
            }
            '#' => {
                self.bump();
                if self.peek().is_some_and(is_name_char) || self.starts_valid_escape() {
                    Token::Hash(self.consume_name())
                } else {
                    Token::Delim('#')
                }
            }
            '@' => {
                self.bump();
                if self.starts_identifier() {
                    Token::AtKeyword(AtKeyword::from_name(&self.consume_name()))
                } else {
                    Token::Delim('@')
                }
            }
            '(' => self.single(Token::LeftParen),
            ')' => self.single(Token::RightParen),
            '[' => self.single(Token::LeftBracket),
            ']' => self.single(Token::RightBracket),
            '{' => self.single(Token::LeftBrace),
            '}' => self.single(Token::RightBrace),
            ':' => self.single(Token::Colon),
            ';' => self.single(Token::Semicolon),
            ',' => self.single(Token::Comma),
            '>' => self.single(Token::Greater),
            '~' => self.pair('=', Token::Includes, Token::Tilde),
            '|' => self.pair('=', Token::DashMatch, Token::Delim('|')),
            '^' => self.pair('=', Token::PrefixMatch, Token::Delim('^')),
            '$' => self.pair('=', Token::SuffixMatch, Token::Delim('$')),
            '*' => self.pair('=', Token::SubstringMatch, Token::Delim('*')),
            '<' => {
                if self.starts_with("<!--") {
                    self.pos += 4;
                    Token::Cdo
                } else {
                    self.single(Token::Delim('<'))
                }
            }
            '+' => {
                if self.starts_number() {
                    self.consume_numeric()
                } else {
                    self.single(Token::Plus)
                }
            }
            '-' => {
                if self.starts_number() {
                    self.consume_numeric()
                } else if self.starts_with("-->") {
                    self.pos += 3;
                    Token::Cdc
                } else if self.starts_identifier() {
                    self.consume_ident_like()
                } else {
                    self.single(Token::Delim('-'))
                }
            }
            '.' => {
                if self.starts_number() {
                    self.consume_numeric()
                } else {
                    self.single(Token::Delim('.'))
                }
            }
            '0'..='9' => self.consume_numeric(),
            '\\' => {
                if self.starts_valid_escape() {
                    self.consume_ident_like()
                } else {
                    self.single(Token::Error('\\'))
                }
            }
            c if is_name_start(c) => self.consume_ident_like(),
            c if c.is_control() => self.single(Token::Error(c)),
            c => self.single(Token::Delim(c)),
        }
    }

    fn single(&mut self, token: Token) -> Token {
        self.bump();
        token
    }

    fn pair(&mut self, next: char, paired: Token, alone: Token) -> Token {
        self.bump();
        if self.peek() == Some(next) {
            self.bump();
            paired
        } else {
            alone
        }
    }

    fn consume_whitespace(&mut self) {
        loop {
            while self.peek().is_some_and(is_whitespace) {
                self.bump();
            }
            if self.starts_with("/*") {
                self.skip_comments();
            } else {
                break;
            }
        }
    }

    fn starts_valid_escape(&self) -> bool {
        self.peek() == Some('\\') && self.peek_nth(1).is_some_and(|c| !is_newline(c))
    }

    fn starts_identifier(&self) -> bool {
        match self.peek() {
            Some('-') => match self.peek_nth(1) {
                Some(c) if is_name_start(c) || c == '-' => true,
                Some('\\') => self.peek_nth(2).is_some_and(|c| !is_newline(c)),
                _ => false,
            },
            Some('\\') => self.starts_valid_escape(),
            Some(c) => is_name_start(c),
            None => false,
        }
    }

    fn starts_number(&self) -> bool {
        let digit = |c: Option<char>| c.is_some_and(|c| c.is_ascii_digit());
        match self.peek() {
            Some('+' | '-') => {
                digit(self.peek_nth(1)) || (self.peek_nth(1) == Some('.') && digit(self.peek_nth(2)))
            }
            Some('.') => digit(self.peek_nth(1)),
            c => digit(c),
        }
    }

    fn consume_name(&mut self) -> String {
        let mut out = String::new();
        loop {
            match self.peek() {
                Some(c) if is_name_char(c) => {
                    out.push(c);
                    self.bump();
                }
                Some('\\') if self.starts_valid_escape() => {
                    self.bump();
                    out.push(self.consume_escape());
                }
                _ => return out,
            }
        }
    }

    /// Called after the backslash has been consumed.
    fn consume_escape(&mut self) -> char {
        let Some(first) = self.peek() else {
            return char::REPLACEMENT_CHARACTER;
        };
        if !first.is_ascii_hexdigit() {
            self.bump();
            return first;
        }
        let mut code = 0u32;
        let mut digits = 0;
        while digits < 6 {
            match self.peek().and_then(|c| c.to_digit(16)) {
                Some(d) => {
                    code = code * 16 + d;
                    digits += 1;
                    self.bump();
                }
                None => break,
            }
        }
        if self.starts_with("\r\n") {
            self.pos += 2;
        } else if self.peek().is_some_and(is_whitespace) {
            self.bump();
        }
        match char::from_u32(code) {
            Some(c) if code != 0 => c,
            _ => char::REPLACEMENT_CHARACTER,
        }
    }

    fn consume_string(&mut self, quote: char) -> Token {
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Token::BadString,
                Some(c) if c == quote => {
                    self.bump();
                    return Token::Str(out);
                }
                Some(c) if is_newline(c) => return Token::BadString,
                Some('\\') => {
                    self.bump();
                    match self.peek() {
                        None => {}
                        Some('\r') => {
                            self.bump();
                            if self.peek() == Some('\n') {
                                self.bump();
                            }
                        }
                        Some(c) if is_newline(c) => {
                            self.bump();
                        }
                        Some(_) => out.push(self.consume_escape()),
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.bump();
                }
            }
        }
    }

    fn consume_number(&mut self) -> f32 {
        let start = self.pos;
        if matches!(self.peek(), Some('+' | '-')) {
            self.bump();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let exp_digit = match self.peek_nth(1) {
                Some('+' | '-') => self.peek_nth(2).is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if exp_digit {
                self.bump();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.bump();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }
        self.src[start..self.pos].parse::<f32>().unwrap_or(0.0)
    }

    fn consume_numeric(&mut self) -> Token {
        let value = self.consume_number();
        if self.peek() == Some('%') {
            self.bump();
            return Token::Percentage(value);
        }
        if self.starts_identifier() {
            let unit = self.consume_name();
            return match Unit::from_suffix(&unit) {
                Some(unit) => Token::Length { value, unit },
                None => Token::Dimension { value, unit },
            };
        }
        Token::Number(value)
    }

    fn consume_ident_like(&mut self) -> Token {
        let name = self.consume_name();
        if self.peek() != Some('(') {
            return Token::Ident(name);
        }
        self.bump();
        if !name.eq_ignore_ascii_case("url") {
            return Token::Function(name);
        }
        while self.peek().is_some_and(is_whitespace) {
            self.bump();
        }
        match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                let token = self.consume_string(q);
                while self.peek().is_some_and(is_whitespace) {
                    self.bump();
                }
                match (token, self.peek()) {
                    (Token::Str(url), Some(')')) => {
                        self.bump();
                        Token::Url(url)
                    }
                    _ => {
                        self.consume_bad_url_remnants();
                        Token::BadUrl
                    }
                }
            }
            _ => self.consume_unquoted_url(),
        }
    }

    fn consume_unquoted_url(&mut self) -> Token {
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Token::BadUrl,
                Some(')') => {
                    self.bump();
                    return Token::Url(out);
                }
                Some(c) if is_whitespace(c) => {
                    while self.peek().is_some_and(is_whitespace) {
                        self.bump();
                    }
                    if self.peek() == Some(')') {
                        self.bump();
                        return Token::Url(out);
                    }
                    self.consume_bad_url_remnants();
                    return Token::BadUrl;
                }
                Some('"' | '\'' | '(') => {
                    self.consume_bad_url_remnants();
                    return Token::BadUrl;
                }
                Some(c) if c.is_control() => {
                    self.consume_bad_url_remnants();
                    return Token::BadUrl;
                }
                Some('\\') => {
                    if self.starts_valid_escape() {
                        self.bump();
                        out.push(self.consume_escape());
                    } else {
                        self.consume_bad_url_remnants();
                        return Token::BadUrl;
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.bump();
                }
            }
        }
    }

    fn consume_bad_url_remnants(&mut self) {
        loop {
            match self.peek() {
                None => return,
                Some(')') => {
                    self.bump();
                    return;
                }
                Some('\\') if self.starts_valid_escape() => {
                    self.bump();
                    self.consume_escape();
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = SpannedToken;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let token = self.next_token();
        if token.token == Token::Eof {
            self.done = true;
        }
        Some(token)
    }
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0c')
}

fn is_newline(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\x0c')
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || c == '-'
}
