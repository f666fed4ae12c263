use std::str::Chars;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Objective sense
    Max,
    Min,

    // Restrictions (besides `+` and `-`)
    Urs,
    Int,
    Bin,

    // Literals
    Number,
    Ident,

    // Signs
    Plus,
    Minus,

    // Relations
    Le,
    Ge,
    Eq,

    // Special
    Newline,
    Comment,
    Eof,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, text: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            text: text.into(),
        }
    }
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: Chars<'a>,
    pos: usize,
    current: Option<char>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut chars = source.chars();
        let current = chars.next();
        Self {
            source,
            chars,
            pos: 0,
            current,
        }
    }

    pub fn tokenize(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.current;
        self.current = self.chars.next();
        if let Some(ch) = c {
            self.pos += ch.len_utf8();
        }
        c
    }

    fn peek(&self) -> Option<char> {
        self.current
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c == ' ' || c == '\t' || c == '\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn token_from(&self, kind: TokenKind, start: usize) -> Token {
        Token::new(kind, Span::new(start, self.pos), &self.source[start..self.pos])
    }

    fn skip_line_comment(&mut self) -> Token {
        let start = self.pos;
        self.advance(); // first /
        self.advance(); // second /
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
        self.token_from(TokenKind::Comment, start)
    }

    fn eat_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    /// Unsigned decimal with optional fraction and exponent. Signs are
    /// separate tokens.
    fn read_number(&mut self) -> Token {
        let start = self.pos;
        self.eat_digits();

        if self.peek() == Some('.') {
            self.advance();
            self.eat_digits();
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = matches!(self.peek_next(), Some('+' | '-'));
            let digit_follows = {
                let mut ahead = self.chars.clone();
                if sign {
                    ahead.next();
                }
                ahead.next().is_some_and(|c| c.is_ascii_digit())
            };
            if digit_follows {
                self.advance(); // e
                if sign {
                    self.advance();
                }
                self.eat_digits();
            }
        }

        self.token_from(TokenKind::Number, start)
    }

    fn read_word(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let kind = match &self.source[start..self.pos] {
            "max" => TokenKind::Max,
            "min" => TokenKind::Min,
            "urs" => TokenKind::Urs,
            "int" => TokenKind::Int,
            "bin" => TokenKind::Bin,
            _ => TokenKind::Ident,
        };
        self.token_from(kind, start)
    }

    /// `<=`, `>=` or `=`; a lone `<` or `>` is an error token.
    fn read_relation(&mut self, c: char) -> Token {
        let start = self.pos;
        self.advance();
        if c == '=' {
            return self.token_from(TokenKind::Eq, start);
        }
        if self.peek() != Some('=') {
            return self.token_from(TokenKind::Error, start);
        }
        self.advance();
        let kind = if c == '<' { TokenKind::Le } else { TokenKind::Ge };
        self.token_from(kind, start)
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = self.pos;

        let Some(c) = self.peek() else {
            return Token::new(TokenKind::Eof, Span::new(start, start), "");
        };

        match c {
            '\n' => {
                self.advance();
                self.token_from(TokenKind::Newline, start)
            }
            '/' if self.peek_next() == Some('/') => self.skip_line_comment(),
            '+' => {
                self.advance();
                self.token_from(TokenKind::Plus, start)
            }
            '-' => {
                self.advance();
                self.token_from(TokenKind::Minus, start)
            }
            '<' | '>' | '=' => self.read_relation(c),
            c if c.is_ascii_digit() => self.read_number(),
            '.' if self.peek_next().is_some_and(|n| n.is_ascii_digit()) => self.read_number(),
            c if c.is_alphabetic() || c == '_' => self.read_word(),
            _ => {
                self.advance();
                self.token_from(TokenKind::Error, start)
            }
        }
    }
}
