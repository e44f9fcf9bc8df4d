//! Hand-written lexer/scanner for Carlos
//!
//! Converts source code into a stream of tokens.

use super::token::{Keyword, Token, TokenKind};
use crate::errors::SourceSpan;

/// The lexer/scanner for Carlos source code
pub struct Lexer<'src> {
    /// The source code being lexed
    source: &'src str,
    /// Current byte position in the source
    pos: usize,
    /// Start position of the current token
    start: usize,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            start: 0,
        }
    }

    /// Peek at the current character without consuming it
    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    /// Peek at the next character (one ahead of current)
    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next()
    }

    /// Advance to the next character and return it
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Check if we've reached the end of the source
    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// Get the current span (from start to current position)
    fn current_span(&self) -> SourceSpan {
        SourceSpan::new(self.start, self.pos)
    }

    /// Get the current lexeme (text from start to current position)
    fn current_lexeme(&self) -> &'src str {
        &self.source[self.start..self.pos]
    }

    /// Create a token with the current span
    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.current_span())
    }

    /// Consume the character if it matches the expected one
    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skip whitespace and line comments
    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r' | '\n') => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Scan a number literal: integer, or float with a mandatory digit on
    /// both sides of the dot and an optional exponent
    fn scan_number(&mut self) -> Token {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        // A dot makes this a float only when a digit follows; `1...3` must
        // lex as the integer 1 followed by a closed-range operator.
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance(); // consume '.'
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // An exponent is only part of the literal after a fractional part:
        // 1.5e3 is a float, 1e5 is the integer 1 followed by an identifier.
        if is_float && matches!(self.peek(), Some('e' | 'E')) {
            let mut lookahead = self.source[self.pos..].chars().skip(1);
            let mut next = lookahead.next();
            if matches!(next, Some('+' | '-')) {
                next = lookahead.next();
            }
            if next.is_some_and(|c| c.is_ascii_digit()) {
                self.advance(); // consume 'e'
                if matches!(self.peek(), Some('+' | '-')) {
                    self.advance();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let text = self.current_lexeme();
        if is_float {
            match text.parse::<f64>() {
                Ok(x) => self.make_token(TokenKind::Float(x)),
                Err(_) => self.make_token(TokenKind::Error("invalid float literal".to_string())),
            }
        } else {
            match text.parse::<i64>() {
                Ok(n) => self.make_token(TokenKind::Integer(n)),
                Err(_) => self.make_token(TokenKind::Error("integer literal too large".to_string())),
            }
        }
    }

    /// Scan a string literal, validating escapes but keeping the raw
    /// spelling (including the surrounding quotes) in the token
    fn scan_string(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if c == '"' {
                self.advance();
                let raw = self.current_lexeme().to_string();
                return self.make_token(TokenKind::String(raw));
            }

            if c == '\n' {
                return self.make_token(TokenKind::Error("unterminated string".to_string()));
            }

            self.advance();

            if c == '\\' {
                match self.peek() {
                    Some('n' | 't' | '"' | '\'' | '\\') => {
                        self.advance();
                    }
                    Some('u') => {
                        self.advance();
                        if !self.match_char('{') {
                            return self.make_token(TokenKind::Error(
                                "expected '{' in unicode escape".to_string(),
                            ));
                        }
                        let mut digits = 0;
                        while self.peek().is_some_and(|h| h.is_ascii_hexdigit()) {
                            self.advance();
                            digits += 1;
                        }
                        if digits == 0 || digits > 6 || !self.match_char('}') {
                            return self.make_token(TokenKind::Error(
                                "invalid unicode escape".to_string(),
                            ));
                        }
                    }
                    _ => {
                        return self
                            .make_token(TokenKind::Error("invalid escape sequence".to_string()));
                    }
                }
            }
        }

        self.make_token(TokenKind::Error("unterminated string".to_string()))
    }

    /// Scan an identifier or keyword. Identifiers are Unicode-alphabetic
    /// so standard-library names like `π` lex as ordinary identifiers.
    fn scan_identifier(&mut self) -> Token {
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let text = self.current_lexeme();

        if let Some(kw) = Keyword::parse(text) {
            self.make_token(TokenKind::Keyword(kw))
        } else {
            self.make_token(TokenKind::Ident(text.to_string()))
        }
    }

    /// Scan the next token
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        self.start = self.pos;

        if self.is_at_end() {
            return self.make_token(TokenKind::Eof);
        }

        let c = self.advance().unwrap();

        if c.is_alphabetic() || c == '_' {
            return self.scan_identifier();
        }

        if c.is_ascii_digit() {
            return self.scan_number();
        }

        if c == '"' {
            return self.scan_string();
        }

        match c {
            '(' => self.make_token(TokenKind::LParen),
            ')' => self.make_token(TokenKind::RParen),
            '{' => self.make_token(TokenKind::LBrace),
            '}' => self.make_token(TokenKind::RBrace),
            '[' => self.make_token(TokenKind::LBracket),
            ']' => self.make_token(TokenKind::RBracket),
            ';' => self.make_token(TokenKind::Semicolon),
            ':' => self.make_token(TokenKind::Colon),
            ',' => self.make_token(TokenKind::Comma),
            '^' => self.make_token(TokenKind::Caret),
            '%' => self.make_token(TokenKind::Percent),
            '#' => self.make_token(TokenKind::Hash),
            '/' => self.make_token(TokenKind::Slash),

            '.' => {
                if self.peek() == Some('.') {
                    self.advance();
                    if self.match_char('<') {
                        self.make_token(TokenKind::HalfOpenRange)
                    } else if self.match_char('.') {
                        self.make_token(TokenKind::ClosedRange)
                    } else {
                        self.make_token(TokenKind::Error(
                            "expected '..<' or '...'".to_string(),
                        ))
                    }
                } else {
                    self.make_token(TokenKind::Dot)
                }
            }

            '?' => {
                if self.match_char('?') {
                    self.make_token(TokenKind::QuestionQuestion)
                } else if self.match_char('.') {
                    self.make_token(TokenKind::QuestionDot)
                } else {
                    self.make_token(TokenKind::Question)
                }
            }

            '+' => {
                if self.match_char('+') {
                    self.make_token(TokenKind::PlusPlus)
                } else {
                    self.make_token(TokenKind::Plus)
                }
            }

            '-' => {
                if self.match_char('-') {
                    self.make_token(TokenKind::MinusMinus)
                } else if self.match_char('>') {
                    self.make_token(TokenKind::Arrow)
                } else {
                    self.make_token(TokenKind::Minus)
                }
            }

            '*' => {
                if self.match_char('*') {
                    self.make_token(TokenKind::StarStar)
                } else {
                    self.make_token(TokenKind::Star)
                }
            }

            '&' => {
                if self.match_char('&') {
                    self.make_token(TokenKind::AmpAmp)
                } else {
                    self.make_token(TokenKind::Amp)
                }
            }

            '|' => {
                if self.match_char('|') {
                    self.make_token(TokenKind::PipePipe)
                } else {
                    self.make_token(TokenKind::Pipe)
                }
            }

            '!' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::BangEq)
                } else {
                    self.make_token(TokenKind::Bang)
                }
            }

            '=' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::EqEq)
                } else {
                    self.make_token(TokenKind::Eq)
                }
            }

            '<' => {
                if self.match_char('<') {
                    self.make_token(TokenKind::LtLt)
                } else if self.match_char('=') {
                    self.make_token(TokenKind::LtEq)
                } else {
                    self.make_token(TokenKind::Lt)
                }
            }

            '>' => {
                if self.match_char('>') {
                    self.make_token(TokenKind::GtGt)
                } else if self.match_char('=') {
                    self.make_token(TokenKind::GtEq)
                } else {
                    self.make_token(TokenKind::Gt)
                }
            }

            _ => self.make_token(TokenKind::Error(format!("unexpected character: {}", c))),
        }
    }

    /// Collect all tokens into a vector
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.kind.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.kind.is_eof() {
            None
        } else {
            Some(token)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_basic_tokens() {
        let tokens = lex("( ) { } [ ] ; : , .");
        assert_eq!(
            tokens,
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Semicolon,
                TokenKind::Colon,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        let tokens = lex("+ - * / % ** & | ^ ! #");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::StarStar,
                TokenKind::Amp,
                TokenKind::Pipe,
                TokenKind::Caret,
                TokenKind::Bang,
                TokenKind::Hash,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_compound_operators() {
        let tokens = lex("== != <= >= << >> && || ++ -- -> ?? ?. ..< ...");
        assert_eq!(
            tokens,
            vec![
                TokenKind::EqEq,
                TokenKind::BangEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::LtLt,
                TokenKind::GtGt,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::Arrow,
                TokenKind::QuestionQuestion,
                TokenKind::QuestionDot,
                TokenKind::HalfOpenRange,
                TokenKind::ClosedRange,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = lex("42 3.14 1.5e3 2.0E-2 7");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Integer(42),
                TokenKind::Float(3.14),
                TokenKind::Float(1.5e3),
                TokenKind::Float(2.0e-2),
                TokenKind::Integer(7),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_exponent_requires_fraction() {
        let tokens = lex("1e5");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Integer(1),
                TokenKind::Ident("e5".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_range_after_integer() {
        // The dot after `1` belongs to the range operator, not a float.
        let tokens = lex("1..<5 1...5");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Integer(1),
                TokenKind::HalfOpenRange,
                TokenKind::Integer(5),
                TokenKind::Integer(1),
                TokenKind::ClosedRange,
                TokenKind::Integer(5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_keep_raw_spelling() {
        let tokens = lex(r#""hello" "line\n" "u\u{1F600}""#);
        assert_eq!(
            tokens,
            vec![
                TokenKind::String(r#""hello""#.to_string()),
                TokenKind::String(r#""line\n""#.to_string()),
                TokenKind::String(r#""u\u{1F600}""#.to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_bad_escape() {
        let tokens = lex(r#""oops\q""#);
        assert!(tokens[0].is_error());
    }

    #[test]
    fn test_keywords() {
        let tokens = lex("let const struct function if else while repeat for in break return");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Keyword(Keyword::Let),
                TokenKind::Keyword(Keyword::Const),
                TokenKind::Keyword(Keyword::Struct),
                TokenKind::Keyword(Keyword::Function),
                TokenKind::Keyword(Keyword::If),
                TokenKind::Keyword(Keyword::Else),
                TokenKind::Keyword(Keyword::While),
                TokenKind::Keyword(Keyword::Repeat),
                TokenKind::Keyword(Keyword::For),
                TokenKind::Keyword(Keyword::In),
                TokenKind::Keyword(Keyword::Break),
                TokenKind::Keyword(Keyword::Return),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_optional_keywords() {
        let tokens = lex("some no random of");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Keyword(Keyword::Some),
                TokenKind::Keyword(Keyword::No),
                TokenKind::Keyword(Keyword::Random),
                TokenKind::Keyword(Keyword::Of),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_identifiers() {
        // Type names are identifiers, and identifiers may be Unicode.
        let tokens = lex("int float π counter_1 _private");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("int".to_string()),
                TokenKind::Ident("float".to_string()),
                TokenKind::Ident("π".to_string()),
                TokenKind::Ident("counter_1".to_string()),
                TokenKind::Ident("_private".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments() {
        let tokens = lex("a // to end of line\nb");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Ident("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_sample_code() {
        let tokens = lex(r#"
            function gcd(x: int, y: int): int {
                while y != 0 {
                    let t = y;
                    y = x % y;
                    x = t;
                }
                return x;
            }
            "#);

        assert!(tokens.len() > 20);
        assert!(matches!(tokens.last(), Some(TokenKind::Eof)));
    }
}
