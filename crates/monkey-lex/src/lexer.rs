//! The lexer: source string in, token stream + structural-balance
//! diagnostics out.

use std::rc::Rc;

use monkey_util::Position;

use crate::cursor::Cursor;
use crate::token::{Token, TokenKind, KEYWORDS};

/// A non-fatal lexical problem: an unmatched bracket or an illegal
/// character. Collected rather than raised so the caller can decide what
/// to do with the whole batch. Shares its shape with every other
/// diagnostic in the pipeline via `monkey_util::Reported`.
pub type LexError = monkey_util::Reported;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Bracket {
    Paren,
    Brace,
    Bracket,
}

impl Bracket {
    fn closing_name(self) -> &'static str {
        match self {
            Bracket::Paren => ")",
            Bracket::Brace => "}",
            Bracket::Bracket => "]",
        }
    }

    fn opening_name(self) -> &'static str {
        match self {
            Bracket::Paren => "(",
            Bracket::Brace => "{",
            Bracket::Bracket => "[",
        }
    }
}

/// Streams [`Token`]s out of a source string, tracking bracket balance as
/// it goes.
pub struct Lexer<'a> {
    cursor: Cursor<'a>,
    file: Rc<str>,
    open_brackets: Vec<(Bracket, Position)>,
    errors: Vec<LexError>,
    reached_eof: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, file: impl Into<Rc<str>>) -> Self {
        Self {
            cursor: Cursor::new(source),
            file: file.into(),
            open_brackets: Vec::new(),
            errors: Vec::new(),
            reached_eof: false,
        }
    }

    /// Lexical errors recorded so far: unmatched closing brackets seen
    /// immediately, unmatched opening brackets reported once end-of-input
    /// is reached.
    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    fn here(&self) -> Position {
        Position::new(self.file.clone(), self.cursor.line(), self.cursor.column())
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.cursor.peek() {
            if c.is_whitespace() {
                self.cursor.advance();
            } else {
                break;
            }
        }
    }

    fn push_open(&mut self, bracket: Bracket, position: Position) {
        self.open_brackets.push((bracket, position));
    }

    fn close_bracket(&mut self, bracket: Bracket, position: Position) {
        match self.open_brackets.pop() {
            Some((open, _)) if open == bracket => {}
            Some((open, open_pos)) => {
                let message = format!(
                    "unmatched closing bracket '{}': expected '{}' opened at {}",
                    bracket.closing_name(),
                    open.closing_name(),
                    open_pos,
                );
                log::warn!("{message}");
                self.errors.push(LexError::new(message, position.clone()));
                // put the mismatched opener back; it is still unclosed
                self.open_brackets.push((open, open_pos));
            }
            None => {
                let message = format!("unmatched closing bracket '{}'", bracket.closing_name());
                log::warn!("{message}");
                self.errors.push(LexError::new(message, position));
            }
        }
    }

    /// Reports any brackets still open once end-of-input has been reached.
    fn report_unclosed_brackets(&mut self) {
        for (bracket, position) in std::mem::take(&mut self.open_brackets) {
            let message = format!("unmatched opening bracket '{}'", bracket.opening_name());
            log::warn!("{message}");
            self.errors.push(LexError::new(message, position));
        }
    }

    fn read_while(&mut self, mut pred: impl FnMut(char) -> bool) -> (usize, usize) {
        let start = self.cursor.position();
        while let Some(c) = self.cursor.peek() {
            if pred(c) {
                self.cursor.advance();
            } else {
                break;
            }
        }
        (start, self.cursor.position())
    }

    fn read_identifier(&mut self) -> String {
        let (start, end) = self.read_while(|c| c.is_alphabetic());
        self.cursor.source()[start..end].to_owned()
    }

    fn read_number(&mut self) -> String {
        let (start, end) = self.read_while(|c| c.is_ascii_digit());
        self.cursor.source()[start..end].to_owned()
    }

    fn read_string(&mut self, position: Position) -> Token {
        self.cursor.advance(); // opening quote
        let start = self.cursor.position();
        loop {
            match self.cursor.peek() {
                None => break,
                Some('"') => break,
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
        let text = self.cursor.source()[start..self.cursor.position()].to_owned();
        if self.cursor.peek() == Some('"') {
            self.cursor.advance();
        }
        Token::new(TokenKind::String, text, position)
    }

    /// Returns the next token in the stream. Returns `Token::Eof` forever
    /// once end-of-input is reached.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let position = self.here();

        let Some(c) = self.cursor.peek() else {
            if !self.reached_eof {
                self.reached_eof = true;
                self.report_unclosed_brackets();
            }
            return Token::new(TokenKind::Eof, "", position);
        };

        if c.is_alphabetic() {
            let literal = self.read_identifier();
            let kind = if KEYWORDS.contains(&literal.as_str()) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            };
            return Token::new(kind, literal, position);
        }

        if c.is_ascii_digit() {
            let literal = self.read_number();
            return Token::new(TokenKind::Number, literal, position);
        }

        if c == '"' {
            return self.read_string(position);
        }

        macro_rules! single {
            ($kind:expr) => {{
                self.cursor.advance();
                Token::new($kind, c.to_string(), position)
            }};
        }

        match c {
            '(' => {
                self.push_open(Bracket::Paren, position.clone());
                single!(TokenKind::LParen)
            }
            ')' => {
                self.close_bracket(Bracket::Paren, position.clone());
                single!(TokenKind::RParen)
            }
            '{' => {
                self.push_open(Bracket::Brace, position.clone());
                single!(TokenKind::LBrace)
            }
            '}' => {
                self.close_bracket(Bracket::Brace, position.clone());
                single!(TokenKind::RBrace)
            }
            '[' => {
                self.push_open(Bracket::Bracket, position.clone());
                single!(TokenKind::LBracket)
            }
            ']' => {
                self.close_bracket(Bracket::Bracket, position.clone());
                single!(TokenKind::RBracket)
            }
            ',' => single!(TokenKind::Comma),
            ';' => single!(TokenKind::Semicolon),
            ':' => single!(TokenKind::Colon),
            '+' => single!(TokenKind::Plus),
            '-' => single!(TokenKind::Minus),
            '*' => single!(TokenKind::Asterisk),
            '/' => single!(TokenKind::Slash),
            '<' => single!(TokenKind::Lesser),
            '>' => single!(TokenKind::Greater),
            '=' => {
                if self.cursor.peek_second() == Some('=') {
                    self.cursor.advance();
                    self.cursor.advance();
                    Token::new(TokenKind::Equal, "==", position)
                } else {
                    single!(TokenKind::Assign)
                }
            }
            '!' => {
                if self.cursor.peek_second() == Some('=') {
                    self.cursor.advance();
                    self.cursor.advance();
                    Token::new(TokenKind::NotEqual, "!=", position)
                } else {
                    single!(TokenKind::Bang)
                }
            }
            other => {
                self.cursor.advance();
                let message = format!("illegal character '{other}'");
                log::warn!("{message}");
                self.errors.push(LexError::new(message, position.clone()));
                Token::new(TokenKind::Illegal, other.to_string(), position)
            }
        }
    }
}

/// Tokenize a whole source string, returning every token (including the
/// trailing `Eof`) and any lexical errors collected along the way.
pub fn lex(source: &str, file: impl Into<Rc<str>>) -> (Vec<Token>, Vec<LexError>) {
    let mut lexer = Lexer::new(source, file);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let is_eof = token.is_eof();
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    (tokens, lexer.errors().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source, "test.mo").0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_let_statement() {
        let (tokens, errors) = lex("let five = 5;", "test.mo");
        assert!(errors.is_empty());
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::Keyword,
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[1].literal, "five");
        assert_eq!(tokens[3].literal, "5");
    }

    #[test]
    fn lexes_two_char_operators_by_lookahead() {
        assert_eq!(
            kinds("== !="),
            vec![TokenKind::Equal, TokenKind::NotEqual, TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_function_literal() {
        assert_eq!(
            kinds("fn(x, y) { x + y; }"),
            vec![
                TokenKind::Keyword,
                TokenKind::LParen,
                TokenKind::Identifier,
                TokenKind::Comma,
                TokenKind::Identifier,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::Identifier,
                TokenKind::Plus,
                TokenKind::Identifier,
                TokenKind::Semicolon,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_string_literal_without_escapes() {
        let (tokens, errors) = lex(r#""foo bar""#, "test.mo");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].literal, "foo bar");
    }

    #[test]
    fn unterminated_string_runs_to_end_of_input() {
        let (tokens, errors) = lex(r#""unterminated"#, "test.mo");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].literal, "unterminated");
    }

    #[test]
    fn records_unmatched_closing_bracket() {
        let (_tokens, errors) = lex(")", "test.mo");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unmatched closing bracket"));
    }

    #[test]
    fn records_unmatched_opening_bracket_at_end_of_input() {
        let (_tokens, errors) = lex("(", "test.mo");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unmatched opening bracket"));
    }

    #[test]
    fn illegal_character_is_recorded_and_lexing_continues() {
        let (tokens, errors) = lex("1 @ 2", "test.mo");
        assert_eq!(errors.len(), 1);
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::Number,
                TokenKind::Illegal,
                TokenKind::Number,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn identifiers_are_alphabetic_only() {
        // Digits stop an identifier rather than continuing it.
        let (tokens, _) = lex("foo2", "test.mo");
        assert_eq!(tokens[0].literal, "foo");
        assert_eq!(tokens[1].kind, TokenKind::Number);
    }

    #[test]
    fn positions_are_zero_indexed_and_track_newlines() {
        let (tokens, _) = lex("let x = 1;\nlet y = 2;", "test.mo");
        // second "let" keyword is on line index 1 (displayed as line 2)
        let second_let = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Keyword)
            .nth(1)
            .unwrap();
        assert_eq!(second_let.position.line, 1);
        assert_eq!(second_let.position.display_line(), 2);
    }
}
