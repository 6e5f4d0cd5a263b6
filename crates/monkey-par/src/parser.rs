//! Pratt parser: one token of lookahead (`cur`/`peek`), binding powers
//! drive how far an infix operator reaches before yielding to the next
//! one up.

use std::rc::Rc;

use monkey_lex::{lex, Token, TokenKind};
use monkey_util::Position;

use crate::ast::{
    ArrayLiteral, BlockStatement, BooleanLiteral, CallExpression, Expression,
    ExpressionStatement, FunctionLiteral, HashLiteral, Identifier, IfExpression, IndexExpression,
    InfixExpression, IntegerLiteral, LetStatement, PrefixExpression, Program, ReturnStatement,
    Statement, StringLiteral,
};

/// A non-fatal syntax problem, collected rather than raised so the caller
/// sees every error a batch run produced. Shares its shape with every
/// other diagnostic in the pipeline via `monkey_util::Reported`.
pub type ParseError = monkey_util::Reported;

/// Binding power of each operator, low to high. Mirrors the closed
/// precedence ladder for Monkey expressions: equality binds loosest,
/// indexing tightest.
#[doc(hidden)]
pub mod bp {
    pub const LOWEST: u8 = 0;
    pub const EQUALS: u8 = 2;
    pub const LESS_GREATER: u8 = 4;
    pub const SUM: u8 = 6;
    pub const PRODUCT: u8 = 8;
    pub const PREFIX: u8 = 10;
    pub const CALL: u8 = 12;
    pub const INDEX: u8 = 14;
}

fn infix_binding_power(kind: TokenKind) -> Option<u8> {
    use TokenKind::*;
    match kind {
        Equal | NotEqual => Some(bp::EQUALS),
        Lesser | Greater => Some(bp::LESS_GREATER),
        Plus | Minus => Some(bp::SUM),
        Slash | Asterisk => Some(bp::PRODUCT),
        LParen => Some(bp::CALL),
        LBracket => Some(bp::INDEX),
        _ => None,
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        let tokens = if tokens.last().map(|t| t.is_eof()) == Some(true) {
            tokens
        } else {
            let mut tokens = tokens;
            tokens.push(Token::new(TokenKind::Eof, "", Position::dummy()));
            tokens
        };
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    fn cur(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn cur_is(&self, kind: TokenKind) -> bool {
        self.cur().kind == kind
    }

    fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn cur_is_keyword(&self, word: &str) -> bool {
        self.cur().kind == TokenKind::Keyword && self.cur().literal == word
    }

    fn peek_is_keyword(&self, word: &str) -> bool {
        self.peek().kind == TokenKind::Keyword && self.peek().literal == word
    }

    /// Advances past `kind` if peek matches, else records an error and
    /// leaves the cursor in place.
    fn expect_peek(&mut self, kind: TokenKind, what: &str) -> bool {
        if self.peek_is(kind) {
            self.advance();
            true
        } else {
            let position = self.peek().position.clone();
            let message = format!(
                "expected next token to be {what}, got '{}' instead",
                self.peek().literal
            );
            log::warn!("{message}");
            self.errors.push(ParseError::new(message, position));
            false
        }
    }

    fn peek_bp(&self) -> u8 {
        infix_binding_power(self.peek().kind).unwrap_or(bp::LOWEST)
    }

    fn cur_bp(&self) -> u8 {
        infix_binding_power(self.cur().kind).unwrap_or(bp::LOWEST)
    }

    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();
        while !self.cur_is(TokenKind::Eof) {
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
            self.advance();
        }
        Program { statements }
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        if self.cur_is_keyword("let") {
            self.parse_let_statement().map(Statement::Let)
        } else if self.cur_is_keyword("return") {
            self.parse_return_statement().map(Statement::Return)
        } else {
            self.parse_expression_statement().map(Statement::Expression)
        }
    }

    fn parse_let_statement(&mut self) -> Option<LetStatement> {
        let token = self.cur().clone();
        if !self.expect_peek(TokenKind::Identifier, "an identifier") {
            return None;
        }
        let name = Identifier {
            token: self.cur().clone(),
            value: self.cur().literal.clone(),
        };
        if !self.expect_peek(TokenKind::Assign, "'='") {
            return None;
        }
        self.advance();
        let mut value = self.parse_expression(bp::LOWEST)?;
        if let Expression::Function(f) = &mut value {
            if f.name.is_none() {
                f.name = Some(name.value.clone());
            }
        }
        if self.peek_is(TokenKind::Semicolon) {
            self.advance();
        }
        Some(LetStatement { token, name, value })
    }

    fn parse_return_statement(&mut self) -> Option<ReturnStatement> {
        let token = self.cur().clone();
        self.advance();
        let value = self.parse_expression(bp::LOWEST)?;
        if self.peek_is(TokenKind::Semicolon) {
            self.advance();
        }
        Some(ReturnStatement { token, value })
    }

    fn parse_expression_statement(&mut self) -> Option<ExpressionStatement> {
        let token = self.cur().clone();
        let expression = self.parse_expression(bp::LOWEST)?;
        if self.peek_is(TokenKind::Semicolon) {
            self.advance();
        }
        Some(ExpressionStatement { token, expression })
    }

    fn parse_block_statement(&mut self) -> BlockStatement {
        let token = self.cur().clone();
        self.advance();
        let mut statements = Vec::new();
        while !self.cur_is(TokenKind::RBrace) && !self.cur_is(TokenKind::Eof) {
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
            self.advance();
        }
        BlockStatement { token, statements }
    }

    fn parse_expression(&mut self, min_bp: u8) -> Option<Expression> {
        let mut left = self.parse_prefix()?;
        while !self.peek_is(TokenKind::Semicolon) && min_bp < self.peek_bp() {
            self.advance();
            left = match self.cur().kind {
                TokenKind::LParen => self.parse_call_expression(left)?,
                TokenKind::LBracket => self.parse_index_expression(left)?,
                _ => self.parse_infix_expression(left)?,
            };
        }
        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expression> {
        match self.cur().kind {
            TokenKind::Identifier => Some(Expression::Identifier(Identifier {
                token: self.cur().clone(),
                value: self.cur().literal.clone(),
            })),
            TokenKind::Number => self.parse_integer_literal(),
            TokenKind::String => Some(Expression::String(StringLiteral {
                token: self.cur().clone(),
                value: self.cur().literal.clone(),
            })),
            TokenKind::Keyword if self.cur().literal == "true" || self.cur().literal == "false" => {
                Some(Expression::Boolean(BooleanLiteral {
                    token: self.cur().clone(),
                    value: self.cur().literal == "true",
                }))
            }
            TokenKind::Bang | TokenKind::Minus => self.parse_prefix_expression(),
            TokenKind::LParen => self.parse_grouped_expression(),
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_hash_literal(),
            TokenKind::Keyword if self.cur().literal == "if" => self.parse_if_expression(),
            TokenKind::Keyword if self.cur().literal == "fn" => self.parse_function_literal(),
            _ => {
                let position = self.cur().position.clone();
                let message =
                    format!("no prefix parse function for '{}' found", self.cur().literal);
                log::warn!("{message}");
                self.errors.push(ParseError::new(message, position));
                None
            }
        }
    }

    fn parse_integer_literal(&mut self) -> Option<Expression> {
        let token = self.cur().clone();
        match token.literal.parse::<i64>() {
            Ok(value) => Some(Expression::Integer(IntegerLiteral { token, value })),
            Err(_) => {
                let message = format!("could not parse '{}' as integer", token.literal);
                log::warn!("{message}");
                self.errors.push(ParseError::new(message, token.position.clone()));
                None
            }
        }
    }

    fn parse_prefix_expression(&mut self) -> Option<Expression> {
        let token = self.cur().clone();
        let operator = token.literal.clone();
        self.advance();
        let right = self.parse_expression(bp::PREFIX)?;
        Some(Expression::Prefix(PrefixExpression {
            token,
            operator,
            right: Box::new(right),
        }))
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Option<Expression> {
        let token = self.cur().clone();
        let operator = token.literal.clone();
        let precedence = self.cur_bp();
        self.advance();
        let right = self.parse_expression(precedence)?;
        Some(Expression::Infix(InfixExpression {
            token,
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }))
    }

    fn parse_grouped_expression(&mut self) -> Option<Expression> {
        self.advance();
        let expr = self.parse_expression(bp::LOWEST)?;
        if !self.expect_peek(TokenKind::RParen, "')'") {
            return None;
        }
        Some(expr)
    }

    fn parse_if_expression(&mut self) -> Option<Expression> {
        let token = self.cur().clone();
        if !self.expect_peek(TokenKind::LParen, "'('") {
            return None;
        }
        self.advance();
        let condition = self.parse_expression(bp::LOWEST)?;
        if !self.expect_peek(TokenKind::RParen, "')'") {
            return None;
        }
        if !self.expect_peek(TokenKind::LBrace, "'{'") {
            return None;
        }
        let consequence = self.parse_block_statement();
        let alternative = if self.peek_is_keyword("else") {
            self.advance();
            if !self.expect_peek(TokenKind::LBrace, "'{'") {
                return None;
            }
            Some(self.parse_block_statement())
        } else {
            None
        };
        Some(Expression::If(IfExpression {
            token,
            condition: Box::new(condition),
            consequence,
            alternative,
        }))
    }

    fn parse_function_literal(&mut self) -> Option<Expression> {
        let token = self.cur().clone();
        if !self.expect_peek(TokenKind::LParen, "'('") {
            return None;
        }
        let parameters = self.parse_function_parameters()?;
        if !self.expect_peek(TokenKind::LBrace, "'{'") {
            return None;
        }
        let body = self.parse_block_statement();
        Some(Expression::Function(FunctionLiteral {
            token,
            parameters,
            body,
            name: None,
        }))
    }

    fn parse_function_parameters(&mut self) -> Option<Vec<Identifier>> {
        let mut identifiers = Vec::new();
        if self.peek_is(TokenKind::RParen) {
            self.advance();
            return Some(identifiers);
        }
        self.advance();
        identifiers.push(Identifier {
            token: self.cur().clone(),
            value: self.cur().literal.clone(),
        });
        while self.peek_is(TokenKind::Comma) {
            self.advance();
            self.advance();
            identifiers.push(Identifier {
                token: self.cur().clone(),
                value: self.cur().literal.clone(),
            });
        }
        if !self.expect_peek(TokenKind::RParen, "')'") {
            return None;
        }
        Some(identifiers)
    }

    fn parse_call_expression(&mut self, function: Expression) -> Option<Expression> {
        let token = self.cur().clone();
        let arguments = self.parse_expression_list(TokenKind::RParen)?;
        Some(Expression::Call(CallExpression {
            token,
            function: Box::new(function),
            arguments,
        }))
    }

    fn parse_index_expression(&mut self, left: Expression) -> Option<Expression> {
        let token = self.cur().clone();
        self.advance();
        let index = self.parse_expression(bp::LOWEST)?;
        if !self.expect_peek(TokenKind::RBracket, "']'") {
            return None;
        }
        Some(Expression::Index(IndexExpression {
            token,
            left: Box::new(left),
            index: Box::new(index),
        }))
    }

    fn parse_array_literal(&mut self) -> Option<Expression> {
        let token = self.cur().clone();
        let elements = self.parse_expression_list(TokenKind::RBracket)?;
        Some(Expression::Array(ArrayLiteral { token, elements }))
    }

    fn parse_expression_list(&mut self, end: TokenKind) -> Option<Vec<Expression>> {
        let mut list = Vec::new();
        if self.peek_is(end) {
            self.advance();
            return Some(list);
        }
        self.advance();
        list.push(self.parse_expression(bp::LOWEST)?);
        while self.peek_is(TokenKind::Comma) {
            self.advance();
            self.advance();
            list.push(self.parse_expression(bp::LOWEST)?);
        }
        if !self.expect_peek(end, "a closing delimiter") {
            return None;
        }
        Some(list)
    }

    fn parse_hash_literal(&mut self) -> Option<Expression> {
        let token = self.cur().clone();
        let mut pairs = Vec::new();
        while !self.peek_is(TokenKind::RBrace) {
            self.advance();
            let key = self.parse_expression(bp::LOWEST)?;
            if !self.expect_peek(TokenKind::Colon, "':'") {
                return None;
            }
            self.advance();
            let value = self.parse_expression(bp::LOWEST)?;
            pairs.push((key, value));
            if !self.peek_is(TokenKind::RBrace) && !self.expect_peek(TokenKind::Comma, "',' or '}'") {
                return None;
            }
        }
        if !self.expect_peek(TokenKind::RBrace, "'}'") {
            return None;
        }
        Some(Expression::Hash(HashLiteral { token, pairs }))
    }
}

/// Lexes and parses a whole source string in one step.
pub fn parse(source: &str, file: impl Into<Rc<str>>) -> (Program, Vec<ParseError>) {
    let (tokens, lex_errors) = lex(source, file);
    let mut parser = Parser::from_tokens(tokens);
    let program = parser.parse_program();
    let mut errors = parser.errors;
    errors.extend(
        lex_errors
            .into_iter()
            .map(|e| ParseError::new(e.message, e.position)),
    );
    (program, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expression as E;

    fn parse_ok(source: &str) -> Program {
        let (program, errors) = parse(source, "test.mo");
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        program
    }

    #[test]
    fn parses_let_statements() {
        let program = parse_ok("let x = 5; let y = 10; let foobar = 838383;");
        assert_eq!(program.statements.len(), 3);
        for (stmt, name) in program.statements.iter().zip(["x", "y", "foobar"]) {
            match stmt {
                Statement::Let(let_stmt) => assert_eq!(let_stmt.name.value, name),
                other => panic!("expected let statement, got {other:?}"),
            }
        }
    }

    #[test]
    fn parses_return_statements() {
        let program = parse_ok("return 5; return 10; return 993322;");
        assert_eq!(program.statements.len(), 3);
        for stmt in &program.statements {
            assert!(matches!(stmt, Statement::Return(_)));
        }
    }

    #[test]
    fn operator_precedence_matches_expected_grouping() {
        let cases = [
            ("-a * b", "((-a) * b)"),
            ("!-a", "(!(-a))"),
            ("a + b + c", "((a + b) + c)"),
            ("a + b - c", "((a + b) - c)"),
            ("a * b * c", "((a * b) * c)"),
            ("a * b / c", "((a * b) / c)"),
            ("a + b / c", "(a + (b / c))"),
            ("a + b * c + d / e - f", "(((a + (b * c)) + (d / e)) - f)"),
            ("3 + 4; -5 * 5", "(3 + 4)((-5) * 5)"),
            ("5 > 4 == 3 < 4", "((5 > 4) == (3 < 4))"),
            ("5 < 4 != 3 > 4", "((5 < 4) != (3 > 4))"),
            (
                "3 + 4 * 5 == 3 * 1 + 4 * 5",
                "((3 + (4 * 5)) == ((3 * 1) + (4 * 5)))",
            ),
            ("1 + (2 + 3) + 4", "((1 + (2 + 3)) + 4)"),
            ("(5 + 5) * 2", "((5 + 5) * 2)"),
            ("2 / (5 + 5)", "(2 / (5 + 5))"),
            ("-(5 + 5)", "(-(5 + 5))"),
            ("!(true == true)", "(!(true == true))"),
            ("a + add(b * c) + d", "((a + add((b * c))) + d)"),
            (
                "add(a, b, 1, 2 * 3, 4 + 5, add(6, 7 * 8))",
                "add(a, b, 1, (2 * 3), (4 + 5), add(6, (7 * 8)))",
            ),
            ("a * [1, 2, 3, 4][b * c] * d", "((a * ([1, 2, 3, 4][(b * c)])) * d)"),
            (
                "add(a * b[2], b[1], 2 * [1, 2][1])",
                "add((a * (b[2])), (b[1]), (2 * ([1, 2][1])))",
            ),
        ];
        for (source, expected) in cases {
            let program = parse_ok(source);
            assert_eq!(program.to_string(), expected, "source: {source}");
        }
    }

    #[test]
    fn parses_if_expression_without_else() {
        let program = parse_ok("if (x < y) { x }");
        let stmt = &program.statements[0];
        let Statement::Expression(ExpressionStatement { expression, .. }) = stmt else {
            panic!("expected expression statement");
        };
        let E::If(if_expr) = expression else {
            panic!("expected if expression");
        };
        assert!(if_expr.alternative.is_none());
    }

    #[test]
    fn parses_if_else_expression() {
        let program = parse_ok("if (x < y) { x } else { y }");
        let stmt = &program.statements[0];
        let Statement::Expression(ExpressionStatement { expression, .. }) = stmt else {
            panic!("expected expression statement");
        };
        let E::If(if_expr) = expression else {
            panic!("expected if expression");
        };
        assert!(if_expr.alternative.is_some());
    }

    #[test]
    fn parses_function_literal_parameters() {
        let program = parse_ok("fn(x, y) { x + y; }");
        let Statement::Expression(ExpressionStatement { expression, .. }) = &program.statements[0]
        else {
            panic!("expected expression statement");
        };
        let E::Function(f) = expression else {
            panic!("expected function literal");
        };
        assert_eq!(f.parameters.len(), 2);
        assert_eq!(f.parameters[0].value, "x");
        assert_eq!(f.parameters[1].value, "y");
    }

    #[test]
    fn let_binding_names_a_function_literal_for_diagnostics() {
        let program = parse_ok("let add = fn(a, b) { a + b; };");
        let Statement::Let(let_stmt) = &program.statements[0] else {
            panic!("expected let statement");
        };
        let E::Function(f) = &let_stmt.value else {
            panic!("expected function literal value");
        };
        assert_eq!(f.name.as_deref(), Some("add"));
    }

    #[test]
    fn parses_call_expression_arguments() {
        let program = parse_ok("add(1, 2 * 3, 4 + 5);");
        let Statement::Expression(ExpressionStatement { expression, .. }) = &program.statements[0]
        else {
            panic!("expected expression statement");
        };
        let E::Call(call) = expression else {
            panic!("expected call expression");
        };
        assert_eq!(call.arguments.len(), 3);
    }

    #[test]
    fn parses_string_literal() {
        let program = parse_ok(r#""hello world";"#);
        let Statement::Expression(ExpressionStatement { expression, .. }) = &program.statements[0]
        else {
            panic!("expected expression statement");
        };
        let E::String(s) = expression else {
            panic!("expected string literal");
        };
        assert_eq!(s.value, "hello world");
    }

    #[test]
    fn parses_array_literal() {
        let program = parse_ok("[1, 2 * 2, 3 + 3]");
        let Statement::Expression(ExpressionStatement { expression, .. }) = &program.statements[0]
        else {
            panic!("expected expression statement");
        };
        let E::Array(arr) = expression else {
            panic!("expected array literal");
        };
        assert_eq!(arr.elements.len(), 3);
    }

    #[test]
    fn parses_hash_literal_with_expression_values() {
        let program = parse_ok(r#"{"one": 0 + 1, "two": 10 - 8, "three": 15 / 5}"#);
        let Statement::Expression(ExpressionStatement { expression, .. }) = &program.statements[0]
        else {
            panic!("expected expression statement");
        };
        let E::Hash(hash) = expression else {
            panic!("expected hash literal");
        };
        assert_eq!(hash.pairs.len(), 3);
    }

    #[test]
    fn parses_empty_hash_literal() {
        let program = parse_ok("{}");
        let Statement::Expression(ExpressionStatement { expression, .. }) = &program.statements[0]
        else {
            panic!("expected expression statement");
        };
        assert!(matches!(expression, E::Hash(h) if h.pairs.is_empty()));
    }

    #[test]
    fn parses_index_expression() {
        let program = parse_ok("myArray[1 + 1]");
        let Statement::Expression(ExpressionStatement { expression, .. }) = &program.statements[0]
        else {
            panic!("expected expression statement");
        };
        assert!(matches!(expression, E::Index(_)));
    }

    #[test]
    fn reports_error_for_missing_identifier_after_let() {
        let (_program, errors) = parse("let = 5;", "test.mo");
        assert!(!errors.is_empty());
    }

    #[test]
    fn reports_error_for_unterminated_grouped_expression() {
        let (_program, errors) = parse("(1 + 2", "test.mo");
        assert!(!errors.is_empty());
    }
}
