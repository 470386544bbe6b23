//! Formula parser
//!
//! A recursive descent parser for spreadsheet formulas with Excel operator
//! precedence.

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use cellforge_core::{CellAddress, CellError, CellRange};

/// Prefixes Excel writes in front of newer function names in the file format
const FUNCTION_PREFIXES: &[&str] = &["_XLFN._XLWS.", "_XLFN.", "_XLWS."];

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use cellforge_formula::parse_formula;
///
/// assert!(parse_formula("=1+2").is_ok());
/// assert!(parse_formula("=SUM('Q1 Data'!A1:A10)").is_ok());
/// assert!(parse_formula("=IF(A1>0,\"Yes\",\"No\")").is_ok());
/// assert!(parse_formula("1+2").is_err());
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let formula = formula
        .trim()
        .strip_prefix('=')
        .ok_or_else(|| FormulaError::Parse("Formula must start with '='".into()))?;

    parse_expression_text(formula)
}

/// Parse expression text that has no leading `=` (e.g. a defined name's target)
pub fn parse_expression_text(text: &str) -> FormulaResult<FormulaExpr> {
    let mut parser = FormulaParser::new(text);
    let expr = parser.parse_expression()?;

    if !matches!(parser.current_token(), Token::Eof) {
        return Err(FormulaError::Parse(format!(
            "Unexpected {:?} after expression",
            parser.current_token()
        )));
    }

    Ok(expr)
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),

    // Identifiers and references
    Identifier(String),
    CellRef(String),
    SheetRef(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,
    Comma,
    Semicolon,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,

    /// Text the scanner could not tokenize
    Invalid(String),

    Eof,
}

struct FormulaParser<'a> {
    input: &'a str,
    pos: usize,
    current_token: Token,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str) -> Self {
        let mut parser = Self {
            input,
            pos: 0,
            current_token: Token::Eof,
        };
        parser.advance_token();
        parser
    }

    // === Token scanning ===

    fn advance_token(&mut self) {
        self.current_token = self.scan_token();
    }

    fn scan_token(&mut self) -> Token {
        self.skip_whitespace();

        let Some(c) = self.peek_char() else {
            return Token::Eof;
        };

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '%' => Some(Token::Percent),
            '&' => Some(Token::Ampersand),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            '=' => Some(Token::Equal),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return token;
        }

        match c {
            '<' => {
                self.advance();
                match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        Token::LessEqual
                    }
                    Some('>') => {
                        self.advance();
                        Token::NotEqual
                    }
                    _ => Token::LessThan,
                }
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    Token::GreaterEqual
                } else {
                    Token::GreaterThan
                }
            }
            '"' => self.scan_string(),
            '\'' => self.scan_quoted_sheet(),
            c if c.is_ascii_digit()
                || (c == '.' && self.peek_char_at(1).map_or(false, |d| d.is_ascii_digit())) =>
            {
                self.scan_number()
            }
            c if c.is_alphabetic() || c == '_' || c == '\\' || c == '$' || c == '#' => {
                self.scan_identifier_or_ref()
            }
            other => {
                self.advance();
                Token::Invalid(other.to_string())
            }
        }
    }

    fn scan_string(&mut self) -> Token {
        self.advance(); // opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    s.push('"');
                    self.advance();
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    return Token::String(s);
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => return Token::Invalid(format!("unterminated string \"{}", s)),
            }
        }
    }

    /// `'Sheet name'!` with `''` as an escaped quote
    fn scan_quoted_sheet(&mut self) -> Token {
        self.advance(); // opening quote

        let mut name = String::new();
        loop {
            match self.peek_char() {
                Some('\'') if self.peek_char_at(1) == Some('\'') => {
                    name.push('\'');
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
                None => return Token::Invalid(format!("unterminated sheet name '{}", name)),
            }
        }

        if self.peek_char() == Some('!') {
            self.advance();
            Token::SheetRef(name)
        } else {
            Token::Invalid(format!("'{}' is not followed by '!'", name))
        }
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;

        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek_char(), Some('e' | 'E'))
            && self
                .peek_char_at(1)
                .map_or(false, |c| c.is_ascii_digit() || c == '+' || c == '-')
        {
            self.advance();
            if matches!(self.peek_char(), Some('+' | '-')) {
                self.advance();
            }
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = &self.input[start..self.pos];
        match text.parse::<f64>() {
            Ok(n) => Token::Number(n),
            Err(_) => Token::Invalid(text.to_string()),
        }
    }

    fn scan_identifier_or_ref(&mut self) -> Token {
        // Error literals (#VALUE!, #N/A, ...)
        if self.peek_char() == Some('#') {
            let start = self.pos;
            self.advance();
            while self
                .peek_char()
                .map_or(false, |c| c.is_ascii_alphanumeric() || matches!(c, '!' | '/' | '?'))
            {
                self.advance();
            }
            let text = &self.input[start..self.pos];
            return match CellError::parse(text) {
                Some(err) => Token::Error(err),
                None => Token::Invalid(text.to_string()),
            };
        }

        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '\\'))
        {
            self.advance();
        }
        let text = &self.input[start..self.pos];

        if self.peek_char() == Some('!') {
            self.advance();
            return Token::SheetRef(text.to_string());
        }

        // TRUE( / FALSE( are function calls
        let followed_by_paren = self.peek_char() == Some('(');
        if !followed_by_paren {
            if text.eq_ignore_ascii_case("TRUE") {
                return Token::Boolean(true);
            }
            if text.eq_ignore_ascii_case("FALSE") {
                return Token::Boolean(false);
            }
            // LOG10( is a function, LOG10 alone is a cell
            if CellAddress::parse(text).is_ok() {
                return Token::CellRef(text.to_string());
            }
        }

        Token::Identifier(text.to_string())
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, char::is_whitespace) {
            self.advance();
        }
    }

    fn current_token(&self) -> &Token {
        &self.current_token
    }

    fn consume(&mut self) -> Token {
        let token = std::mem::replace(&mut self.current_token, Token::Eof);
        self.advance_token();
        token
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume();
            Ok(())
        } else {
            Err(FormulaError::Parse(format!(
                "Expected {:?}, got {:?}",
                expected,
                self.current_token()
            )))
        }
    }

    // === Expression parsing with precedence ===
    // Lowest to highest:
    // comparison, &, + -, * /, ^ (right-assoc), unary - + and postfix %, :, primary

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current_token() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };
            self.consume();
            let right = self.parse_concatenation()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while matches!(self.current_token(), Token::Ampersand) {
            self.consume();
            let right = self.parse_additive()?;
            left = binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.consume();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };
            self.consume();
            let right = self.parse_exponent()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_unary()?;

        if matches!(self.current_token(), Token::Caret) {
            self.consume();
            let right = self.parse_exponent()?;
            return Ok(binary(BinaryOperator::Power, left, right));
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current_token() {
            Token::Minus => {
                self.consume();
                let operand = self.parse_unary()?;
                return Ok(FormulaExpr::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: Box::new(operand),
                });
            }
            Token::Plus => {
                self.consume();
                return self.parse_unary();
            }
            _ => {}
        }

        let mut expr = self.parse_range()?;
        while matches!(self.current_token(), Token::Percent) {
            self.consume();
            expr = FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                operand: Box::new(expr),
            };
        }

        Ok(expr)
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_primary()?;

        if !matches!(self.current_token(), Token::Colon) {
            return Ok(left);
        }
        self.consume();
        let right = self.parse_primary()?;

        match (&left, &right) {
            (FormulaExpr::CellRef(start), FormulaExpr::CellRef(end)) => {
                let sheet = match (&start.sheet, &end.sheet) {
                    (Some(a), Some(b)) if !a.eq_ignore_ascii_case(b) => {
                        return Err(FormulaError::Parse(format!(
                            "3D references are not supported: {}:{}",
                            a, b
                        )));
                    }
                    (Some(a), _) => Some(a.clone()),
                    (None, b) => b.clone(),
                };
                Ok(FormulaExpr::RangeRef(RangeReference {
                    sheet,
                    range: CellRange::new(start.address, end.address),
                }))
            }
            _ => match line_range(None, &left, &right) {
                Some(range) => Ok(range),
                None => Ok(binary(BinaryOperator::Range, left, right)),
            },
        }
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.consume() {
            Token::Number(n) => Ok(FormulaExpr::Number(n)),
            Token::String(s) => Ok(FormulaExpr::String(s)),
            Token::Boolean(b) => Ok(FormulaExpr::Boolean(b)),
            Token::Error(e) => Ok(FormulaExpr::Error(e)),

            Token::LeftParen => {
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::LeftBrace => self.parse_array(),

            Token::SheetRef(sheet) => match self.consume() {
                Token::CellRef(text) => cell_reference(Some(sheet), &text),
                // Sheet1!A:C, Sheet1!2:5
                start @ (Token::Identifier(_) | Token::Number(_))
                    if matches!(self.current_token(), Token::Colon) =>
                {
                    self.consume();
                    let end = self.consume();
                    line_range(Some(sheet.clone()), &line_operand(start), &line_operand(end))
                        .ok_or_else(|| {
                            FormulaError::Parse(format!("Invalid range after '{}!'", sheet))
                        })
                }
                // Sheet1!#REF! as written by Excel after a deleted cell
                Token::Error(CellError::Ref) => Ok(FormulaExpr::Error(CellError::Ref)),
                other => Err(FormulaError::Parse(format!(
                    "Expected cell reference after '{}!', got {:?}",
                    sheet, other
                ))),
            },

            Token::CellRef(text) => cell_reference(None, &text),

            Token::Identifier(name) => {
                if matches!(self.current_token(), Token::LeftParen) {
                    self.parse_function_call(&name)
                } else {
                    Ok(FormulaExpr::NameRef(name))
                }
            }

            Token::Invalid(text) => Err(FormulaError::Parse(format!(
                "Unrecognized input '{}'",
                text
            ))),

            other => Err(FormulaError::Parse(format!("Unexpected token: {:?}", other))),
        }
    }

    fn parse_array(&mut self) -> FormulaResult<FormulaExpr> {
        let mut rows = Vec::new();
        let mut current_row = Vec::new();

        if !matches!(self.current_token(), Token::RightBrace) {
            current_row.push(self.parse_array_element()?);

            loop {
                match self.current_token() {
                    Token::Comma => {
                        self.consume();
                        current_row.push(self.parse_array_element()?);
                    }
                    Token::Semicolon => {
                        self.consume();
                        rows.push(std::mem::take(&mut current_row));
                        current_row.push(self.parse_array_element()?);
                    }
                    Token::RightBrace => break,
                    other => {
                        return Err(FormulaError::Parse(format!(
                            "Expected ',' ';' or '}}' in array, got {:?}",
                            other
                        )))
                    }
                }
            }
        }

        if !current_row.is_empty() {
            rows.push(current_row);
        }
        if rows.windows(2).any(|w| w[0].len() != w[1].len()) {
            return Err(FormulaError::Parse("Array rows have different lengths".into()));
        }

        self.expect(&Token::RightBrace)?;
        Ok(FormulaExpr::Array(rows))
    }

    /// Array constants hold literals only
    fn parse_array_element(&mut self) -> FormulaResult<FormulaExpr> {
        let expr = self.parse_unary()?;
        match &expr {
            FormulaExpr::Number(_)
            | FormulaExpr::String(_)
            | FormulaExpr::Boolean(_)
            | FormulaExpr::Error(_) => Ok(expr),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand,
            } if matches!(**operand, FormulaExpr::Number(_)) => Ok(expr),
            _ => Err(FormulaError::Parse(format!(
                "Array constants may only contain literals, found {}",
                expr
            ))),
        }
    }

    fn parse_function_call(&mut self, name: &str) -> FormulaResult<FormulaExpr> {
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();
        if !matches!(self.current_token(), Token::RightParen) {
            args.push(self.parse_argument()?);
            while matches!(self.current_token(), Token::Comma) {
                self.consume();
                args.push(self.parse_argument()?);
            }
        }

        self.expect(&Token::RightParen)?;

        Ok(FormulaExpr::Function {
            name: normalize_function_name(name),
            args,
        })
    }

    fn parse_argument(&mut self) -> FormulaResult<FormulaExpr> {
        if matches!(self.current_token(), Token::Comma | Token::RightParen) {
            return Ok(FormulaExpr::Missing);
        }
        self.parse_expression()
    }
}

fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
    FormulaExpr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn cell_reference(sheet: Option<String>, text: &str) -> FormulaResult<FormulaExpr> {
    let address = CellAddress::parse(text).map_err(|e| {
        FormulaError::Parse(format!("Invalid cell reference '{}': {}", text, e))
    })?;
    Ok(FormulaExpr::CellRef(CellReference { sheet, address }))
}

/// The side of a `start:end` pair as the expression it parsed to
fn line_operand(token: Token) -> FormulaExpr {
    match token {
        Token::Identifier(name) => FormulaExpr::NameRef(name),
        Token::Number(n) => FormulaExpr::Number(n),
        _ => FormulaExpr::Error(CellError::Ref),
    }
}

/// `A:C` or `2:5` when both sides are column letters or row numbers
fn line_range(sheet: Option<String>, start: &FormulaExpr, end: &FormulaExpr) -> Option<FormulaExpr> {
    fn label(expr: &FormulaExpr) -> Option<String> {
        match expr {
            FormulaExpr::NameRef(name) => Some(name.clone()),
            FormulaExpr::Number(n) if n.fract() == 0.0 && *n >= 1.0 => Some(format!("{}", *n as u64)),
            _ => None,
        }
    }
    let range = CellRange::parse_lines(&label(start)?, &label(end)?)?;
    Some(FormulaExpr::RangeRef(RangeReference { sheet, range }))
}

/// Upper-case a function name and drop Excel's storage prefixes
pub fn normalize_function_name(name: &str) -> String {
    let upper = name.to_uppercase();
    for prefix in FUNCTION_PREFIXES {
        if let Some(rest) = upper.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    upper
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cell(sheet: Option<&str>, a1: &str) -> FormulaExpr {
        FormulaExpr::CellRef(CellReference {
            sheet: sheet.map(str::to_string),
            address: CellAddress::parse(a1).unwrap(),
        })
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_formula("=42").unwrap(), FormulaExpr::Number(42.0));
        assert_eq!(parse_formula("=.5").unwrap(), FormulaExpr::Number(0.5));
        assert_eq!(parse_formula("=1e3").unwrap(), FormulaExpr::Number(1000.0));
        assert_eq!(
            parse_formula("=\"Hello \"\"World\"\"\"").unwrap(),
            FormulaExpr::String("Hello \"World\"".into())
        );
        assert_eq!(parse_formula("=true").unwrap(), FormulaExpr::Boolean(true));
        assert_eq!(
            parse_formula("=#DIV/0!").unwrap(),
            FormulaExpr::Error(CellError::Div0)
        );
    }

    #[test]
    fn test_precedence() {
        let ast = parse_formula("=1+2*3").unwrap();
        assert_eq!(
            ast,
            binary(
                BinaryOperator::Add,
                FormulaExpr::Number(1.0),
                binary(
                    BinaryOperator::Multiply,
                    FormulaExpr::Number(2.0),
                    FormulaExpr::Number(3.0)
                )
            )
        );

        // comparison binds loosest
        let ast = parse_formula("=A1&\"x\"=B1").unwrap();
        assert!(matches!(
            ast,
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Equal,
                ..
            }
        ));
    }

    #[test]
    fn test_exponent_is_right_associative() {
        let ast = parse_formula("=2^3^2").unwrap();
        assert_eq!(
            ast,
            binary(
                BinaryOperator::Power,
                FormulaExpr::Number(2.0),
                binary(
                    BinaryOperator::Power,
                    FormulaExpr::Number(3.0),
                    FormulaExpr::Number(2.0)
                )
            )
        );
    }

    #[test]
    fn test_references_keep_anchors() {
        let ast = parse_formula("=$B$2").unwrap();
        if let FormulaExpr::CellRef(r) = ast {
            assert_eq!((r.address.row, r.address.col), (1, 1));
            assert!(r.address.row_absolute && r.address.col_absolute);
        } else {
            panic!("Expected CellRef");
        }
    }

    #[test]
    fn test_sheet_qualified_references() {
        assert_eq!(
            parse_formula("=Data!B3").unwrap(),
            cell(Some("Data"), "B3")
        );
        assert_eq!(
            parse_formula("='Q1 ''24'!A1").unwrap(),
            cell(Some("Q1 '24"), "A1")
        );

        let ast = parse_formula("='My Sheet'!A1:B2").unwrap();
        if let FormulaExpr::RangeRef(r) = ast {
            assert_eq!(r.sheet.as_deref(), Some("My Sheet"));
            assert_eq!(r.range.to_string(), "A1:B2");
        } else {
            panic!("Expected RangeRef");
        }

        assert!(parse_formula("=Sheet1!A1:Sheet2!B2").is_err());
    }

    #[test]
    fn test_function_calls() {
        let ast = parse_formula("=sum(A1:A3, 4)").unwrap();
        if let FormulaExpr::Function { name, args } = ast {
            assert_eq!(name, "SUM");
            assert_eq!(args.len(), 2);
            assert!(matches!(args[0], FormulaExpr::RangeRef(_)));
        } else {
            panic!("Expected Function");
        }

        let ast = parse_formula("=_xlfn.CONCAT(\"a\",\"b\")").unwrap();
        assert!(matches!(ast, FormulaExpr::Function { ref name, .. } if name == "CONCAT"));

        let ast = parse_formula("=LOG10(100)").unwrap();
        assert!(matches!(ast, FormulaExpr::Function { ref name, .. } if name == "LOG10"));

        let ast = parse_formula("=PI()").unwrap();
        assert!(matches!(ast, FormulaExpr::Function { ref args, .. } if args.is_empty()));
    }

    #[test]
    fn test_omitted_argument() {
        let ast = parse_formula("=IF(A1,,2)").unwrap();
        if let FormulaExpr::Function { args, .. } = ast {
            assert_eq!(args[1], FormulaExpr::Missing);
        } else {
            panic!("Expected Function");
        }
        assert_eq!(parse_formula("=SUM(A1:A3,)").unwrap().to_string(), "SUM(A1:A3,)");
        assert_eq!(parse_formula("=IF(A1,,2)").unwrap().to_string(), "IF(A1,,2)");
    }

    #[test]
    fn test_whole_column_and_row_references() {
        let whole = |formula: &str| match parse_formula(formula).unwrap() {
            FormulaExpr::Function { mut args, .. } => match args.remove(0) {
                FormulaExpr::RangeRef(r) => r,
                other => panic!("{} gave {:?}", formula, other),
            },
            FormulaExpr::RangeRef(r) => r,
            other => panic!("{} gave {:?}", formula, other),
        };

        let column = whole("=SUM(A:A)");
        assert_eq!(column.sheet, None);
        assert_eq!(column.range.start.position(), (0, 0));
        assert_eq!(column.range.end.position(), (1_048_575, 0));
        assert_eq!(column.to_string(), "A:A");

        let columns = whole("=SUM($B:D)");
        assert_eq!(columns.range.end.position(), (1_048_575, 3));
        assert_eq!(columns.to_string(), "$B:D");

        let rows = whole("=SUM(2:$3)");
        assert_eq!(rows.range.start.position(), (1, 0));
        assert_eq!(rows.range.end.position(), (2, 16_383));
        assert_eq!(rows.to_string(), "2:$3");

        let qualified = whole("=COUNT('My Data'!C:C)");
        assert_eq!(qualified.sheet.as_deref(), Some("My Data"));
        assert_eq!(qualified.to_string(), "'My Data'!C:C");
        assert_eq!(whole("=Data!1:1").range.end.position(), (0, 16_383));

        // not columns or rows: a plain range operator
        assert!(matches!(
            parse_formula("=Total:Other").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Range,
                ..
            }
        ));
        assert!(parse_formula("=Data!A:1").is_err());
    }

    #[test]
    fn test_names_and_arrays() {
        assert_eq!(
            parse_formula("=TaxRate").unwrap(),
            FormulaExpr::NameRef("TaxRate".into())
        );

        let ast = parse_formula("={1,2;3,-4}").unwrap();
        if let FormulaExpr::Array(rows) = ast {
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[1].len(), 2);
        } else {
            panic!("Expected Array");
        }

        assert!(parse_formula("={1,2;3}").is_err());
        assert!(parse_formula("={A1}").is_err());
    }

    #[test]
    fn test_unary_and_percent() {
        let ast = parse_formula("=-A1%").unwrap();
        assert!(matches!(
            ast,
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                ..
            }
        ));
        assert_eq!(parse_formula("=+5").unwrap(), FormulaExpr::Number(5.0));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_formula("=").is_err());
        assert!(parse_formula("=1+").is_err());
        assert!(parse_formula("=(1+2").is_err());
        assert!(parse_formula("=SUM(1,2").is_err());
        assert!(parse_formula("=\"open").is_err());
        assert!(parse_formula("=1 2").is_err());
        assert!(parse_formula("=1@2").is_err());
    }
}
