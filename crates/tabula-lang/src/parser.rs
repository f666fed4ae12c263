use crate::lexer::{Lexer, Span, Token, TokenKind};
use tabula_solver::{Problem, Relation, SolverError, VarType};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token: expected {expected}, found {found} at position {span:?}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("Unexpected end of file")]
    UnexpectedEof,
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("Unknown restriction '{token}' at position {span:?}; expected +, -, urs, int or bin")]
    UnknownRestriction { token: String, span: Span },
    #[error("Line {line}: expected {expected} coefficients, found {found}")]
    CoefficientCount {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("Expected {expected} restrictions, found {found}")]
    RestrictionCount { expected: usize, found: usize },
    #[error("A problem needs an objective line and a restriction line")]
    MissingLines,
    #[error(transparent)]
    Problem(#[from] SolverError),
}

/// The tokens of one non-blank source line.
#[derive(Debug, Clone)]
struct Line {
    /// 1-based source line number
    number: usize,
    tokens: Vec<Token>,
}

/// Line-oriented parser for the problem text format:
///
/// ```text
/// max + 3 + 5
/// + 1 + 0 <= 4
/// + 0 + 2 <= 12
/// + 3 + 2 <= 18
/// + +
/// ```
///
/// The first line is the objective, the last line holds one restriction per
/// variable and every line in between is a constraint.
pub struct Parser {
    lines: Vec<Line>,
    line: usize,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut lines = Vec::new();
        let mut current = Vec::new();
        let mut number = 1;
        for token in tokens {
            match token.kind {
                TokenKind::Newline | TokenKind::Eof => {
                    if !current.is_empty() {
                        lines.push(Line {
                            number,
                            tokens: std::mem::take(&mut current),
                        });
                    }
                    number += 1;
                }
                TokenKind::Comment => {}
                _ => current.push(token),
            }
        }
        Self { lines, line: 0, pos: 0 }
    }

    pub fn parse(source: &str) -> Result<Problem, ParseError> {
        let tokens = Lexer::tokenize(source);
        let mut parser = Parser::new(tokens);
        parser.parse_problem()
    }

    fn current(&self) -> Option<&Token> {
        self.lines.get(self.line).and_then(|l| l.tokens.get(self.pos))
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.current().map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.current().cloned();
        self.pos += 1;
        token
    }

    fn next_line(&mut self) {
        self.line += 1;
        self.pos = 0;
    }

    fn line_number(&self) -> usize {
        self.lines.get(self.line).map(|l| l.number).unwrap_or(0)
    }

    /// Span just past the last token of the current line.
    fn line_end(&self) -> Span {
        let end = self
            .lines
            .get(self.line)
            .and_then(|l| l.tokens.last())
            .map(|t| t.span.end)
            .unwrap_or(0);
        Span::new(end, end)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.current() {
            Some(t) => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: format!("'{}'", t.text),
                span: t.span,
            },
            None => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: "end of line".to_string(),
                span: self.line_end(),
            },
        }
    }

    fn expect_end_of_line(&self) -> Result<(), ParseError> {
        match self.current() {
            None => Ok(()),
            Some(_) => Err(self.unexpected("end of line")),
        }
    }

    fn parse_problem(&mut self) -> Result<Problem, ParseError> {
        match self.lines.len() {
            0 => return Err(ParseError::UnexpectedEof),
            1 => return Err(ParseError::MissingLines),
            _ => {}
        }

        let mut problem = self.parse_objective()?;
        let n = problem.num_variables();
        self.next_line();

        while self.line + 1 < self.lines.len() {
            let (coefficients, relation, rhs) = self.parse_constraint(n)?;
            problem.add_constraint(coefficients, relation, rhs)?;
            self.next_line();
        }

        let types = self.parse_restrictions(n)?;
        Ok(problem.with_types(&types)?)
    }

    fn parse_objective(&mut self) -> Result<Problem, ParseError> {
        let maximize = match self.peek_kind() {
            Some(TokenKind::Max) => true,
            Some(TokenKind::Min) => false,
            _ => return Err(self.unexpected("'max' or 'min'")),
        };
        self.advance();

        let coefficients = self.parse_pairs()?;
        if coefficients.is_empty() {
            return Err(self.unexpected("'+' or '-'"));
        }
        self.expect_end_of_line()?;

        Ok(if maximize {
            Problem::maximize(coefficients)
        } else {
            Problem::minimize(coefficients)
        })
    }

    fn parse_constraint(&mut self, n: usize) -> Result<(Vec<f64>, Relation, f64), ParseError> {
        let coefficients = self.parse_pairs()?;
        if coefficients.len() != n {
            return Err(ParseError::CoefficientCount {
                line: self.line_number(),
                expected: n,
                found: coefficients.len(),
            });
        }

        let relation = match self.peek_kind() {
            Some(TokenKind::Le) => Relation::Le,
            Some(TokenKind::Ge) => Relation::Ge,
            Some(TokenKind::Eq) => Relation::Eq,
            _ => return Err(self.unexpected("'<=', '>=' or '='")),
        };
        self.advance();

        let sign = match self.peek_kind() {
            Some(TokenKind::Minus) => {
                self.advance();
                -1.0
            }
            Some(TokenKind::Plus) => {
                self.advance();
                1.0
            }
            _ => 1.0,
        };
        let rhs = sign * self.parse_number()?;
        self.expect_end_of_line()?;

        Ok((coefficients, relation, rhs))
    }

    /// `(sign, value)` pairs until something other than a sign shows up.
    fn parse_pairs(&mut self) -> Result<Vec<f64>, ParseError> {
        let mut values = Vec::new();
        loop {
            let sign = match self.peek_kind() {
                Some(TokenKind::Plus) => 1.0,
                Some(TokenKind::Minus) => -1.0,
                _ => break,
            };
            self.advance();
            values.push(sign * self.parse_number()?);
        }
        Ok(values)
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        if self.peek_kind() != Some(TokenKind::Number) {
            return Err(self.unexpected("number"));
        }
        let token = self.advance().ok_or(ParseError::UnexpectedEof)?;
        token
            .text
            .parse::<f64>()
            .map_err(|_| ParseError::InvalidNumber(token.text.clone()))
    }

    fn parse_restrictions(&mut self, n: usize) -> Result<Vec<VarType>, ParseError> {
        let mut types = Vec::with_capacity(n);
        while let Some(token) = self.advance() {
            let var_type = match token.kind {
                TokenKind::Plus => VarType::NonNegative,
                TokenKind::Minus => VarType::NonPositive,
                TokenKind::Urs => VarType::Unrestricted,
                TokenKind::Int => VarType::Integer,
                TokenKind::Bin => VarType::Binary,
                _ => {
                    return Err(ParseError::UnknownRestriction {
                        token: token.text,
                        span: token.span,
                    });
                }
            };
            types.push(var_type);
        }

        if types.len() != n {
            return Err(ParseError::RestrictionCount {
                expected: n,
                found: types.len(),
            });
        }
        Ok(types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_solver::Sense;

    const TEXTBOOK: &str = "max + 3 + 5\n+ 1 + 0 <= 4\n+ 0 + 2 <= 12\n+ 3 + 2 <= 18\n+ +\n";

    #[test]
    fn test_parse_textbook() {
        let problem = Parser::parse(TEXTBOOK).unwrap();

        assert_eq!(problem.sense, Sense::Maximize);
        assert_eq!(problem.objective_coefficients(), vec![3.0, 5.0]);
        assert_eq!(problem.num_constraints(), 3);
        assert_eq!(problem.constraints[2].coefficients, vec![3.0, 2.0]);
        assert_eq!(problem.constraints[2].relation, Relation::Le);
        assert_eq!(problem.constraints[2].rhs, 18.0);
        assert!(problem.variables.iter().all(|v| v.var_type == VarType::NonNegative));
    }

    #[test]
    fn test_signs_relations_and_restrictions() {
        let source = "// mixed problem\nmin - 1.5 + 2\n\n+ 1 - 1 >= -2   // negative rhs\n+ 2 + 1 = 6\n- 0 + 1 <= + 3\nint urs\n";
        let problem = Parser::parse(source).unwrap();

        assert_eq!(problem.sense, Sense::Minimize);
        assert_eq!(problem.objective_coefficients(), vec![-1.5, 2.0]);
        assert_eq!(problem.constraints[0].relation, Relation::Ge);
        assert_eq!(problem.constraints[0].rhs, -2.0);
        assert_eq!(problem.constraints[1].relation, Relation::Eq);
        assert_eq!(problem.constraints[2].rhs, 3.0);
        assert_eq!(problem.variables[0].var_type, VarType::Integer);
        assert_eq!(problem.variables[1].var_type, VarType::Unrestricted);
    }

    #[test]
    fn test_binary_and_nonpositive() {
        let problem = Parser::parse("max + 1 + 1\n+ 1 + 1 <= 1\nbin -").unwrap();
        assert_eq!(problem.variables[0].var_type, VarType::Binary);
        assert_eq!(problem.variables[1].var_type, VarType::NonPositive);
    }

    #[test]
    fn test_no_constraints() {
        let problem = Parser::parse("min + 1\n+").unwrap();
        assert_eq!(problem.num_variables(), 1);
        assert_eq!(problem.num_constraints(), 0);
    }

    #[test]
    fn test_unknown_restriction() {
        let err = Parser::parse("max + 1 + 1\n+ 1 + 1 <= 4\n+ free").unwrap_err();
        assert!(
            matches!(err, ParseError::UnknownRestriction { ref token, .. } if token == "free"),
            "got {:?}",
            err
        );
    }

    #[test]
    fn test_restriction_count() {
        let err = Parser::parse("max + 1 + 1\n+ 1 + 1 <= 4\n+").unwrap_err();
        assert_eq!(err, ParseError::RestrictionCount { expected: 2, found: 1 });
    }

    #[test]
    fn test_coefficient_count() {
        let err = Parser::parse("max + 1 + 1\n\n+ 1 <= 4\n+ +").unwrap_err();
        assert_eq!(
            err,
            ParseError::CoefficientCount {
                line: 3,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_missing_relation() {
        let err = Parser::parse("max + 1\n+ 1 4\n+").unwrap_err();
        match err {
            ParseError::UnexpectedToken { expected, found, .. } => {
                assert_eq!(expected, "'<=', '>=' or '='");
                assert_eq!(found, "'4'");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_objective_sense() {
        let err = Parser::parse("+ 1\n+").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }

    #[test]
    fn test_missing_lines() {
        assert_eq!(Parser::parse("").unwrap_err(), ParseError::UnexpectedEof);
        assert_eq!(Parser::parse("// nothing\n\n").unwrap_err(), ParseError::UnexpectedEof);
        assert_eq!(Parser::parse("max + 1").unwrap_err(), ParseError::MissingLines);
    }

    #[test]
    fn test_trailing_tokens() {
        let err = Parser::parse("max + 1\n+ 1 <= 4 5\n+").unwrap_err();
        match err {
            ParseError::UnexpectedToken { expected, span, .. } => {
                assert_eq!(expected, "end of line");
                assert_eq!(span, Span::new(17, 18));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
