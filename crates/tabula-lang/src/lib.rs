pub mod lexer;
pub mod parser;

pub use lexer::{Lexer, Span, Token, TokenKind};
pub use parser::{ParseError, Parser};

/// Parses problem text into a [`tabula_solver::Problem`].
pub fn parse_problem(source: &str) -> Result<tabula_solver::Problem, ParseError> {
    Parser::parse(source)
}
