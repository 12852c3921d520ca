pub mod ast;
pub mod lexer;
pub mod parser;
pub mod printer;

use lox_common::error::ErrorS;

use crate::ast::Program;
use crate::lexer::{Scanner, Token};
use crate::parser::Parser;

pub fn scan(source: &str) -> (Vec<Token>, Vec<ErrorS>) {
    Scanner::new(source).scan()
}

pub fn parse(tokens: Vec<Token>) -> (Program, Vec<ErrorS>) {
    Parser::new(tokens).parse()
}
