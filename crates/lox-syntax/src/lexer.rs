use std::fmt::{self, Display, Formatter};
use std::num::ParseFloatError;

use log::debug;
use logos::Logos;
use lox_common::error::{Error, ErrorS, SyntaxError};
use lox_common::types::Span;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn line(&self) -> usize {
        self.span.line_start
    }

    pub fn column(&self) -> usize {
        self.span.column_start
    }

    /// Number of characters the token covers in the source.
    pub fn length(&self) -> usize {
        if self.span.range.is_empty() {
            0
        } else if self.span.line_start == self.span.line_end {
            self.span.column_end + 1 - self.span.column_start
        } else {
            // Multi-line strings; the column span alone cannot tell.
            self.span.range.len()
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "| {:?} : Line : {}; Column: {}; Length: {}",
            self.kind,
            self.line(),
            self.column(),
            self.length()
        )
    }
}

/// Splits a source into tokens.
///
/// Scanning never fails: every problem becomes an error record and the token
/// stream always ends with [`TokenKind::Eof`].
pub struct Scanner<'a> {
    inner: logos::Lexer<'a, TokenKind>,
    lines: LineIndex<'a>,
    tokens: Vec<Token>,
    errors: Vec<ErrorS>,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            inner: TokenKind::lexer(source),
            lines: LineIndex::new(source),
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn scan(mut self) -> (Vec<Token>, Vec<ErrorS>) {
        while let Some(kind) = self.inner.next() {
            let range = self.inner.span();
            match kind {
                TokenKind::Error => {
                    for (offset, character) in self.inner.slice().char_indices() {
                        let start = range.start + offset;
                        let span = self.lines.span(start..start + character.len_utf8());
                        self.errors.push((
                            Error::SyntaxError(SyntaxError::InvalidCharacter { character }),
                            span,
                        ));
                    }
                }
                TokenKind::UnterminatedString => {
                    let span = self.lines.span(range);
                    self.errors.push((Error::SyntaxError(SyntaxError::UnterminatedString), span));
                }
                kind => {
                    let span = self.lines.span(range);
                    self.tokens.push(Token { kind, span });
                }
            }
        }

        let end = self.inner.source().len();
        let span = self.lines.span(end..end);
        self.tokens.push(Token { kind: TokenKind::Eof, span });

        debug!("scanned {} tokens, {} errors", self.tokens.len(), self.errors.len());
        (self.tokens, self.errors)
    }
}

/// Maps byte offsets to 1-based lines and character columns.
struct LineIndex<'a> {
    source: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();
        Self { source, starts }
    }

    fn position(&self, offset: usize) -> (usize, usize) {
        let line = match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line - 1,
        };
        let column = self.source[self.starts[line]..offset].chars().count() + 1;
        (line + 1, column)
    }

    fn span(&self, range: std::ops::Range<usize>) -> Span {
        let (line_start, column_start) = self.position(range.start);
        let (line_end, column_end) = match self.source[range.clone()].char_indices().last() {
            Some((offset, _)) => self.position(range.start + offset),
            None => (line_start, column_start),
        };
        Span { range, line_start, line_end, column_start, column_end }
    }
}

#[derive(Clone, Debug, Logos, PartialEq)]
pub enum TokenKind {
    // Single-character tokens.
    #[token("(")]
    LtParen,
    #[token(")")]
    RtParen,
    #[token("{")]
    LtBrace,
    #[token("}")]
    RtBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token(";")]
    Semicolon,
    #[token("/")]
    Slash,
    #[token("*")]
    Asterisk,

    // One or two character tokens.
    #[token("!")]
    Bang,
    #[token("!=")]
    BangEqual,
    #[token("=")]
    Equal,
    #[token("==")]
    EqualEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,

    // Literals.
    #[regex("[a-zA-Z_][a-zA-Z0-9_]*", lex_identifier)]
    Identifier(String),
    #[regex(r#""[^"]*""#, lex_string)]
    String(String),
    #[regex(r#"[0-9]+(\.[0-9]+)?"#, lex_number)]
    Number(f64),
    #[regex(r#""[^"]*"#)]
    UnterminatedString,

    // Keywords.
    #[token("and")]
    And,
    #[token("class")]
    Class,
    #[token("else")]
    Else,
    #[token("false")]
    False,
    #[token("for")]
    For,
    #[token("fun")]
    Fun,
    #[token("if")]
    If,
    #[token("nil")]
    Nil,
    #[token("or")]
    Or,
    #[token("print")]
    Print,
    #[token("return")]
    Return,
    #[token("super")]
    Super,
    #[token("this")]
    This,
    #[token("true")]
    True,
    #[token("var")]
    Var,
    #[token("while")]
    While,

    Eof,

    #[regex(r"//.*", logos::skip)]
    #[regex(r"[ \r\n\t\f]+", logos::skip)]
    #[error]
    Error,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Identifier(name) => return write!(f, "{name:?}"),
            TokenKind::String(string) => return write!(f, "string {string:?}"),
            TokenKind::Number(number) => return write!(f, "number {number}"),
            TokenKind::Eof => return write!(f, "end of file"),
            TokenKind::UnterminatedString => return write!(f, "unterminated string"),
            TokenKind::Error => return write!(f, "invalid input"),
            TokenKind::LtParen => "(",
            TokenKind::RtParen => ")",
            TokenKind::LtBrace => "{",
            TokenKind::RtBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Minus => "-",
            TokenKind::Plus => "+",
            TokenKind::Semicolon => ";",
            TokenKind::Slash => "/",
            TokenKind::Asterisk => "*",
            TokenKind::Bang => "!",
            TokenKind::BangEqual => "!=",
            TokenKind::Equal => "=",
            TokenKind::EqualEqual => "==",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::And => "and",
            TokenKind::Class => "class",
            TokenKind::Else => "else",
            TokenKind::False => "false",
            TokenKind::For => "for",
            TokenKind::Fun => "fun",
            TokenKind::If => "if",
            TokenKind::Nil => "nil",
            TokenKind::Or => "or",
            TokenKind::Print => "print",
            TokenKind::Return => "return",
            TokenKind::Super => "super",
            TokenKind::This => "this",
            TokenKind::True => "true",
            TokenKind::Var => "var",
            TokenKind::While => "while",
        };
        write!(f, "{text:?}")
    }
}

fn lex_number(lexer: &mut logos::Lexer<TokenKind>) -> Result<f64, ParseFloatError> {
    let slice = lexer.slice();
    slice.parse::<f64>()
}

fn lex_string(lexer: &mut logos::Lexer<TokenKind>) -> String {
    let slice = lexer.slice();
    slice[1..slice.len() - 1].to_string()
}

fn lex_identifier(lexer: &mut logos::Lexer<TokenKind>) -> String {
    let slice = lexer.slice();
    slice.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = Scanner::new(source).scan();
        assert_eq!(Vec::<ErrorS>::new(), errors);
        tokens.into_iter().map(|token| token.kind).collect()
    }

    #[test]
    fn lex_operators() {
        let exp = vec![
            TokenKind::BangEqual,
            TokenKind::EqualEqual,
            TokenKind::LessEqual,
            TokenKind::GreaterEqual,
            TokenKind::Bang,
            TokenKind::Equal,
            TokenKind::Less,
            TokenKind::Greater,
            TokenKind::Slash,
            TokenKind::Eof,
        ];
        assert_eq!(exp, kinds("!= == <= >= ! = < > / // comment"));
    }

    #[test]
    fn lex_keywords_and_identifiers() {
        let exp = vec![
            TokenKind::Var,
            TokenKind::Identifier("variable".to_string()),
            TokenKind::Identifier("_or".to_string()),
            TokenKind::Or,
            TokenKind::Class,
            TokenKind::Identifier("classy".to_string()),
            TokenKind::Eof,
        ];
        assert_eq!(exp, kinds("var variable _or or class classy"));
    }

    #[test]
    fn lex_number_trailing_dot() {
        let exp = vec![
            TokenKind::Number(12.5),
            TokenKind::Number(3.0),
            TokenKind::Dot,
            TokenKind::Identifier("abs".to_string()),
            TokenKind::Eof,
        ];
        assert_eq!(exp, kinds("12.5 3.abs"));
    }

    #[test]
    fn lex_positions() {
        let (tokens, _) = Scanner::new("var a;\n  print \"hi\";").scan();
        let got = tokens
            .iter()
            .map(|token| (token.line(), token.column(), token.length()))
            .collect::<Vec<_>>();
        let exp =
            vec![(1, 1, 3), (1, 5, 1), (1, 6, 1), (2, 3, 5), (2, 9, 4), (2, 13, 1), (2, 14, 0)];
        assert_eq!(exp, got);
    }

    #[test]
    fn lex_multiline_string() {
        let (tokens, errors) = Scanner::new("\"a\nb\" x").scan();
        assert!(errors.is_empty());
        assert_eq!(TokenKind::String("a\nb".to_string()), tokens[0].kind);
        assert_eq!(2, tokens[1].line());
        assert_eq!(4, tokens[1].column());
    }

    #[test]
    fn lex_unterminated_string() {
        let (tokens, errors) = Scanner::new("print \"\nfoo").scan();
        let kinds = tokens.into_iter().map(|t| t.kind).collect::<Vec<_>>();
        assert_eq!(vec![TokenKind::Print, TokenKind::Eof], kinds);
        assert_eq!(1, errors.len());
        let (error, span) = &errors[0];
        assert_eq!(&Error::SyntaxError(SyntaxError::UnterminatedString), error);
        assert_eq!(6..11, span.range);
    }

    #[test]
    fn lex_invalid_characters() {
        let (tokens, errors) = Scanner::new("a @# b").scan();
        let kinds = tokens.into_iter().map(|t| t.kind).collect::<Vec<_>>();
        let exp_kinds = vec![
            TokenKind::Identifier("a".to_string()),
            TokenKind::Identifier("b".to_string()),
            TokenKind::Eof,
        ];
        assert_eq!(exp_kinds, kinds);

        let got = errors.iter().map(|(e, span)| (e.clone(), span.column_start)).collect::<Vec<_>>();
        let exp = vec![
            (Error::SyntaxError(SyntaxError::InvalidCharacter { character: '@' }), 3),
            (Error::SyntaxError(SyntaxError::InvalidCharacter { character: '#' }), 4),
        ];
        assert_eq!(exp, got);
    }
}
