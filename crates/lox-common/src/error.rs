use crate::types::{Span, Spanned};

use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::{self, SimpleFile};
use codespan_reporting::term;
use termcolor::WriteColor;
use thiserror::Error;

pub type ErrorS = Spanned<Error>;
pub type Result<T, E = ErrorS> = std::result::Result<T, E>;

#[remain::sorted]
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    #[error("AttributeError: {0}")]
    AttributeError(AttributeError),
    #[error("IOError: {0}")]
    IoError(IoError),
    #[error("NameError: {0}")]
    NameError(NameError),
    #[error("OverflowError: {0}")]
    OverflowError(OverflowError),
    #[error("SyntaxError: {0}")]
    SyntaxError(SyntaxError),
    #[error("TypeError: {0}")]
    TypeError(TypeError),
}

impl Error {
    fn code(&self) -> &'static str {
        match self {
            Error::AttributeError(_) => "AttributeError",
            Error::IoError(_) => "IOError",
            Error::NameError(_) => "NameError",
            Error::OverflowError(_) => "OverflowError",
            Error::SyntaxError(_) => "SyntaxError",
            Error::TypeError(_) => "TypeError",
        }
    }

    fn detail(&self) -> String {
        match self {
            Error::AttributeError(e) => e.to_string(),
            Error::IoError(e) => e.to_string(),
            Error::NameError(e) => e.to_string(),
            Error::OverflowError(e) => e.to_string(),
            Error::SyntaxError(e) => e.to_string(),
            Error::TypeError(e) => e.to_string(),
        }
    }

    pub fn as_diagnostic(&self, span: &Span) -> Diagnostic<()> {
        let diagnostic = Diagnostic::error()
            .with_code(self.code())
            .with_message(self.detail())
            .with_labels(vec![Label::primary((), span.range.clone())]);
        match self {
            Error::SyntaxError(SyntaxError::UnclosedParen { .. }) => {
                diagnostic.with_notes(vec![r#"every "(" needs a matching ")""#.to_string()])
            }
            Error::TypeError(TypeError::OperandsMustBeNumbersOrStrings { .. }) => {
                let note = r#""+" adds two numbers or concatenates two strings"#;
                diagnostic.with_notes(vec![note.to_string()])
            }
            _ => diagnostic,
        }
    }
}

#[remain::sorted]
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AttributeError {
    #[error("{type_:?} object is not an instance, cannot access {name:?}")]
    NotAnInstance { type_: String, name: String },
    #[error("{type_:?} object has no attribute {name:?}")]
    UndefinedProperty { type_: String, name: String },
}

#[remain::sorted]
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum IoError {
    #[error("unable to write to file: {file:?}")]
    WriteError { file: String },
}

#[remain::sorted]
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum NameError {
    #[error("cannot read {name:?} in its own initializer")]
    AccessInsideInitializer { name: String },
    #[error("name {name:?} is already defined")]
    AlreadyDefined { name: String },
    #[error("name {name:?} is not defined")]
    NotDefined { name: String },
}

#[remain::sorted]
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum OverflowError {
    #[error("maximum call depth of {max} exceeded")]
    StackOverflow { max: usize },
}

#[remain::sorted]
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SyntaxError {
    #[error(r#"expected "." after "super", found {found}"#)]
    ExpectedDot { found: String },
    #[error("expected expression, found {found}")]
    ExpectedExpression { found: String },
    #[error("expected identifier, found {found}")]
    ExpectedIdentifier { found: String },
    #[error(r#"expected "{{", found {found}"#)]
    ExpectedLtBrace { found: String },
    #[error(r#"expected "(", found {found}"#)]
    ExpectedLtParen { found: String },
    #[error(r#"expected "}}", found {found}"#)]
    ExpectedRtBrace { found: String },
    #[error(r#"expected ")", found {found}"#)]
    ExpectedRtParen { found: String },
    #[error(r#"expected ";", found {found}"#)]
    ExpectedSemicolon { found: String },
    #[error("expected variable name, found {found}")]
    ExpectedVariableName { found: String },
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
    #[error("invalid character: {character:?}")]
    InvalidCharacter { character: char },
    #[error("invalid characters: {characters:?}")]
    InvalidCharacters { characters: String },
    #[error(r#""init" cannot return a value"#)]
    ReturnInInitializer,
    #[error(r#""return" outside function"#)]
    ReturnOutsideFunction,
    #[error(r#""super" outside class"#)]
    SuperOutsideClass,
    #[error(r#""super" in a class with no superclass"#)]
    SuperWithoutSuperclass,
    #[error(r#""this" outside class"#)]
    ThisOutsideClass,
    #[error("cannot have more than {max} arguments")]
    TooManyArguments { max: usize },
    #[error("cannot have more than {max} parameters")]
    TooManyParameters { max: usize },
    #[error(r#"unclosed "(", found {found}"#)]
    UnclosedParen { found: String },
    #[error("unterminated string")]
    UnterminatedString,
}

#[remain::sorted]
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TypeError {
    #[error("{name}() takes {exp_args} arguments but {got_args} were given")]
    ArityMismatch { name: String, exp_args: usize, got_args: usize },
    #[error("class {name:?} cannot inherit from itself")]
    InheritFromSelf { name: String },
    #[error("{type_:?} object is not callable")]
    NotCallable { type_: String },
    #[error("unsupported operand type for {op}: {rt_type:?}")]
    OperandMustBeNumber { op: String, rt_type: String },
    #[error("unsupported operand type(s) for {op}: {lt_type:?} and {rt_type:?}")]
    OperandsMustBeNumbers { op: String, lt_type: String, rt_type: String },
    #[error("unsupported operand type(s) for {op}: {lt_type:?} and {rt_type:?}")]
    OperandsMustBeNumbersOrStrings { op: String, lt_type: String, rt_type: String },
    #[error(r#"superclass should be of type "class", not {type_:?}"#)]
    SuperclassMustBeClass { type_: String },
}

/// Coalesces runs of adjacent invalid characters into a single error.
///
/// Two `InvalidCharacter` errors are adjacent when they sit on the same line in
/// consecutive columns. Every other error passes through untouched.
pub fn merge_invalid_characters(errors: Vec<ErrorS>) -> Vec<ErrorS> {
    let mut merged: Vec<ErrorS> = Vec::with_capacity(errors.len());
    for (error, span) in errors {
        let character = match error {
            Error::SyntaxError(SyntaxError::InvalidCharacter { character }) => character,
            error => {
                merged.push((error, span));
                continue;
            }
        };

        if let Some((last, last_span)) = merged.last_mut() {
            let adjacent = last_span.line_end == span.line_start
                && last_span.column_end + 1 == span.column_start;
            if adjacent {
                match last {
                    Error::SyntaxError(SyntaxError::InvalidCharacter { character: prev }) => {
                        let characters = [*prev, character].iter().collect();
                        *last = Error::SyntaxError(SyntaxError::InvalidCharacters { characters });
                        *last_span = last_span.to(&span);
                        continue;
                    }
                    Error::SyntaxError(SyntaxError::InvalidCharacters { characters }) => {
                        characters.push(character);
                        *last_span = last_span.to(&span);
                        continue;
                    }
                    _ => (),
                }
            }
        }
        merged.push((Error::SyntaxError(SyntaxError::InvalidCharacter { character }), span));
    }
    merged
}

/// Renders every error against the source, ordered by position.
pub fn report_err(
    writer: &mut dyn WriteColor,
    source: &str,
    mut errors: Vec<ErrorS>,
) -> Result<(), files::Error> {
    errors.sort_by_key(|(_, span)| (span.range.start, span.range.end));

    let file = SimpleFile::new("<script>", source);
    let config = term::Config::default();
    for (err, span) in errors {
        term::emit(writer, &config, &file, &err.as_diagnostic(&span))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn span(line: usize, column: usize) -> Span {
        Span {
            range: column - 1..column,
            line_start: line,
            line_end: line,
            column_start: column,
            column_end: column,
        }
    }

    fn invalid(character: char) -> Error {
        Error::SyntaxError(SyntaxError::InvalidCharacter { character })
    }

    #[test]
    fn merge_adjacent_characters() {
        let errors = vec![
            (invalid('@'), span(1, 3)),
            (invalid('#'), span(1, 4)),
            (invalid('$'), span(1, 5)),
        ];
        let got = merge_invalid_characters(errors);

        let exp_span =
            Span { range: 2..5, line_start: 1, line_end: 1, column_start: 3, column_end: 5 };
        let exp = vec![(
            Error::SyntaxError(SyntaxError::InvalidCharacters { characters: "@#$".to_string() }),
            exp_span,
        )];
        assert_eq!(exp, got);
    }

    #[test]
    fn merge_keeps_separated_characters() {
        let errors = vec![
            (invalid('@'), span(1, 1)),
            (invalid('#'), span(1, 3)),
            (invalid('$'), span(2, 4)),
            (Error::SyntaxError(SyntaxError::UnterminatedString), span(2, 5)),
        ];
        let got = merge_invalid_characters(errors.clone());
        assert_eq!(errors, got);
    }

    #[test]
    fn display_includes_category() {
        let err = Error::TypeError(TypeError::ArityMismatch {
            name: "add".to_string(),
            exp_args: 2,
            got_args: 1,
        });
        assert_eq!("TypeError: add() takes 2 arguments but 1 were given", err.to_string());
    }

    #[test]
    fn report_echoes_source_line() {
        let source = "print a;\n";
        let errors = vec![(
            Error::NameError(NameError::NotDefined { name: "a".to_string() }),
            Span { range: 6..7, line_start: 1, line_end: 1, column_start: 7, column_end: 7 },
        )];

        let mut writer = termcolor::NoColor::new(Vec::new());
        report_err(&mut writer, source, errors).unwrap();
        let got = String::from_utf8(writer.into_inner()).unwrap();
        assert!(got.contains(r#"error[NameError]: name "a" is not defined"#), "{got}");
        assert!(got.contains("print a;"), "{got}");
        assert!(got.contains('^'), "{got}");
    }
}
