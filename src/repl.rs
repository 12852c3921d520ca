use std::borrow::Cow;
use std::fs;

use anyhow::{Context, Result};
use lox_syntax::lexer::{Scanner, TokenKind};
use nu_ansi_term::{Color, Style};
use reedline::{
    EditCommand, Emacs, FileBackedHistory, KeyCode, KeyModifiers, PromptEditMode,
    PromptHistorySearch, Reedline, ReedlineEvent, StyledText, ValidationResult,
};

/// A line consisting of this alone ends a REPL submission.
pub const TERMINATOR: &str = ";;";

pub fn editor() -> Result<Reedline> {
    let mut keybindings = reedline::default_emacs_keybindings();
    keybindings.add_binding(
        KeyModifiers::ALT,
        KeyCode::Enter,
        ReedlineEvent::Edit(vec![EditCommand::InsertNewline]),
    );

    let data_dir = dirs::data_dir().context("could not find data directory")?;
    let history_dir = data_dir.join("treelox");
    fs::create_dir_all(&history_dir)
        .with_context(|| format!("could not create directory: {}", history_dir.display()))?;
    let history_path = history_dir.join("history.txt");
    let history = Box::new(
        FileBackedHistory::with_file(10000, history_path.clone())
            .with_context(|| format!("could not open history file: {}", history_path.display()))?,
    );

    let editor = Reedline::create()
        .with_edit_mode(Box::new(Emacs::new(keybindings)))
        .with_highlighter(Box::new(Highlighter))
        .with_history(history)
        .with_validator(Box::new(Validator));
    Ok(editor)
}

/// Strips the terminating `;;` line from a submitted buffer.
pub fn submission(buffer: &str) -> &str {
    let buffer = buffer.trim_end();
    buffer.strip_suffix(TERMINATOR).unwrap_or(buffer)
}

const DEFAULT: Color = Color::LightGray;

/// Colours a line using the scanner's tokens. Whatever lies between tokens
/// (whitespace, comments, characters the scanner rejected) is left in the
/// default colour, or grey when it holds a comment.
struct Highlighter;

impl reedline::Highlighter for Highlighter {
    fn highlight(&self, line: &str, _: usize) -> StyledText {
        let mut output = StyledText::new();
        let (tokens, _) = Scanner::new(line).scan();

        let mut curr_end = 0;
        for (idx, token) in tokens.iter().enumerate() {
            let range = token.span.range.clone();
            if range.is_empty() {
                continue;
            }
            push_gap(&mut output, &line[curr_end..range.start]);

            let is_call =
                matches!(tokens.get(idx + 1), Some(next) if next.kind == TokenKind::LtParen);
            let fg = match &token.kind {
                TokenKind::Identifier(_) if is_call => Color::LightBlue,
                TokenKind::Identifier(_) => Color::LightRed,
                TokenKind::String(_) => Color::LightGreen,
                TokenKind::Number(_) | TokenKind::True | TokenKind::False | TokenKind::Nil => {
                    Color::LightCyan
                }
                TokenKind::This | TokenKind::Super => Color::LightYellow,
                TokenKind::And
                | TokenKind::Class
                | TokenKind::Else
                | TokenKind::For
                | TokenKind::Fun
                | TokenKind::If
                | TokenKind::Or
                | TokenKind::Print
                | TokenKind::Return
                | TokenKind::Var
                | TokenKind::While => Color::LightPurple,
                _ => DEFAULT,
            };
            output.push((Style::new().fg(fg), line[range.clone()].to_string()));
            curr_end = range.end;
        }
        push_gap(&mut output, &line[curr_end..]);

        output
    }
}

fn push_gap(output: &mut StyledText, gap: &str) {
    if gap.is_empty() {
        return;
    }
    match gap.find("//") {
        Some(idx) => {
            output.push((Style::new().fg(DEFAULT), gap[..idx].to_string()));
            output.push((Style::new().fg(Color::DarkGray), gap[idx..].to_string()));
        }
        None => output.push((Style::new().fg(DEFAULT), gap.to_string())),
    }
}

struct Validator;

impl reedline::Validator for Validator {
    fn validate(&self, line: &str) -> ValidationResult {
        if line.lines().last().map(str::trim) == Some(TERMINATOR) {
            ValidationResult::Complete
        } else {
            ValidationResult::Incomplete
        }
    }
}

pub struct Prompt;

impl reedline::Prompt for Prompt {
    fn render_prompt_left(&self) -> Cow<str> {
        Cow::Borrowed("> ")
    }

    fn render_prompt_right(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _: PromptEditMode) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        Cow::Borrowed("> ")
    }

    fn render_prompt_history_search_indicator(&self, _: PromptHistorySearch) -> Cow<str> {
        Cow::Borrowed("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use reedline::{Highlighter as _, Validator as _};

    #[test]
    fn submission_drops_terminator() {
        assert_eq!("print 1;\nprint 2;\n", submission("print 1;\nprint 2;\n;;\n"));
        assert_eq!("print 1;", submission("print 1;"));
    }

    #[test]
    fn validator_waits_for_terminator() {
        assert!(matches!(Validator.validate("print 1;"), ValidationResult::Incomplete));
        assert!(matches!(Validator.validate("print 1;\n  ;;"), ValidationResult::Complete));
    }

    #[test]
    fn highlighting_keeps_text() {
        let line = r#"var s = "hi"; f(1); // done @"#;
        let styled = Highlighter.highlight(line, 0);
        let text: String = styled.buffer.iter().map(|(_, text)| text.as_str()).collect();
        assert_eq!(line, text);
    }
}
