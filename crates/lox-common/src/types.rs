use std::ops::Range;

pub type Spanned<T> = (T, Span);

/// A region of source text.
///
/// `range` holds byte offsets and is what the diagnostic renderer consumes.
/// Lines and columns are 1-based, columns count characters, and both ends are
/// inclusive.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Span {
    pub range: Range<usize>,
    pub line_start: usize,
    pub line_end: usize,
    pub column_start: usize,
    pub column_end: usize,
}

impl Span {
    /// Joins two spans, from the start of `self` to the end of `end`.
    pub fn to(&self, end: &Span) -> Span {
        Span {
            range: self.range.start..end.range.end,
            line_start: self.line_start,
            line_end: end.line_end,
            column_start: self.column_start,
            column_end: end.column_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn join_spans_across_lines() {
        let start =
            Span { range: 0..3, line_start: 1, line_end: 1, column_start: 1, column_end: 3 };
        let end =
            Span { range: 10..12, line_start: 2, line_end: 2, column_start: 4, column_end: 5 };
        let exp = Span { range: 0..12, line_start: 1, line_end: 2, column_start: 1, column_end: 5 };
        assert_eq!(exp, start.to(&end));
    }
}
