//! Sentence tokenizer
//!
//! Splits one protocol line into its type token and a forward-only cursor
//! over the remaining comma-separated fields. Everything from the `*`
//! checksum delimiter onwards is invisible to the cursor.

/// Maximum length of a sentence type token, terminator included
pub const MAX_TYPE_LEN: usize = 16;

/// A field that can be parsed with [`InputLine::read_checked`]
pub trait FieldValue: Sized {
    /// Parse a complete field; `None` on empty, malformed or out-of-range input
    fn parse_field(field: &str) -> Option<Self>;
}

macro_rules! impl_field_int {
    ($($t:ty),*) => {
        $(impl FieldValue for $t {
            fn parse_field(field: &str) -> Option<Self> {
                field.parse().ok()
            }
        })*
    };
}

macro_rules! impl_field_float {
    ($($t:ty),*) => {
        $(impl FieldValue for $t {
            fn parse_field(field: &str) -> Option<Self> {
                // rejects "nan", "inf" and friends
                field.parse::<$t>().ok().filter(|v| v.is_finite())
            }
        })*
    };
}

impl_field_int!(u8, u16, u32, u64, i8, i16, i32, i64, usize);
impl_field_float!(f32, f64);

/// Forward-only cursor over the fields of one line.
///
/// Distinguishes an empty field (`"$X,,1"`) from an absent one (`"$X"`):
/// [`read_field`](Self::read_field) returns `Some("")` for the former and
/// `None` for the latter.
#[derive(Debug, Clone)]
pub struct InputLine<'a> {
    rest: Option<&'a str>,
}

impl<'a> InputLine<'a> {
    /// Create a cursor over a raw line
    pub fn new(line: &'a str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let data = match line.find('*') {
            Some(star) => &line[..star],
            None => line,
        };
        Self { rest: Some(data) }
    }

    /// Read the next field; `None` once the line is exhausted
    pub fn read_field(&mut self) -> Option<&'a str> {
        let rest = self.rest?;
        match rest.find(',') {
            Some(comma) => {
                self.rest = Some(&rest[comma + 1..]);
                Some(&rest[..comma])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }

    /// Read the next field, absent fields read as empty
    pub fn read(&mut self) -> &'a str {
        self.read_field().unwrap_or("")
    }

    /// Read the next field truncated to `max_len - 1` bytes
    pub fn read_token(&mut self, max_len: usize) -> &'a str {
        truncate(self.read(), max_len.saturating_sub(1))
    }

    /// Parse the next field as `T`.
    ///
    /// The cursor advances past the field whether or not it parses, so one
    /// bad field never shifts the ones after it.
    pub fn read_checked<T: FieldValue>(&mut self) -> Option<T> {
        self.read_field().and_then(T::parse_field)
    }

    /// First character of the next field, `None` if empty or absent
    pub fn read_char(&mut self) -> Option<char> {
        self.read_field().and_then(|f| f.chars().next())
    }

    /// Read the next field and compare it against `expected`
    pub fn read_compare(&mut self, expected: &str) -> bool {
        self.read_field() == Some(expected)
    }

    /// Skip up to `count` fields, returns how many were actually skipped
    pub fn skip(&mut self, count: usize) -> usize {
        (0..count).take_while(|_| self.read_field().is_some()).count()
    }

    /// True once the last field has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.rest.is_none()
    }

    /// Unread remainder of the line, without the checksum
    pub fn rest(&self) -> &'a str {
        self.rest.unwrap_or("")
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// One line split into its type token and field cursor
#[derive(Debug, Clone)]
pub struct Sentence<'a> {
    kind: &'a str,
    fields: InputLine<'a>,
}

impl<'a> Sentence<'a> {
    /// Tokenize a line, reading its type token
    pub fn parse(line: &'a str) -> Self {
        let mut fields = InputLine::new(line);
        let kind = fields.read_token(MAX_TYPE_LEN);
        Self { kind, fields }
    }

    /// Type token, e.g. `$PDKEY`
    pub fn kind(&self) -> &'a str {
        self.kind
    }

    /// Cursor positioned after the type token
    pub fn fields(&mut self) -> &mut InputLine<'a> {
        &mut self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_and_fields() {
        let mut sentence = Sentence::parse("$PDKEY,5,abc");
        assert_eq!(sentence.kind(), "$PDKEY");
        let line = sentence.fields();
        assert_eq!(line.read_checked::<i32>(), Some(5));
        assert_eq!(line.read(), "abc");
        assert!(line.is_exhausted());
    }

    #[test]
    fn test_checksum_is_hidden() {
        let mut line = InputLine::new("$PDKEY,5*5A");
        assert_eq!(line.read(), "$PDKEY");
        assert_eq!(line.read(), "5");
        assert!(line.is_exhausted());
    }

    #[test]
    fn test_empty_vs_absent() {
        let mut line = InputLine::new("$X,,7");
        line.read();
        assert_eq!(line.read_field(), Some(""));
        assert_eq!(line.read_field(), Some("7"));
        assert_eq!(line.read_field(), None);

        let mut bare = InputLine::new("$X");
        bare.read();
        assert_eq!(bare.read_field(), None);

        let mut trailing = InputLine::new("$X,");
        trailing.read();
        assert_eq!(trailing.read_field(), Some(""));
        assert_eq!(trailing.read_field(), None);
    }

    #[test]
    fn test_failed_read_still_advances() {
        let mut line = InputLine::new("abc,,99999999999,42,1.5");
        assert_eq!(line.read_checked::<i32>(), None);
        assert_eq!(line.read_checked::<i32>(), None);
        assert_eq!(line.read_checked::<i32>(), None);
        assert_eq!(line.read_checked::<i32>(), Some(42));
        assert_eq!(line.read_checked::<f64>(), Some(1.5));
        assert_eq!(line.read_checked::<f64>(), None);
    }

    #[test]
    fn test_float_rejects_non_finite() {
        let mut line = InputLine::new("nan,inf,-2.25");
        assert_eq!(line.read_checked::<f64>(), None);
        assert_eq!(line.read_checked::<f32>(), None);
        assert_eq!(line.read_checked::<f64>(), Some(-2.25));
    }

    #[test]
    fn test_read_token_truncates() {
        let mut line = InputLine::new("ABCDEFGH,next");
        assert_eq!(line.read_token(4), "ABC");
        assert_eq!(line.read(), "next");
    }

    #[test]
    fn test_long_type_is_bounded() {
        let sentence = Sentence::parse("$ABCDEFGHIJKLMNOPQRSTUVWXYZ,1");
        assert_eq!(sentence.kind().len(), MAX_TYPE_LEN - 1);
    }

    #[test]
    fn test_skip_and_compare() {
        let mut line = InputLine::new("a,b,c,M");
        assert_eq!(line.skip(3), 3);
        assert!(line.read_compare("M"));
        assert_eq!(line.skip(2), 0);
    }

    #[test]
    fn test_read_char() {
        let mut line = InputLine::new("A,,N");
        assert_eq!(line.read_char(), Some('A'));
        assert_eq!(line.read_char(), None);
        assert_eq!(line.read_char(), Some('N'));
        assert_eq!(line.rest(), "");
    }

    #[test]
    fn test_line_ending_stripped() {
        let mut line = InputLine::new("$A,1\r\n");
        line.read();
        assert_eq!(line.read_checked::<u8>(), Some(1));
    }
}
