//! Tokenizer for the expression language.
//!
//! Source text is scanned by an ordered list of token detectors; the first
//! detector that accepts the input at the cursor wins. Detectors that fail
//! are rewound, so each one sees the same starting position. A position no
//! detector accepts is a lex error.
//!
//! Literals:
//! - decimal integers (`42`), binary (`0b1010`), hex (`0xFF`)
//! - `'...'` strings, `\` escapes the next character verbatim
//! - keywords `if`, `true`, `false`, `else` (case-insensitive)

use crate::error::CoreError;

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    Str,
    Name,
    Operator,
    Keyword,
    ParenStart,
    ParenEnd,
    BlockStart,
    BlockEnd,
    Comma,
    EndOfLine,
    /// Consumed for position tracking, filtered from `tokenize` output.
    Whitespace,
}

/// A lexed token with its source position.
///
/// `start`/`end` are byte offsets; `line` and `column` are 0-based and
/// point at the first character of the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

/// Two-character operators, matched before the single-character ones.
const TWO_CHAR_OPS: [&str; 8] = ["==", "!=", "&&", "||", "<=", ">=", "<<", ">>"];
const ONE_CHAR_OPS: [char; 10] = ['!', '+', '-', '=', '&', '|', '^', '~', '<', '>'];
const KEYWORDS: [&str; 4] = ["if", "true", "false", "else"];

/// Character cursor tracking byte offset, line and column.
struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
}

#[derive(Clone, Copy)]
struct Checkpoint {
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 0,
            column: 0,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn has_next(&self) -> bool {
        self.pos < self.src.len()
    }

    /// Case-insensitive prefix check on an ASCII needle.
    fn starts_with_ignore_case(&self, needle: &str) -> bool {
        self.rest()
            .get(..needle.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(needle))
    }

    /// Consumes `bytes` bytes, keeping line/column in sync.
    fn advance(&mut self, bytes: usize) {
        for ch in self.src[self.pos..self.pos + bytes].chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        self.pos += bytes;
    }

    fn advance_char(&mut self) {
        if let Some(ch) = self.peek() {
            self.advance(ch.len_utf8());
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    fn restore(&mut self, cp: Checkpoint) {
        self.pos = cp.pos;
        self.line = cp.line;
        self.column = cp.column;
    }
}

type Detector = fn(&mut Cursor<'_>) -> Option<(TokenKind, String)>;

/// Detector priority: a number wins over a name (`0x` prefix), a keyword
/// over a name (`true` is never an identifier), longest operator first.
const DETECTORS: &[Detector] = &[
    read_number,
    read_string,
    read_operator,
    read_keyword,
    read_name,
    read_parentheses,
    read_code_blocks,
    read_end_of_line,
    read_comma,
    read_whitespace,
];

/// Lexes `source` into tokens, whitespace removed.
pub fn tokenize(source: &str) -> Result<Vec<Token>, CoreError> {
    let mut cursor = Cursor::new(source);
    let mut tokens = Vec::new();

    while cursor.has_next() {
        let start = cursor.checkpoint();

        let mut found = None;
        for detector in DETECTORS {
            let cp = cursor.checkpoint();
            if let Some(token) = detector(&mut cursor) {
                found = Some(token);
                break;
            }
            cursor.restore(cp);
        }

        let Some((kind, text)) = found else {
            return Err(CoreError::Lex {
                line: start.line,
                column: start.column,
                character: cursor.peek().unwrap_or('\0'),
            });
        };

        tokens.push(Token {
            kind,
            text,
            start: start.pos,
            end: cursor.pos,
            line: start.line,
            column: start.column,
        });
    }

    tokens.retain(|t| t.kind != TokenKind::Whitespace);
    Ok(tokens)
}

/// Reads digits in `radix`, returning their accumulated value.
fn read_digits(cursor: &mut Cursor<'_>, radix: u32) -> Option<f64> {
    let mut value = 0.0;
    let mut count = 0usize;

    while let Some(digit) = cursor.peek().and_then(|c| c.to_digit(radix)) {
        value = value * f64::from(radix) + f64::from(digit);
        cursor.advance_char();
        count += 1;
    }

    (count > 0).then_some(value)
}

fn read_number(cursor: &mut Cursor<'_>) -> Option<(TokenKind, String)> {
    if cursor.starts_with_ignore_case("0b") {
        cursor.advance(2);
        let value = read_digits(cursor, 2)?;
        // Binary and hex literals are converted to decimal text at lex
        // time; decimal literals stay verbatim until evaluation.
        return Some((TokenKind::Number, format_integer(value)));
    }

    if cursor.starts_with_ignore_case("0x") {
        cursor.advance(2);
        let value = read_digits(cursor, 16)?;
        return Some((TokenKind::Number, format_integer(value)));
    }

    let mut text = String::new();
    while let Some(ch) = cursor.peek() {
        if ch.is_ascii_digit() {
            text.push(ch);
            cursor.advance_char();
        } else {
            break;
        }
    }

    (!text.is_empty()).then_some((TokenKind::Number, text))
}

/// Decimal text of the accumulated literal value. `{:.0}` keeps the
/// exact f64 integer even past 64 bits, where a u64 cast would saturate.
fn format_integer(value: f64) -> String {
    format!("{value:.0}")
}

fn read_string(cursor: &mut Cursor<'_>) -> Option<(TokenKind, String)> {
    if cursor.peek() != Some('\'') {
        return None;
    }
    cursor.advance_char();

    let mut value = String::new();
    loop {
        match cursor.peek() {
            // Unterminated: no token, the opening quote becomes a lex error.
            None => return None,
            Some('\\') => {
                cursor.advance_char();
                let escaped = cursor.peek()?;
                value.push(escaped);
                cursor.advance_char();
            }
            Some('\'') => {
                cursor.advance_char();
                break;
            }
            Some(ch) => {
                value.push(ch);
                cursor.advance_char();
            }
        }
    }

    (!value.is_empty()).then_some((TokenKind::Str, value))
}

fn read_operator(cursor: &mut Cursor<'_>) -> Option<(TokenKind, String)> {
    for op in TWO_CHAR_OPS {
        if cursor.rest().starts_with(op) {
            cursor.advance(op.len());
            return Some((TokenKind::Operator, op.to_string()));
        }
    }

    let ch = cursor.peek()?;
    if ONE_CHAR_OPS.contains(&ch) {
        cursor.advance_char();
        return Some((TokenKind::Operator, ch.to_string()));
    }

    None
}

fn read_keyword(cursor: &mut Cursor<'_>) -> Option<(TokenKind, String)> {
    for keyword in KEYWORDS {
        if cursor.starts_with_ignore_case(keyword) {
            cursor.advance(keyword.len());
            // Token text is the canonical lowercase spelling.
            return Some((TokenKind::Keyword, keyword.to_string()));
        }
    }

    None
}

fn read_name(cursor: &mut Cursor<'_>) -> Option<(TokenKind, String)> {
    let first = cursor.peek()?;
    if !first.is_ascii_lowercase() {
        return None;
    }

    let mut value = String::from(first);
    cursor.advance_char();

    while let Some(ch) = cursor.peek() {
        if ch.is_ascii_alphanumeric() {
            value.push(ch);
            cursor.advance_char();
        } else {
            break;
        }
    }

    Some((TokenKind::Name, value))
}

fn read_parentheses(cursor: &mut Cursor<'_>) -> Option<(TokenKind, String)> {
    match cursor.peek()? {
        '(' => {
            cursor.advance_char();
            Some((TokenKind::ParenStart, "(".to_string()))
        }
        ')' => {
            cursor.advance_char();
            Some((TokenKind::ParenEnd, ")".to_string()))
        }
        _ => None,
    }
}

fn read_code_blocks(cursor: &mut Cursor<'_>) -> Option<(TokenKind, String)> {
    match cursor.peek()? {
        '{' => {
            cursor.advance_char();
            Some((TokenKind::BlockStart, "{".to_string()))
        }
        '}' => {
            cursor.advance_char();
            Some((TokenKind::BlockEnd, "}".to_string()))
        }
        _ => None,
    }
}

fn read_end_of_line(cursor: &mut Cursor<'_>) -> Option<(TokenKind, String)> {
    if cursor.peek() == Some(';') {
        cursor.advance_char();
        return Some((TokenKind::EndOfLine, ";".to_string()));
    }
    None
}

fn read_comma(cursor: &mut Cursor<'_>) -> Option<(TokenKind, String)> {
    if cursor.peek() == Some(',') {
        cursor.advance_char();
        return Some((TokenKind::Comma, ",".to_string()));
    }
    None
}

fn read_whitespace(cursor: &mut Cursor<'_>) -> Option<(TokenKind, String)> {
    let mut value = String::new();
    while let Some(ch) = cursor.peek() {
        if matches!(ch, ' ' | '\t' | '\r' | '\n') {
            value.push(ch);
            cursor.advance_char();
        } else {
            break;
        }
    }

    (!value.is_empty()).then_some((TokenKind::Whitespace, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_assignment_tokens() {
        let tokens = tokenize("a = 1 + 2;").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Name,
                TokenKind::Operator,
                TokenKind::Number,
                TokenKind::Operator,
                TokenKind::Number,
                TokenKind::EndOfLine,
            ]
        );
        assert_eq!(texts(&tokens), vec!["a", "=", "1", "+", "2", ";"]);
    }

    #[test]
    fn test_whitespace_never_emitted() {
        let tokens = tokenize(" \t\r\n a \n").unwrap();
        assert_eq!(kinds(&tokens), vec![TokenKind::Name]);
    }

    #[test]
    fn test_binary_literal_normalized() {
        let tokens = tokenize("0b1010").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].text, "10");

        let tokens = tokenize("0B11").unwrap();
        assert_eq!(tokens[0].text, "3");
    }

    #[test]
    fn test_hex_literal_normalized() {
        let tokens = tokenize("0xFF").unwrap();
        assert_eq!(tokens[0].text, "255");

        let tokens = tokenize("0Xa").unwrap();
        assert_eq!(tokens[0].text, "10");
    }

    #[test]
    fn test_wide_hex_literal_keeps_accumulated_value() {
        // 2^64: exactly representable as f64, one past what u64 holds.
        let tokens = tokenize("0x10000000000000000").unwrap();
        assert_eq!(tokens[0].text, "18446744073709551616");
    }

    #[test]
    fn test_decimal_kept_verbatim() {
        let tokens = tokenize("007").unwrap();
        assert_eq!(tokens[0].text, "007");
    }

    #[test]
    fn test_prefix_without_digits_is_error() {
        assert!(matches!(tokenize("0b"), Err(CoreError::Lex { .. })));
        assert!(matches!(tokenize("0xg"), Err(CoreError::Lex { .. })));
    }

    #[test]
    fn test_string_literal() {
        let tokens = tokenize("'hello'").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].text, "hello");
    }

    #[test]
    fn test_string_escape() {
        let tokens = tokenize(r"'it\'s'").unwrap();
        assert_eq!(tokens[0].text, "it's");

        let tokens = tokenize(r"'a\\b'").unwrap();
        assert_eq!(tokens[0].text, r"a\b");
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let err = tokenize("'abc").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Lex {
                character: '\'',
                ..
            }
        ));
    }

    #[test]
    fn test_empty_string_is_error() {
        assert!(matches!(tokenize("''"), Err(CoreError::Lex { .. })));
    }

    #[test]
    fn test_longest_operator_wins() {
        let tokens = tokenize("<< <= < == =").unwrap();
        assert_eq!(texts(&tokens), vec!["<<", "<=", "<", "==", "="]);
    }

    #[test]
    fn test_keywords_case_insensitive() {
        let tokens = tokenize("IF True FALSE eLsE").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Keyword,
                TokenKind::Keyword,
                TokenKind::Keyword,
                TokenKind::Keyword,
            ]
        );
        assert_eq!(texts(&tokens), vec!["if", "true", "false", "else"]);
    }

    #[test]
    fn test_keyword_prefix_splits() {
        // The keyword detector runs before names and matches a fixed
        // length, so "iffy" lexes as `if` + `fy`.
        let tokens = tokenize("iffy").unwrap();
        assert_eq!(texts(&tokens), vec!["if", "fy"]);
    }

    #[test]
    fn test_name_requires_lowercase_start() {
        let tokens = tokenize("abc9Z").unwrap();
        assert_eq!(kinds(&tokens), vec![TokenKind::Name]);
        assert_eq!(tokens[0].text, "abc9Z");

        assert!(matches!(tokenize("Zabc"), Err(CoreError::Lex { .. })));
    }

    #[test]
    fn test_structural_tokens() {
        let tokens = tokenize("f(a, b) { ; }").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Name,
                TokenKind::ParenStart,
                TokenKind::Name,
                TokenKind::Comma,
                TokenKind::Name,
                TokenKind::ParenEnd,
                TokenKind::BlockStart,
                TokenKind::EndOfLine,
                TokenKind::BlockEnd,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("a =\n  b;").unwrap();
        let a = &tokens[0];
        assert_eq!((a.line, a.column, a.start, a.end), (0, 0, 0, 1));

        let b = &tokens[2];
        assert_eq!((b.line, b.column), (1, 2));
        assert_eq!(&"a =\n  b;"[b.start..b.end], "b");
    }

    #[test]
    fn test_invalid_character_position() {
        let err = tokenize("a = $;").unwrap_err();
        match err {
            CoreError::Lex {
                line,
                column,
                character,
            } => {
                assert_eq!((line, column, character), (0, 4, '$'));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    proptest! {
        #[test]
        fn prop_tokenize_never_panics(src in ".*") {
            let _ = tokenize(&src);
        }

        #[test]
        fn prop_tokenize_deterministic(src in ".*") {
            let first = tokenize(&src);
            let second = tokenize(&src);
            match (first, second) {
                (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
                (Err(_), Err(_)) => {}
                _ => prop_assert!(false, "lexing is not deterministic"),
            }
        }

        #[test]
        fn prop_names_always_lex(name in "[a-z][a-zA-Z0-9]{0,8}") {
            // Identifiers that do not start with a keyword prefix lex as
            // a single name token.
            prop_assume!(!KEYWORDS.iter().any(|k| name.to_lowercase().starts_with(k)));
            let tokens = tokenize(&name).unwrap();
            prop_assert_eq!(tokens.len(), 1);
            prop_assert_eq!(tokens[0].kind, TokenKind::Name);
        }
    }
}
