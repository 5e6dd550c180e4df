/*!
Decoder for the Lua table literals embedded in save blobs.

The game serializes its save state as a single table constructor such as
`{["GAME"]={["round"]=3,["won"]=false},["cards"]={"j_joker","j_egg"}}`.
[`decode`] turns that text into a [`Value`] tree for display. Writing the
format back is not supported.
*/

use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::{Result, SaveError};

/// Deepest table nesting accepted before decoding is aborted
pub const MAX_DEPTH: usize = 128;

/// A numeric literal, kept as an integer whenever it fits
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Integer(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Number::Integer(i) => Some(i),
            Number::Float(_) => None,
        }
    }
}

// Floats compare by bit pattern so numbers can be used as table keys.
impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => a == b,
            (Number::Float(a), Number::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match *self {
            Number::Integer(i) => {
                0u8.hash(state);
                i.hash(state);
            }
            Number::Float(f) => {
                1u8.hash(state);
                f.to_bits().hash(state);
            }
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(i) => write!(f, "{i}"),
            Number::Float(x) => write!(f, "{x}"),
        }
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match *self {
            Number::Integer(i) => serializer.serialize_i64(i),
            Number::Float(f) => serializer.serialize_f64(f),
        }
    }
}

/// Key of a table entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    String(String),
    Number(Number),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::String(s) => f.write_str(s),
            Key::Number(n) => n.fmt(f),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::String(s.to_string())
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Number(Number::Integer(i))
    }
}

/// Decoded table literal
///
/// Tables whose entries are all positional decode to [`Value::Array`]; any
/// explicit key makes the whole table a [`Value::Table`]. Table equality
/// ignores entry order, but the decoded order is kept for rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Boolean(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Table(IndexMap<Key, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Table(_) => "table",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Look up a string key in a table
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Table(entries) => entries.get(&Key::from(key)),
            _ => None,
        }
    }

    /// Look up a 1-based position in an array, or the matching integer key in a table
    pub fn index(&self, position: i64) -> Option<&Value> {
        match self {
            Value::Array(items) => position
                .checked_sub(1)
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| items.get(i)),
            Value::Table(entries) => entries.get(&Key::from(position)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&IndexMap<Key, Value>> {
        match self {
            Value::Table(entries) => Some(entries),
            _ => None,
        }
    }
}

// Rendered as JSON-like data: tables become maps with stringified keys.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Nil => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Table(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&key.to_string(), value)?;
                }
                map.end()
            }
        }
    }
}

/// Decode a table literal
///
/// # Example
/// ```rust
/// use savebridge_core::table::{decode, Value};
///
/// let value = decode(r#"{a=1,b="x",c={1,2,3},d=true}"#)?;
/// assert_eq!(value.get("b").and_then(Value::as_str), Some("x"));
/// assert_eq!(value.get("c").and_then(Value::as_array).map(|c| c.len()), Some(3));
/// # Ok::<(), savebridge_core::SaveError>(())
/// ```
///
/// # Errors
/// * `SaveError::Decode` - with the byte offset of the offending token
pub fn decode(text: &str) -> Result<Value> {
    let tokens = Lexer::new(text).tokenize()?;
    let mut parser = Parser {
        tokens,
        cursor: 0,
        depth: 0,
    };

    let value = parser.parse_value()?;
    match parser.peek() {
        (Token::Eof, _) => Ok(value),
        (token, position) => Err(SaveError::decode(
            position,
            format!("unexpected {} after the top-level value", token.describe()),
        )),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Separator,
    Equals,
    Str(String),
    Num(Number),
    Ident(String),
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::Separator => "separator".to_string(),
            Token::Equals => "'='".to_string(),
            Token::Str(_) => "string".to_string(),
            Token::Num(n) => format!("number {n}"),
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::Eof => "end of input".to_string(),
        }
    }
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            src: text.as_bytes(),
            pos: 0,
        }
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let start = self.pos;
            let Some(&c) = self.src.get(self.pos) else {
                tokens.push((Token::Eof, start));
                return Ok(tokens);
            };

            let token = match c {
                b'{' => self.single(Token::LBrace),
                b'}' => self.single(Token::RBrace),
                b']' => self.single(Token::RBracket),
                b',' | b';' => self.single(Token::Separator),
                b'=' => self.single(Token::Equals),
                b'[' => match self.long_bracket_level(start) {
                    Some(level) => Token::Str(self.long_string(start, level)?),
                    None => self.single(Token::LBracket),
                },
                b'"' | b'\'' => Token::Str(self.quoted_string(c)?),
                b'-' | b'.' | b'0'..=b'9' => Token::Num(self.number()?),
                c if c == b'_' || c.is_ascii_alphabetic() => Token::Ident(self.identifier()?),
                other => {
                    return Err(SaveError::decode(
                        start,
                        format!("unexpected character '{}'", char::from(other).escape_default()),
                    ))
                }
            };
            tokens.push((token, start));
        }
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    /// Skip whitespace and `--` comments
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek_at(0) {
                Some(c) if c.is_ascii_whitespace() || c == 0 => self.pos += 1,
                Some(b'-') if self.peek_at(1) == Some(b'-') => {
                    let start = self.pos;
                    self.pos += 2;
                    if self.peek_at(0) == Some(b'[') {
                        if let Some(level) = self.long_bracket_level(self.pos) {
                            self.long_string(start, level)?;
                            continue;
                        }
                    }
                    while let Some(c) = self.peek_at(0) {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Level of a `[==[` opener at `at`, if there is one
    fn long_bracket_level(&self, at: usize) -> Option<usize> {
        let mut i = at + 1;
        while self.src.get(i) == Some(&b'=') {
            i += 1;
        }
        (self.src.get(i) == Some(&b'[')).then(|| i - at - 1)
    }

    fn long_string(&mut self, start: usize, level: usize) -> Result<String> {
        self.pos += level + 2;
        // A newline directly after the opener is not part of the string.
        if self.peek_at(0) == Some(b'\r') {
            self.pos += 1;
        }
        if self.peek_at(0) == Some(b'\n') {
            self.pos += 1;
        }

        let body_start = self.pos;
        while self.pos < self.src.len() {
            if self.src[self.pos] == b']' {
                let closes = (1..=level).all(|i| self.peek_at(i) == Some(b'='))
                    && self.peek_at(level + 1) == Some(b']');
                if closes {
                    let body = std::str::from_utf8(&self.src[body_start..self.pos]).map_err(|e| {
                        SaveError::decode(body_start + e.valid_up_to(), "long string is not valid UTF-8")
                    })?;
                    self.pos += level + 2;
                    return Ok(body.to_owned());
                }
            }
            self.pos += 1;
        }
        Err(SaveError::decode(start, "unterminated long string"))
    }

    fn quoted_string(&mut self, quote: u8) -> Result<String> {
        let start = self.pos;
        self.pos += 1;
        let mut bytes = Vec::new();

        loop {
            let Some(c) = self.peek_at(0) else {
                return Err(SaveError::decode(start, "unterminated string"));
            };
            self.pos += 1;
            match c {
                c if c == quote => break,
                b'\n' => return Err(SaveError::decode(start, "unterminated string")),
                b'\\' => self.escape(&mut bytes)?,
                c => bytes.push(c),
            }
        }

        // Escapes can produce arbitrary bytes; the decoded text must still be UTF-8.
        String::from_utf8(bytes).map_err(|_| SaveError::decode(start, "string is not valid UTF-8"))
    }

    fn escape(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let at = self.pos - 1;
        let Some(c) = self.peek_at(0) else {
            return Err(SaveError::decode(at, "unterminated escape sequence"));
        };
        self.pos += 1;

        match c {
            b'n' | b'\n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'v' => out.push(0x0b),
            b'\\' | b'"' | b'\'' => out.push(c),
            b'z' => {
                while self.peek_at(0).is_some_and(|c| c.is_ascii_whitespace()) {
                    self.pos += 1;
                }
            }
            b'x' => {
                let hex = self
                    .src
                    .get(self.pos..self.pos + 2)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| SaveError::decode(at, "invalid \\x escape"))?;
                self.pos += 2;
                out.push(hex);
            }
            b'0'..=b'9' => {
                let mut value = u32::from(c - b'0');
                for _ in 0..2 {
                    match self.peek_at(0) {
                        Some(d @ b'0'..=b'9') => {
                            value = value * 10 + u32::from(d - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                let byte = u8::try_from(value)
                    .map_err(|_| SaveError::decode(at, "decimal escape too large"))?;
                out.push(byte);
            }
            b'u' => {
                let close = self.src[self.pos..]
                    .iter()
                    .position(|&b| b == b'}')
                    .filter(|_| self.peek_at(0) == Some(b'{'))
                    .ok_or_else(|| SaveError::decode(at, "invalid \\u escape"))?;
                let digits = std::str::from_utf8(&self.src[self.pos + 1..self.pos + close])
                    .ok()
                    .and_then(|h| u32::from_str_radix(h, 16).ok())
                    .and_then(char::from_u32)
                    .ok_or_else(|| SaveError::decode(at, "invalid \\u escape"))?;
                self.pos += close + 1;
                let mut buf = [0u8; 4];
                out.extend_from_slice(digits.encode_utf8(&mut buf).as_bytes());
            }
            other => {
                return Err(SaveError::decode(
                    at,
                    format!("invalid escape '\\{}'", char::from(other).escape_default()),
                ))
            }
        }
        Ok(())
    }

    fn number(&mut self) -> Result<Number> {
        let start = self.pos;
        if self.peek_at(0) == Some(b'-') {
            self.pos += 1;
        }

        let is_hex = self.peek_at(0) == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X'));
        if is_hex {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek_at(0).is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits = std::str::from_utf8(&self.src[digits_start..self.pos])
                .ok()
                .filter(|d| !d.is_empty())
                .ok_or_else(|| SaveError::decode(start, "malformed hexadecimal number"))?;
            // Lua wraps hex literals that overflow 64 bits.
            let magnitude = u64::from_str_radix(digits, 16)
                .map_err(|_| SaveError::decode(start, "hexadecimal number out of range"))?
                as i64;
            let negative = self.src[start] == b'-';
            return Ok(Number::Integer(if negative {
                magnitude.wrapping_neg()
            } else {
                magnitude
            }));
        }

        let mut is_float = false;
        let mut saw_digit = false;
        while let Some(c) = self.peek_at(0) {
            match c {
                b'0'..=b'9' => saw_digit = true,
                b'.' => is_float = true,
                b'e' | b'E' => {
                    is_float = true;
                    if matches!(self.peek_at(1), Some(b'+' | b'-')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
            self.pos += 1;
        }

        if self.peek_at(0).is_some_and(|c| c == b'_' || c.is_ascii_alphabetic()) {
            return Err(SaveError::decode(start, "malformed number"));
        }

        // Lexer only gets here on ASCII bytes, so the slice is valid UTF-8.
        let literal = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| SaveError::decode(start, "malformed number"))?;
        if !saw_digit {
            return Err(SaveError::decode(
                start,
                format!("malformed number '{literal}'"),
            ));
        }

        if !is_float {
            if let Ok(i) = literal.parse::<i64>() {
                return Ok(Number::Integer(i));
            }
        }
        literal
            .parse::<f64>()
            .map(Number::Float)
            .map_err(|_| SaveError::decode(start, format!("malformed number '{literal}'")))
    }

    fn identifier(&mut self) -> Result<String> {
        let start = self.pos;
        while self
            .peek_at(0)
            .is_some_and(|c| c == b'_' || c.is_ascii_alphanumeric())
        {
            self.pos += 1;
        }
        std::str::from_utf8(&self.src[start..self.pos])
            .map(str::to_owned)
            .map_err(|_| SaveError::decode(start, "malformed identifier"))
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    cursor: usize,
    depth: usize,
}

/// What the next table entry looks like, decided before any recursion
enum EntryShape {
    Close,
    Unterminated,
    Bracketed,
    Named,
    Positional,
}

impl Parser {
    fn peek(&self) -> (&Token, usize) {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> (&Token, usize) {
        // The token stream always ends in Eof.
        let last = self.tokens.len() - 1;
        let (token, position) = &self.tokens[(self.cursor + n).min(last)];
        (token, *position)
    }

    /// Step past the current token, returning its position
    fn bump(&mut self) -> usize {
        let (_, position) = self.peek();
        if self.cursor < self.tokens.len() - 1 {
            self.cursor += 1;
        }
        position
    }

    /// Move the current token out of the stream
    fn take(&mut self) -> (Token, usize) {
        let last = self.tokens.len() - 1;
        let index = self.cursor.min(last);
        if index == last {
            return self.tokens[last].clone();
        }
        self.cursor += 1;
        let (token, position) = &mut self.tokens[index];
        (std::mem::replace(token, Token::Eof), *position)
    }

    fn expect(&mut self, expected: Token) -> Result<usize> {
        let (token, position) = self.peek();
        if *token == expected {
            Ok(self.bump())
        } else {
            Err(SaveError::decode(
                position,
                format!("expected {}, found {}", expected.describe(), token.describe()),
            ))
        }
    }

    fn parse_value(&mut self) -> Result<Value> {
        if let (Token::LBrace, _) = self.peek() {
            let open = self.bump();
            return self.parse_table(open);
        }

        let (token, position) = self.take();
        match token {
            Token::Str(s) => Ok(Value::String(s)),
            Token::Num(n) => Ok(Value::Number(n)),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                "nil" => Ok(Value::Nil),
                _ => Err(SaveError::decode(
                    position,
                    format!("unexpected identifier '{name}', expected a value"),
                )),
            },
            Token::Eof => Err(SaveError::decode(position, "expected a value, found end of input")),
            other => Err(SaveError::decode(
                position,
                format!("expected a value, found {}", other.describe()),
            )),
        }
    }

    fn entry_shape(&self) -> EntryShape {
        match self.peek() {
            (Token::RBrace, _) => EntryShape::Close,
            (Token::Eof, _) => EntryShape::Unterminated,
            (Token::LBracket, _) => EntryShape::Bracketed,
            (Token::Ident(_), _) if *self.peek_nth(1).0 == Token::Equals => EntryShape::Named,
            _ => EntryShape::Positional,
        }
    }

    fn parse_table(&mut self, open: usize) -> Result<Value> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(SaveError::decode(
                open,
                format!("tables nested deeper than {MAX_DEPTH} levels"),
            ));
        }

        let mut entries: IndexMap<Key, Value> = IndexMap::new();
        let mut positional_only = true;
        let mut next_index: i64 = 1;

        loop {
            match self.entry_shape() {
                EntryShape::Close => {
                    self.bump();
                    break;
                }
                EntryShape::Unterminated => {
                    return Err(SaveError::decode(open, "unterminated table"));
                }
                EntryShape::Bracketed => {
                    self.bump();
                    let key_position = self.peek().1;
                    let key = table_key(self.parse_value()?, key_position)?;
                    self.expect(Token::RBracket)?;
                    self.expect(Token::Equals)?;
                    let value = self.parse_value()?;
                    positional_only = false;
                    entries.insert(key, value);
                }
                EntryShape::Named => {
                    let key = match self.take() {
                        (Token::Ident(name), _) => Key::String(name),
                        (_, position) => {
                            return Err(SaveError::decode(position, "expected a field name"))
                        }
                    };
                    self.bump();
                    let value = self.parse_value()?;
                    positional_only = false;
                    entries.insert(key, value);
                }
                EntryShape::Positional => {
                    let value = self.parse_value()?;
                    entries.insert(Key::from(next_index), value);
                    next_index += 1;
                }
            }

            self.entry_separator(open)?;
        }

        self.depth -= 1;
        if positional_only {
            Ok(Value::Array(entries.into_values().collect()))
        } else {
            Ok(Value::Table(entries))
        }
    }

    fn entry_separator(&mut self, open: usize) -> Result<()> {
        match self.peek() {
            (Token::Separator, _) => {
                self.bump();
                Ok(())
            }
            (Token::RBrace, _) => Ok(()),
            (Token::Eof, _) => Err(SaveError::decode(open, "unterminated table")),
            (token, position) => Err(SaveError::decode(
                position,
                format!("expected ',' or '}}', found {}", token.describe()),
            )),
        }
    }
}

fn table_key(value: Value, position: usize) -> Result<Key> {
    match value {
        Value::String(s) => Ok(Key::String(s)),
        Value::Number(Number::Float(f)) if f.is_nan() => {
            Err(SaveError::decode(position, "table key cannot be NaN"))
        }
        // Integral floats address the same slot as the integer.
        Value::Number(Number::Float(f))
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 =>
        {
            Ok(Key::Number(Number::Integer(f as i64)))
        }
        Value::Number(n) => Ok(Key::Number(n)),
        other => Err(SaveError::decode(
            position,
            format!("unsupported table key of type {}", other.type_name()),
        )),
    }
}
