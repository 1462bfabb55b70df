//! OpenStep property-list values as they appear inside a project document
//!
//! Only the subset the IDE writes is supported: strings (quoted or bare),
//! arrays, dictionaries and `/* */` / `//` comments. Comments are skipped on
//! read; the serializer regenerates them.

use std::fmt;

/// A property-list value. Dictionaries keep their key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    Array(Vec<Value>),
    Dict(Vec<(String, Value)>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
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

    pub fn as_dict(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Dict(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a key in a dictionary value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_dict()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Array of plain strings, `None` if any element is not a string
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        self.as_array()?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Whether a string must be quoted to survive a round trip
pub fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.contains("//")
        || s.contains("/*")
        || !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '/' | ':' | '.'))
}

/// Render a string the way the IDE does, quoting and escaping when needed
pub fn quote(s: &str) -> String {
    if !needs_quotes(s) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Error raised by [`Reader`]; carries a byte offset into the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadError {
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.message, self.offset)
    }
}

/// Cursor over property-list text
pub struct Reader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(src: &'a str) -> Self {
        Reader { src, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn error(&self, message: impl Into<String>) -> ReadError {
        ReadError {
            offset: self.pos,
            message: message.into(),
        }
    }

    /// Skip whitespace and comments
    pub fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();
            if trimmed.starts_with("/*") {
                match trimmed[2..].find("*/") {
                    Some(end) => self.pos += end + 4,
                    None => self.pos = self.src.len(),
                }
            } else if trimmed.starts_with("//") {
                match trimmed.find('\n') {
                    Some(end) => self.pos += end + 1,
                    None => self.pos = self.src.len(),
                }
            } else {
                return;
            }
        }
    }

    /// Skip whitespace, then capture a `/* ... */` comment if one follows
    pub fn take_comment(&mut self) -> Option<String> {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        let body = trimmed.strip_prefix("/*")?;
        let end = body.find("*/")?;
        self.pos += rest.len() - trimmed.len() + end + 4;
        Some(body[..end].trim().to_string())
    }

    pub fn at_end(&mut self) -> bool {
        self.skip_trivia();
        self.pos >= self.src.len()
    }

    /// Consume `expected` after optional trivia
    pub fn expect(&mut self, expected: char) -> Result<(), ReadError> {
        self.skip_trivia();
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`", expected)))
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_trivia();
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    /// Read a quoted or bare string
    pub fn read_string(&mut self) -> Result<String, ReadError> {
        self.skip_trivia();
        match self.peek() {
            Some('"') => self.read_quoted(),
            Some(c) if is_bare_char(c) => Ok(self.read_bare()),
            Some(c) => Err(self.error(format!("unexpected `{}`", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn read_bare(&mut self) -> String {
        let rest = self.rest();
        let mut len = 0;
        for (idx, c) in rest.char_indices() {
            if !is_bare_char(c) || rest[idx..].starts_with("/*") || rest[idx..].starts_with("//") {
                break;
            }
            len = idx + c.len_utf8();
        }
        self.pos += len;
        rest[..len].to_string()
    }

    fn read_quoted(&mut self) -> Result<String, ReadError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((idx, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += idx + 1;
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, other)) => out.push(other),
                    None => break,
                },
                _ => out.push(c),
            }
        }
        self.pos = start;
        Err(self.error("unterminated string"))
    }

    /// Read any value: string, `( ... )` array or `{ ... }` dictionary
    pub fn read_value(&mut self) -> Result<Value, ReadError> {
        self.skip_trivia();
        match self.peek() {
            Some('{') => {
                self.pos += 1;
                self.read_dict_body().map(Value::Dict)
            }
            Some('(') => {
                self.pos += 1;
                self.read_array_body().map(Value::Array)
            }
            _ => self.read_string().map(Value::String),
        }
    }

    fn read_dict_body(&mut self) -> Result<Vec<(String, Value)>, ReadError> {
        let mut entries = Vec::new();
        loop {
            if self.eat('}') {
                return Ok(entries);
            }
            let key = self.read_string()?;
            self.expect('=')?;
            let value = self.read_value()?;
            self.expect(';')?;
            entries.push((key, value));
        }
    }

    fn read_array_body(&mut self) -> Result<Vec<Value>, ReadError> {
        let mut items = Vec::new();
        loop {
            if self.eat(')') {
                return Ok(items);
            }
            items.push(self.read_value()?);
            if !self.eat(',') {
                self.expect(')')?;
                return Ok(items);
            }
        }
    }
}

fn is_bare_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '{' | '}' | '(' | ')' | '=' | ';' | ',' | '"')
}

/// Parse a single standalone value
pub fn parse_value(src: &str) -> Result<Value, ReadError> {
    let mut reader = Reader::new(src);
    let value = reader.read_value()?;
    if reader.at_end() {
        Ok(value)
    } else {
        Err(reader.error("trailing characters after value"))
    }
}
