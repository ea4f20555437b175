//! Pull tokenizer and writer for JSON texts
//!
//! The reader hands out one token per structural item and treats commas
//! and colons as separators; a string directly followed by a colon is a
//! member name. The writer produces either compact or pretty output and
//! takes care of separators and indentation itself.

use ttcn3_value::error::{CodecError, CodecResult};

/// One lexical item of a JSON text
#[derive(Debug, Clone, PartialEq)]
pub enum JsonToken {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    /// Object member name, colon consumed
    Name(String),
    /// String value with escapes resolved
    String(String),
    /// Number value, kept as source text
    Number(String),
    True,
    False,
    Null,
}

pub struct JsonTokenizer<'a> {
    input: &'a [u8],
    pos: usize,
    peeked: Option<Option<JsonToken>>,
}

impl<'a> JsonTokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
            peeked: None,
        }
    }

    pub fn peek(&mut self) -> CodecResult<Option<&JsonToken>> {
        if self.peeked.is_none() {
            let token = self.lex()?;
            self.peeked = Some(token);
        }
        Ok(self.peeked.as_ref().unwrap().as_ref())
    }

    pub fn next(&mut self) -> CodecResult<Option<JsonToken>> {
        if let Some(token) = self.peeked.take() {
            return Ok(token);
        }
        self.lex()
    }

    /// Reader position, peeked token included
    pub(crate) fn snapshot(&self) -> (usize, Option<Option<JsonToken>>) {
        (self.pos, self.peeked.clone())
    }

    pub(crate) fn restore(&mut self, snapshot: (usize, Option<Option<JsonToken>>)) {
        self.pos = snapshot.0;
        self.peeked = snapshot.1;
    }

    fn lex(&mut self) -> CodecResult<Option<JsonToken>> {
        self.skip_separators();
        let Some(&c) = self.input.get(self.pos) else {
            return Ok(None);
        };
        match c {
            b'{' => {
                self.pos += 1;
                Ok(Some(JsonToken::ObjectStart))
            }
            b'}' => {
                self.pos += 1;
                Ok(Some(JsonToken::ObjectEnd))
            }
            b'[' => {
                self.pos += 1;
                Ok(Some(JsonToken::ArrayStart))
            }
            b']' => {
                self.pos += 1;
                Ok(Some(JsonToken::ArrayEnd))
            }
            b'"' => {
                let text = self.lex_string()?;
                self.skip_separators_except_colon();
                if self.input.get(self.pos) == Some(&b':') {
                    self.pos += 1;
                    Ok(Some(JsonToken::Name(text)))
                } else {
                    Ok(Some(JsonToken::String(text)))
                }
            }
            b't' | b'f' | b'n' => self.lex_keyword().map(Some),
            b'-' | b'0'..=b'9' => self.lex_number().map(Some),
            other => Err(CodecError::InvalidToken(format!(
                "unexpected character {:?} in JSON text",
                other as char
            ))),
        }
    }

    fn skip_separators(&mut self) {
        while let Some(&c) = self.input.get(self.pos) {
            if c.is_ascii_whitespace() || c == b',' || c == b':' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn skip_separators_except_colon(&mut self) {
        while let Some(&c) = self.input.get(self.pos) {
            if c.is_ascii_whitespace() || c == b',' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn lex_keyword(&mut self) -> CodecResult<JsonToken> {
        for (word, token) in [
            ("true", JsonToken::True),
            ("false", JsonToken::False),
            ("null", JsonToken::Null),
        ] {
            if self.input[self.pos..].starts_with(word.as_bytes()) {
                self.pos += word.len();
                return Ok(token);
            }
        }
        Err(CodecError::InvalidToken(
            "malformed JSON keyword".to_string(),
        ))
    }

    fn lex_number(&mut self) -> CodecResult<JsonToken> {
        let start = self.pos;
        if self.input.get(self.pos) == Some(&b'-') {
            self.pos += 1;
        }
        while self
            .input
            .get(self.pos)
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, b'.' | b'e' | b'E' | b'+' | b'-'))
        {
            self.pos += 1;
        }
        if self.pos == start || (self.pos == start + 1 && self.input[start] == b'-') {
            return Err(CodecError::InvalidToken("malformed number".to_string()));
        }
        let text = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| CodecError::Internal("number slice is not UTF-8".to_string()))?;
        Ok(JsonToken::Number(text.to_string()))
    }

    fn lex_string(&mut self) -> CodecResult<String> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(&c) = self.input.get(self.pos) else {
                return Err(CodecError::Incomplete("unterminated string".to_string()));
            };
            match c {
                b'"' => {
                    self.pos += 1;
                    return Ok(out);
                }
                b'\\' => {
                    self.pos += 1;
                    let Some(&esc) = self.input.get(self.pos) else {
                        return Err(CodecError::Incomplete("unterminated escape".to_string()));
                    };
                    self.pos += 1;
                    match esc {
                        b'"' => out.push('"'),
                        b'\\' => out.push('\\'),
                        b'/' => out.push('/'),
                        b'b' => out.push('\u{8}'),
                        b'f' => out.push('\u{c}'),
                        b'n' => out.push('\n'),
                        b'r' => out.push('\r'),
                        b't' => out.push('\t'),
                        b'u' => {
                            let unit = self.lex_hex4()?;
                            let c = if (0xD800..0xDC00).contains(&unit) {
                                // High surrogate, must pair with \uDC00..\uDFFF
                                if !self.input[self.pos..].starts_with(b"\\u") {
                                    return Err(CodecError::InvalidToken(
                                        "unpaired surrogate escape".to_string(),
                                    ));
                                }
                                self.pos += 2;
                                let low = self.lex_hex4()?;
                                if !(0xDC00..0xE000).contains(&low) {
                                    return Err(CodecError::InvalidToken(
                                        "invalid low surrogate".to_string(),
                                    ));
                                }
                                let code =
                                    0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                                char::from_u32(code)
                            } else {
                                char::from_u32(unit)
                            };
                            out.push(c.ok_or_else(|| {
                                CodecError::InvalidToken("invalid unicode escape".to_string())
                            })?);
                        }
                        other => {
                            return Err(CodecError::InvalidToken(format!(
                                "invalid escape \\{}",
                                other as char
                            )));
                        }
                    }
                }
                _ => {
                    // Copy one whole UTF-8 sequence
                    let rest = std::str::from_utf8(&self.input[self.pos..]).map_err(|_| {
                        CodecError::InvalidData("string is not valid UTF-8".to_string())
                    })?;
                    let c = rest.chars().next().unwrap();
                    out.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn lex_hex4(&mut self) -> CodecResult<u32> {
        let slice = self
            .input
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| CodecError::Incomplete("truncated unicode escape".to_string()))?;
        let text = std::str::from_utf8(slice)
            .map_err(|_| CodecError::InvalidToken("malformed unicode escape".to_string()))?;
        let unit = u32::from_str_radix(text, 16)
            .map_err(|_| CodecError::InvalidToken("malformed unicode escape".to_string()))?;
        self.pos += 4;
        Ok(unit)
    }
}

/// JSON writer with optional pretty printing
///
/// Tracks nesting itself; callers just emit tokens in order.
pub struct JsonWriter {
    out: String,
    pretty: bool,
    depth: usize,
    /// Whether a separator is due before the next item at each level
    pending: Vec<bool>,
    /// The next item is the value of a just-written member name
    after_name: bool,
}

impl JsonWriter {
    pub fn new(pretty: bool) -> Self {
        Self {
            out: String::new(),
            pretty,
            depth: 0,
            pending: vec![false],
            after_name: false,
        }
    }

    pub fn into_string(self) -> String {
        self.out
    }

    pub fn object_start(&mut self) {
        self.separate();
        self.out.push('{');
        self.depth += 1;
        self.pending.push(false);
    }

    pub fn object_end(&mut self) {
        let had_members = self.pending.pop().unwrap_or(false);
        self.depth -= 1;
        if had_members {
            self.break_line();
        }
        self.out.push('}');
    }

    pub fn array_start(&mut self) {
        self.separate();
        self.out.push('[');
        self.depth += 1;
        self.pending.push(false);
    }

    pub fn array_end(&mut self) {
        let had_members = self.pending.pop().unwrap_or(false);
        self.depth -= 1;
        if had_members {
            self.break_line();
        }
        self.out.push(']');
    }

    pub fn name(&mut self, name: &str) {
        self.separate();
        self.out.push('"');
        self.out.push_str(&escape_string(name));
        self.out.push('"');
        self.out.push(':');
        if self.pretty {
            self.out.push(' ');
        }
        self.after_name = true;
    }

    /// Raw token text, already valid JSON
    pub fn raw(&mut self, text: &str) {
        self.separate();
        self.out.push_str(text);
    }

    pub fn string(&mut self, text: &str) {
        self.separate();
        self.out.push('"');
        self.out.push_str(&escape_string(text));
        self.out.push('"');
    }

    fn separate(&mut self) {
        if self.after_name {
            self.after_name = false;
            return;
        }
        match self.pending.last_mut() {
            Some(pending) if *pending => {
                self.out.push(',');
                self.break_line();
            }
            Some(pending) => {
                *pending = true;
                if self.depth > 0 {
                    self.break_line();
                }
            }
            None => {}
        }
    }

    fn break_line(&mut self) {
        if self.pretty {
            self.out.push('\n');
            for _ in 0..self.depth {
                self.out.push('\t');
            }
        }
    }
}

/// Escape a string for a double-quoted JSON literal
pub fn escape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_tokens() {
        let mut lexer = JsonTokenizer::new("{\"a\": 1, \"b\": [true, null]}");
        let expected = [
            JsonToken::ObjectStart,
            JsonToken::Name("a".to_string()),
            JsonToken::Number("1".to_string()),
            JsonToken::Name("b".to_string()),
            JsonToken::ArrayStart,
            JsonToken::True,
            JsonToken::Null,
            JsonToken::ArrayEnd,
            JsonToken::ObjectEnd,
        ];
        for token in expected {
            assert_eq!(lexer.next().unwrap().unwrap(), token);
        }
        assert!(lexer.next().unwrap().is_none());
    }

    #[test]
    fn test_string_escapes() {
        let mut lexer = JsonTokenizer::new(r#""a\"b\nA😀""#);
        assert_eq!(
            lexer.next().unwrap().unwrap(),
            JsonToken::String("a\"b\nA\u{1F600}".to_string())
        );
    }

    #[test]
    fn test_compact_writer() {
        let mut writer = JsonWriter::new(false);
        writer.object_start();
        writer.name("x");
        writer.raw("7");
        writer.name("y");
        writer.array_start();
        writer.string("a");
        writer.string("b");
        writer.array_end();
        writer.object_end();
        assert_eq!(writer.into_string(), "{\"x\":7,\"y\":[\"a\",\"b\"]}");
    }

    #[test]
    fn test_pretty_writer() {
        let mut writer = JsonWriter::new(true);
        writer.object_start();
        writer.name("x");
        writer.raw("7");
        writer.object_end();
        assert_eq!(writer.into_string(), "{\n\t\"x\": 7\n}");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("a\"b\\c\n"), "a\\\"b\\\\c\\n");
        assert_eq!(escape_string("\u{1}"), "\\u0001");
    }
}
