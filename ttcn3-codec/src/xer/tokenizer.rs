//! Minimal pull tokenizer for the XML subset XER produces
//!
//! Handles start/end/empty tags with attributes, character data with
//! entity references, comments and processing instructions (skipped).
//! No DTD support; a DOCTYPE declaration is skipped like a comment.

use ttcn3_value::error::{CodecError, CodecResult};

/// One lexical item of the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlToken {
    StartTag {
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    /// Character data with entities resolved; adjacent runs coalesced
    Text(String),
}

pub struct XmlTokenizer<'a> {
    input: &'a str,
    pos: usize,
    peeked: Option<Option<XmlToken>>,
}

impl<'a> XmlTokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            peeked: None,
        }
    }

    /// Byte offset of the read position
    ///
    /// Only meaningful while no token is buffered by [`peek`](Self::peek).
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Everything from byte offset `from` to the read position
    pub fn raw_since(&self, from: usize) -> &'a str {
        &self.input[from..self.pos]
    }

    pub fn peek(&mut self) -> CodecResult<Option<&XmlToken>> {
        if self.peeked.is_none() {
            let token = self.lex()?;
            self.peeked = Some(token);
        }
        Ok(self.peeked.as_ref().unwrap().as_ref())
    }

    pub fn next(&mut self) -> CodecResult<Option<XmlToken>> {
        if let Some(token) = self.peeked.take() {
            return Ok(token);
        }
        self.lex()
    }

    fn lex(&mut self) -> CodecResult<Option<XmlToken>> {
        loop {
            if self.pos >= self.input.len() {
                return Ok(None);
            }
            if self.rest().starts_with("<!--") {
                self.skip_past("-->")?;
                continue;
            }
            if self.rest().starts_with("<?") {
                self.skip_past("?>")?;
                continue;
            }
            if self.rest().starts_with("<!") {
                self.skip_past(">")?;
                continue;
            }
            if self.rest().starts_with("</") {
                return self.lex_end_tag().map(Some);
            }
            if self.rest().starts_with('<') {
                return self.lex_start_tag().map(Some);
            }
            return self.lex_text().map(Some);
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_past(&mut self, marker: &str) -> CodecResult<()> {
        match self.rest().find(marker) {
            Some(found) => {
                self.pos += found + marker.len();
                Ok(())
            }
            None => Err(CodecError::InvalidToken(format!(
                "unterminated construct, missing {:?}",
                marker
            ))),
        }
    }

    fn lex_end_tag(&mut self) -> CodecResult<XmlToken> {
        self.pos += 2;
        let name = self.lex_name()?;
        self.skip_whitespace();
        if !self.rest().starts_with('>') {
            return Err(CodecError::InvalidToken(format!(
                "malformed end tag </{}",
                name
            )));
        }
        self.pos += 1;
        Ok(XmlToken::EndTag { name })
    }

    fn lex_start_tag(&mut self) -> CodecResult<XmlToken> {
        self.pos += 1;
        let name = self.lex_name()?;
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            if self.rest().starts_with("/>") {
                self.pos += 2;
                return Ok(XmlToken::StartTag {
                    name,
                    attributes,
                    self_closing: true,
                });
            }
            if self.rest().starts_with('>') {
                self.pos += 1;
                return Ok(XmlToken::StartTag {
                    name,
                    attributes,
                    self_closing: false,
                });
            }
            let attr_name = self.lex_name()?;
            self.skip_whitespace();
            if !self.rest().starts_with('=') {
                return Err(CodecError::InvalidToken(format!(
                    "attribute {} has no value",
                    attr_name
                )));
            }
            self.pos += 1;
            self.skip_whitespace();
            let quote = match self.rest().chars().next() {
                Some(q @ ('"' | '\'')) => q,
                _ => {
                    return Err(CodecError::InvalidToken(format!(
                        "attribute {} value is not quoted",
                        attr_name
                    )));
                }
            };
            self.pos += 1;
            let end = self.rest().find(quote).ok_or_else(|| {
                CodecError::InvalidToken(format!("unterminated value of attribute {}", attr_name))
            })?;
            let raw = &self.rest()[..end];
            let value = decode_entities(raw)?;
            self.pos += end + 1;
            attributes.push((attr_name, value));
        }
    }

    fn lex_text(&mut self) -> CodecResult<XmlToken> {
        let end = self.rest().find('<').unwrap_or(self.rest().len());
        let raw = &self.rest()[..end];
        self.pos += end;
        Ok(XmlToken::Text(decode_entities(raw)?))
    }

    fn lex_name(&mut self) -> CodecResult<String> {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|(_, c)| !is_name_char(*c))
            .map_or(rest.len(), |(pos, _)| pos);
        if end == 0 {
            return Err(CodecError::InvalidToken(format!(
                "expected a name at {:?}",
                &rest[..rest.len().min(16)]
            )));
        }
        self.pos += end;
        Ok(rest[..end].to_string())
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|(_, c)| !c.is_ascii_whitespace())
            .map_or(rest.len(), |(pos, _)| pos);
        self.pos += end;
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

/// Resolve the predefined entities and numeric character references
pub fn decode_entities(text: &str) -> CodecResult<String> {
    if !text.contains('&') {
        return Ok(text.to_string());
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let semi = rest.find(';').ok_or_else(|| {
            CodecError::InvalidToken("unterminated entity reference".to_string())
        })?;
        let entity = &rest[1..semi];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                let c = code.and_then(char::from_u32).ok_or_else(|| {
                    CodecError::InvalidToken(format!("unknown entity &{};", entity))
                })?;
                out.push(c);
            }
        }
        rest = &rest[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Escape character data for element content
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape character data for a double-quoted attribute value
pub fn escape_attribute(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_element() {
        let mut lexer = XmlTokenizer::new("<a x=\"1\">hi</a>");
        assert_eq!(
            lexer.next().unwrap().unwrap(),
            XmlToken::StartTag {
                name: "a".to_string(),
                attributes: vec![("x".to_string(), "1".to_string())],
                self_closing: false,
            }
        );
        assert_eq!(lexer.next().unwrap().unwrap(), XmlToken::Text("hi".to_string()));
        assert_eq!(
            lexer.next().unwrap().unwrap(),
            XmlToken::EndTag {
                name: "a".to_string()
            }
        );
        assert!(lexer.next().unwrap().is_none());
    }

    #[test]
    fn test_self_closing_and_comments() {
        let mut lexer = XmlTokenizer::new("<!-- note --><br/>");
        assert_eq!(
            lexer.next().unwrap().unwrap(),
            XmlToken::StartTag {
                name: "br".to_string(),
                attributes: vec![],
                self_closing: true,
            }
        );
    }

    #[test]
    fn test_entities() {
        assert_eq!(decode_entities("a&lt;b&amp;c&#x41;").unwrap(), "a<b&cA");
        assert!(decode_entities("&bogus;").is_err());
        assert_eq!(escape_text("a<b&c"), "a&lt;b&amp;c");
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut lexer = XmlTokenizer::new("<a/>");
        assert!(matches!(
            lexer.peek().unwrap().unwrap(),
            XmlToken::StartTag { .. }
        ));
        assert!(matches!(
            lexer.next().unwrap().unwrap(),
            XmlToken::StartTag { .. }
        ));
        assert!(lexer.next().unwrap().is_none());
    }
}
