//! XER decoder driven by type descriptors

use ttcn3_value::descriptor::xer::{instr, XerDescriptor};
use ttcn3_value::descriptor::{FieldDescriptor, TypeDescriptor, TypeKind};
use ttcn3_value::error::{CodecError, CodecResult, ErrorPolicy};
use ttcn3_value::value::{IntegerValue, Record, RecordOf, Value};

use super::tokenizer::{escape_attribute, escape_text, XmlToken, XmlTokenizer};
use super::{decode_base64, decode_hex, normalize_whitespace, require_xer, XerFlavor};

/// XER decoder pulling tokens from an XML document
pub struct XerDecoder<'a> {
    lexer: XmlTokenizer<'a>,
    flavor: XerFlavor,
    policy: &'a ErrorPolicy,
}

impl<'a> XerDecoder<'a> {
    pub fn new(input: &'a str, flavor: XerFlavor, policy: &'a ErrorPolicy) -> Self {
        Self {
            lexer: XmlTokenizer::new(input),
            flavor,
            policy,
        }
    }

    pub fn decode(&mut self, descriptor: &'static TypeDescriptor) -> CodecResult<Value> {
        self.decode_value(descriptor)
    }

    /// Check that nothing but whitespace follows the message
    pub fn finish(&mut self) -> CodecResult<()> {
        while let Some(token) = self.lexer.next()? {
            match token {
                XmlToken::Text(text) if text.trim().is_empty() => {}
                other => {
                    self.policy.dispatch(CodecError::Superfluous(format!(
                        "content after the end of the message: {:?}",
                        other
                    )))?;
                }
            }
        }
        Ok(())
    }

    fn decode_value(&mut self, descriptor: &'static TypeDescriptor) -> CodecResult<Value> {
        let xer = require_xer(descriptor)?;
        let ext = self.flavor.extended();

        if ext && xer.has(instr::ANY_ELEMENT) {
            return Ok(Value::from(self.reconstruct_element()?));
        }
        if ext && xer.has(instr::USE_QNAME) {
            return self.decode_qname(descriptor, xer);
        }
        if ext && xer.has(instr::UNTAGGED) && is_scalar(descriptor) {
            let text = self.text_run()?;
            return self.scalar_from_text(&text, descriptor, xer);
        }

        let (attributes, self_closing) = self.expect_start(xer, descriptor)?;

        match &descriptor.kind {
            TypeKind::Boolean => {
                if self_closing {
                    return Err(CodecError::InvalidData(format!(
                        "empty element for BOOLEAN type {}",
                        descriptor.name
                    )));
                }
                let value = self.decode_boolean_content(descriptor)?;
                self.expect_end(xer)?;
                Ok(value)
            }
            TypeKind::Integer | TypeKind::Float | TypeKind::CharString | TypeKind::OctetString => {
                let text = if self_closing {
                    String::new()
                } else {
                    let text = self.text_run()?;
                    self.expect_end(xer)?;
                    text
                };
                self.scalar_from_text(&text, descriptor, xer)
            }
            TypeKind::Record { fields, is_set } => self.decode_record(
                descriptor,
                xer,
                fields,
                *is_set,
                attributes,
                self_closing,
            ),
            TypeKind::RecordOf { element, .. } => {
                if ext && xer.has(instr::LIST) {
                    let text = if self_closing {
                        String::new()
                    } else {
                        let text = self.text_run()?;
                        self.expect_end(xer)?;
                        text
                    };
                    return self.decode_list(&text, element);
                }
                let mut sequence = RecordOf::new();
                if self_closing {
                    return Ok(Value::RecordOf(sequence));
                }
                let mut index = 0;
                loop {
                    match self.peek_non_ws()? {
                        Some(XmlToken::EndTag { .. }) => break,
                        Some(XmlToken::StartTag { .. }) => {
                            *sequence.get_at_mut(index)? = self.decode_value(element)?;
                            index += 1;
                        }
                        Some(other) => {
                            return Err(CodecError::InvalidToken(format!(
                                "unexpected {:?} inside {}",
                                other, descriptor.name
                            )));
                        }
                        None => {
                            return Err(CodecError::Incomplete(format!(
                                "element {} is not closed",
                                xer.name
                            )));
                        }
                    }
                }
                self.expect_end(xer)?;
                Ok(Value::RecordOf(sequence))
            }
            TypeKind::Empty => {
                if !self_closing {
                    self.expect_end(xer)?;
                }
                Ok(Value::EmptyRecord)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_record(
        &mut self,
        descriptor: &'static TypeDescriptor,
        xer: &'static XerDescriptor,
        fields: &'static [FieldDescriptor],
        is_set: bool,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    ) -> CodecResult<Value> {
        let ext = self.flavor.extended();
        let mut record = Record::new(fields.len());
        let mut decoded = vec![false; fields.len()];

        // Attribute fields come from the start tag
        let mut consumed_attr = vec![false; attributes.len()];
        let mut any_attribute_field = None;
        if ext {
            for (index, field_descr) in fields.iter().enumerate() {
                let Some(field_xer) = field_descr.ty.xer else {
                    continue;
                };
                if field_xer.has(instr::ANY_ATTRIBUTE) {
                    any_attribute_field = Some(index);
                    decoded[index] = true;
                } else if field_xer.has(instr::ATTRIBUTE) {
                    decoded[index] = true;
                    let found = attributes
                        .iter()
                        .position(|(name, _)| local_name(name) == field_xer.name);
                    match found {
                        Some(pos) => {
                            consumed_attr[pos] = true;
                            let value = self.scalar_from_text(
                                &attributes[pos].1,
                                field_descr.ty,
                                field_xer,
                            )?;
                            record.set_field(index, value)?;
                        }
                        None => {
                            record.set_field(index, self.absent_field(field_descr, descriptor)?)?;
                        }
                    }
                }
            }
        }
        if let Some(index) = any_attribute_field {
            let leftover: Vec<String> = attributes
                .iter()
                .zip(&consumed_attr)
                .filter(|((name, _), consumed)| {
                    !**consumed && !name.starts_with("xmlns") && local_name(name) != "nil"
                })
                .map(|((name, value), _)| format!("{}=\"{}\"", name, escape_attribute(value)))
                .collect();
            record.set_field(index, Value::from(leftover.join(" ")))?;
        }

        if ext && xer.has(instr::USE_NIL) {
            let carrier = fields.len() - 1;
            let nilled = attributes
                .iter()
                .any(|(name, value)| local_name(name) == "nil" && value == "true");
            if nilled || self_closing {
                record.set_field(carrier, Value::Omitted)?;
                if !self_closing {
                    self.expect_end(xer)?;
                }
            } else {
                let field_descr = &fields[carrier];
                let field_xer = require_xer(field_descr.ty)?;
                let value = if is_scalar(field_descr.ty) {
                    let text = self.text_run()?;
                    self.scalar_from_text(&text, field_descr.ty, field_xer)?
                } else {
                    self.decode_value(field_descr.ty)?
                };
                record.set_field(carrier, value)?;
                self.expect_end(xer)?;
            }
            for index in 0..carrier {
                if !decoded[index] && !record.get_field(index)?.is_bound() {
                    record.set_field(index, self.absent_field(&fields[index], descriptor)?)?;
                }
            }
            return Ok(Value::Record(record));
        }

        let use_order = ext && xer.has(instr::USE_ORDER);
        let embed_values = ext && xer.has(instr::EMBED_VALUES);
        if use_order || embed_values {
            decoded[0] = true;
        }

        let mut arrival: Vec<usize> = Vec::new();
        let mut embedded: Vec<String> = vec![String::new()];

        if !self_closing {
            loop {
                let token = match self.lexer.peek()? {
                    Some(token) => token.clone(),
                    None => {
                        return Err(CodecError::Incomplete(format!(
                            "element {} is not closed",
                            xer.name
                        )));
                    }
                };
                match token {
                    XmlToken::EndTag { .. } => break,
                    XmlToken::Text(text) => {
                        self.lexer.next()?;
                        if embed_values {
                            embedded.last_mut().unwrap().push_str(&text);
                        } else if !text.trim().is_empty() {
                            self.policy.dispatch(CodecError::InvalidToken(format!(
                                "stray text {:?} inside {}",
                                text.trim(),
                                descriptor.name
                            )))?;
                        }
                    }
                    XmlToken::StartTag { ref name, .. } => {
                        let local = local_name(name).to_string();
                        let matched = fields.iter().enumerate().find(|(index, f)| {
                            !decoded[*index]
                                && f.ty
                                    .xer
                                    .is_some_and(|x| x.name == local)
                        });
                        match matched {
                            Some((index, field_descr)) => {
                                let value = self.decode_value(field_descr.ty)?;
                                record.set_field(index, value)?;
                                decoded[index] = true;
                                arrival.push(index);
                                if embed_values {
                                    embedded.push(String::new());
                                }
                            }
                            None => {
                                self.policy.dispatch(CodecError::Superfluous(format!(
                                    "unexpected element <{}> inside {}",
                                    local, descriptor.name
                                )))?;
                                self.skip_element()?;
                            }
                        }
                    }
                }
            }
            self.expect_end(xer)?;
        }

        // In-order arrival is mandatory for a plain record; a set and an
        // ordered record accept any order
        if !is_set && !use_order {
            let mut last = 0;
            for &index in &arrival {
                if index < last {
                    self.policy.dispatch(CodecError::InvalidToken(format!(
                        "field {} of {} arrived out of order",
                        fields[index].name, descriptor.name
                    )))?;
                }
                last = index;
            }
        }

        if use_order {
            let expected: Vec<usize> = (1..fields.len())
                .filter(|&i| {
                    !fields[i]
                        .ty
                        .xer
                        .is_some_and(|x| x.has(instr::ATTRIBUTE) || x.has(instr::ANY_ATTRIBUTE))
                })
                .collect();
            let present: Vec<usize> = arrival
                .iter()
                .copied()
                .filter(|i| expected.contains(i))
                .collect();
            if present.len() != expected.len() {
                return Err(CodecError::Constraint(format!(
                    "{} content fields of {} arrived, {} expected",
                    present.len(),
                    expected.len(),
                    descriptor.name
                )));
            }
            let mut order = RecordOf::new();
            for (slot, index) in present.iter().enumerate() {
                *order.get_at_mut(slot)? =
                    Value::Integer(IntegerValue::Native(*index as i64 - 1));
            }
            record.set_field(0, Value::RecordOf(order))?;
        }
        if embed_values {
            let mut texts = RecordOf::new();
            for (slot, text) in embedded.iter().enumerate() {
                *texts.get_at_mut(slot)? = Value::from(text.as_str());
            }
            record.set_field(0, Value::RecordOf(texts))?;
        }

        for (index, field_descr) in fields.iter().enumerate() {
            if decoded[index] || record.get_field(index)?.is_bound() {
                continue;
            }
            record.set_field(index, self.absent_field(field_descr, descriptor)?)?;
        }
        Ok(Value::Record(record))
    }

    fn absent_field(
        &self,
        field_descr: &'static FieldDescriptor,
        descriptor: &'static TypeDescriptor,
    ) -> CodecResult<Value> {
        if field_descr.optional {
            Ok(Value::Omitted)
        } else if let Some(default) = field_descr.default {
            Ok(default())
        } else {
            self.policy.dispatch(CodecError::Incomplete(format!(
                "mandatory field {} of {} is missing",
                field_descr.name, descriptor.name
            )))?;
            Ok(Value::Unbound)
        }
    }

    fn decode_list(&mut self, text: &str, element: &'static TypeDescriptor) -> CodecResult<Value> {
        let element_xer = require_xer(element)?;
        let mut sequence = RecordOf::new();
        for (index, item) in text.split_ascii_whitespace().enumerate() {
            *sequence.get_at_mut(index)? = self.scalar_from_text(item, element, element_xer)?;
        }
        Ok(Value::RecordOf(sequence))
    }

    fn decode_qname(
        &mut self,
        descriptor: &'static TypeDescriptor,
        xer: &'static XerDescriptor,
    ) -> CodecResult<Value> {
        let fields = descriptor.fields();
        if fields.len() != 2 {
            return Err(CodecError::Internal(format!(
                "qualified-name type {} must have two fields",
                descriptor.name
            )));
        }
        let (attributes, self_closing) = self.expect_start(xer, descriptor)?;
        let text = if self_closing {
            String::new()
        } else {
            let text = self.text_run()?;
            self.expect_end(xer)?;
            text
        };
        let trimmed = text.trim();
        let mut record = Record::new(2);
        match trimmed.split_once(':') {
            Some((prefix, local)) => {
                let uri = attributes
                    .iter()
                    .find(|(name, _)| name.strip_prefix("xmlns:") == Some(prefix))
                    .map(|(_, value)| value.clone())
                    .unwrap_or_else(|| prefix.to_string());
                record.set_field(0, Value::from(uri))?;
                record.set_field(1, Value::from(local))?;
            }
            None => {
                let uri = if fields[0].optional {
                    Value::Omitted
                } else {
                    Value::from("")
                };
                record.set_field(0, uri)?;
                record.set_field(1, Value::from(trimmed))?;
            }
        }
        Ok(Value::Record(record))
    }

    fn decode_boolean_content(
        &mut self,
        descriptor: &'static TypeDescriptor,
    ) -> CodecResult<Value> {
        match self.next_non_ws()? {
            Some(XmlToken::StartTag {
                name, self_closing, ..
            }) => {
                let value = match local_name(&name) {
                    "true" => true,
                    "false" => false,
                    other => {
                        return Err(CodecError::InvalidData(format!(
                            "element <{}> is not a BOOLEAN value",
                            other
                        )));
                    }
                };
                if !self_closing {
                    match self.next_non_ws()? {
                        Some(XmlToken::EndTag { .. }) => {}
                        _ => {
                            return Err(CodecError::InvalidToken(format!(
                                "<{}> is not closed",
                                value
                            )));
                        }
                    }
                }
                Ok(Value::Boolean(value))
            }
            Some(XmlToken::Text(text)) => match text.trim() {
                "true" | "1" => Ok(Value::Boolean(true)),
                "false" | "0" => Ok(Value::Boolean(false)),
                other => Err(CodecError::InvalidData(format!(
                    "{:?} is not a BOOLEAN value",
                    other
                ))),
            },
            _ => Err(CodecError::InvalidData(format!(
                "BOOLEAN type {} has no content",
                descriptor.name
            ))),
        }
    }

    fn scalar_from_text(
        &self,
        text: &str,
        descriptor: &'static TypeDescriptor,
        xer: &'static XerDescriptor,
    ) -> CodecResult<Value> {
        match &descriptor.kind {
            TypeKind::Boolean => match text.trim() {
                "true" | "1" => Ok(Value::Boolean(true)),
                "false" | "0" => Ok(Value::Boolean(false)),
                other => Err(CodecError::InvalidData(format!(
                    "{:?} is not a BOOLEAN value",
                    other
                ))),
            },
            TypeKind::Integer => {
                let trimmed = text.trim();
                IntegerValue::parse(trimmed)
                    .map(Value::Integer)
                    .ok_or_else(|| {
                        CodecError::InvalidData(format!("unparsable integer {:?}", trimmed))
                    })
            }
            TypeKind::Float => {
                let trimmed = text.trim();
                let value = match trimmed {
                    "INF" => f64::INFINITY,
                    "-INF" => f64::NEG_INFINITY,
                    "NaN" => f64::NAN,
                    other => other.parse::<f64>().map_err(|_| {
                        CodecError::InvalidData(format!("unparsable float {:?}", other))
                    })?,
                };
                Ok(Value::Float(value))
            }
            TypeKind::CharString => Ok(Value::from(normalize_whitespace(text, xer.whitespace))),
            TypeKind::OctetString => {
                let octets = if self.flavor.extended() && xer.has(instr::BASE_64) {
                    decode_base64(text)?
                } else {
                    decode_hex(text)?
                };
                Ok(Value::from(octets))
            }
            _ => Err(CodecError::Internal(format!(
                "type {} is not scalar",
                descriptor.name
            ))),
        }
    }

    /// Match the start tag of a type, tolerating a name mismatch only as
    /// far as the policy allows
    fn expect_start(
        &mut self,
        xer: &'static XerDescriptor,
        descriptor: &'static TypeDescriptor,
    ) -> CodecResult<(Vec<(String, String)>, bool)> {
        match self.next_non_ws()? {
            Some(XmlToken::StartTag {
                name,
                attributes,
                self_closing,
            }) => {
                if local_name(&name) != xer.name {
                    self.policy.dispatch(CodecError::TagMismatch(format!(
                        "type {} expects element <{}>, found <{}>",
                        descriptor.name, xer.name, name
                    )))?;
                }
                Ok((attributes, self_closing))
            }
            Some(other) => Err(CodecError::InvalidToken(format!(
                "type {} expects element <{}>, found {:?}",
                descriptor.name, xer.name, other
            ))),
            None => Err(CodecError::Incomplete(format!(
                "missing element <{}>",
                xer.name
            ))),
        }
    }

    fn expect_end(&mut self, xer: &'static XerDescriptor) -> CodecResult<()> {
        match self.next_non_ws()? {
            Some(XmlToken::EndTag { name }) => {
                if local_name(&name) != xer.name {
                    self.policy.dispatch(CodecError::TagMismatch(format!(
                        "expected </{}>, found </{}>",
                        xer.name, name
                    )))?;
                }
                Ok(())
            }
            Some(other) => Err(CodecError::InvalidToken(format!(
                "expected </{}>, found {:?}",
                xer.name, other
            ))),
            None => Err(CodecError::Incomplete(format!("missing </{}>", xer.name))),
        }
    }

    /// Concatenated character data up to the next tag
    fn text_run(&mut self) -> CodecResult<String> {
        let mut out = String::new();
        while let Some(XmlToken::Text(_)) = self.lexer.peek()? {
            match self.lexer.next()? {
                Some(XmlToken::Text(text)) => out.push_str(&text),
                _ => unreachable!(),
            }
        }
        Ok(out)
    }

    /// Skip one balanced element; the start tag is still unread
    fn skip_element(&mut self) -> CodecResult<()> {
        let mut depth = 0usize;
        loop {
            match self.lexer.next()? {
                Some(XmlToken::StartTag { self_closing, .. }) => {
                    if !self_closing {
                        depth += 1;
                    }
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(XmlToken::EndTag { .. }) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(XmlToken::Text(_)) => {}
                None => {
                    return Err(CodecError::Incomplete(
                        "unterminated element while skipping".to_string(),
                    ));
                }
            }
        }
    }

    /// Re-serialize one balanced element verbatim
    fn reconstruct_element(&mut self) -> CodecResult<String> {
        let mut out = String::new();
        let mut depth = 0usize;
        loop {
            match self.next_non_ws_at_top(depth)? {
                Some(XmlToken::StartTag {
                    name,
                    attributes,
                    self_closing,
                }) => {
                    out.push('<');
                    out.push_str(&name);
                    for (attr, value) in &attributes {
                        out.push_str(&format!(" {}=\"{}\"", attr, escape_attribute(value)));
                    }
                    if self_closing {
                        out.push_str("/>");
                        if depth == 0 {
                            return Ok(out);
                        }
                    } else {
                        out.push('>');
                        depth += 1;
                    }
                }
                Some(XmlToken::EndTag { name }) => {
                    out.push_str(&format!("</{}>", name));
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                }
                Some(XmlToken::Text(text)) => out.push_str(&escape_text(&text)),
                None => {
                    return Err(CodecError::Incomplete(
                        "unterminated element while capturing".to_string(),
                    ));
                }
            }
        }
    }

    /// Like `next`, but whitespace outside the captured element is
    /// insignificant
    fn next_non_ws_at_top(&mut self, depth: usize) -> CodecResult<Option<XmlToken>> {
        loop {
            match self.lexer.next()? {
                Some(XmlToken::Text(text)) if depth == 0 && text.trim().is_empty() => {}
                other => return Ok(other),
            }
        }
    }

    fn next_non_ws(&mut self) -> CodecResult<Option<XmlToken>> {
        loop {
            match self.lexer.next()? {
                Some(XmlToken::Text(text)) if text.trim().is_empty() => {}
                other => return Ok(other),
            }
        }
    }

    fn peek_non_ws(&mut self) -> CodecResult<Option<&XmlToken>> {
        loop {
            match self.lexer.peek()? {
                Some(XmlToken::Text(text)) if text.trim().is_empty() => {
                    self.lexer.next()?;
                }
                _ => break,
            }
        }
        self.lexer.peek()
    }
}

/// Types whose value is carried as plain character data
fn is_scalar(descriptor: &'static TypeDescriptor) -> bool {
    matches!(
        descriptor.kind,
        TypeKind::Boolean
            | TypeKind::Integer
            | TypeKind::Float
            | TypeKind::CharString
            | TypeKind::OctetString
    )
}

/// The part of a possibly prefixed name after the colon
fn local_name(name: &str) -> &str {
    match name.rsplit_once(':') {
        Some((_, local)) => local,
        None => name,
    }
}
