//! XER encoder driven by type descriptors

use ttcn3_value::descriptor::xer::{instr, XerDescriptor};
use ttcn3_value::descriptor::{FieldDescriptor, TypeDescriptor, TypeKind};
use ttcn3_value::erroneous::{ErroneousDescriptor, ErroneousValue, ValueOverride};
use ttcn3_value::error::{CodecError, CodecResult, ErrorPolicy};
use ttcn3_value::value::Value;

use super::tokenizer::{escape_attribute, escape_text};
use super::{encode_base64, encode_hex, require_xer, XerFlavor};

/// XER encoder appending markup to a string
pub struct XerEncoder<'a> {
    flavor: XerFlavor,
    policy: &'a ErrorPolicy,
    /// Namespace declarations waiting to join the next start tag
    pending_decls: Option<String>,
}

impl<'a> XerEncoder<'a> {
    pub fn new(flavor: XerFlavor, policy: &'a ErrorPolicy) -> Self {
        Self {
            flavor,
            policy,
            pending_decls: None,
        }
    }

    /// Encode a whole message; the namespaces of the value tree are
    /// collected up front and declared once, on the top-level start tag
    pub fn encode_message(
        &mut self,
        value: &Value,
        descriptor: &'static TypeDescriptor,
        out: &mut String,
        erroneous: Option<&ErroneousDescriptor>,
    ) -> CodecResult<()> {
        if self.flavor.extended() {
            let decls = collect_namespace_declarations(descriptor);
            if !decls.is_empty() {
                self.pending_decls = Some(decls);
            }
        }
        self.encode(value, descriptor, 0, out, erroneous)
    }

    pub fn encode(
        &mut self,
        value: &Value,
        descriptor: &'static TypeDescriptor,
        indent: usize,
        out: &mut String,
        erroneous: Option<&ErroneousDescriptor>,
    ) -> CodecResult<()> {
        let xer = require_xer(descriptor)?;
        if !value.is_bound() {
            self.policy.dispatch(CodecError::Unbound(format!(
                "encoding an unbound value of type {}",
                descriptor.name
            )))?;
            return Ok(());
        }
        let ext = self.flavor.extended();

        if ext && xer.has(instr::ANY_ELEMENT) {
            // The value holds a complete element, copied verbatim
            out.push_str(value.as_str()?);
            return Ok(());
        }
        if ext && xer.has(instr::USE_QNAME) {
            return self.encode_qname(value, descriptor, xer, out);
        }

        let untagged = ext && xer.has(instr::UNTAGGED);
        let name = self.qualified_name(xer);
        let mut extra_attrs = self.pending_decls.take().unwrap_or_default();

        if let Some(content) = self.scalar_content(value, descriptor, xer)? {
            if untagged {
                out.push_str(&content);
            } else if content.is_empty() {
                out.push_str(&format!("<{}{}/>", name, extra_attrs));
            } else {
                out.push_str(&format!("<{}{}>{}</{}>", name, extra_attrs, content, name));
            }
            return Ok(());
        }

        match &descriptor.kind {
            TypeKind::Record { fields, .. } => self.encode_record(
                value,
                descriptor,
                xer,
                fields,
                &name,
                &mut extra_attrs,
                indent,
                out,
                erroneous,
            ),
            TypeKind::RecordOf { element, .. } => {
                if ext && xer.has(instr::LIST) {
                    return self.encode_list(value, element, xer, &name, &extra_attrs, out);
                }
                let sequence = value.as_record_of()?;
                if sequence.len() == 0 && !untagged {
                    out.push_str(&format!("<{}{}/>", name, extra_attrs));
                    return Ok(());
                }
                if !untagged {
                    out.push_str(&format!("<{}{}>", name, extra_attrs));
                }
                for (index, elem) in sequence.iter().enumerate() {
                    if let Some(e) = erroneous {
                        if e.is_field_omitted(index) {
                            continue;
                        }
                    }
                    let over = erroneous.and_then(|e| e.override_for(index));
                    if let Some(over) = over {
                        if let Some(payload) = &over.before {
                            self.erroneous_markup(payload, indent + 1, out)?;
                        }
                    }
                    match over.and_then(|o| o.value.as_ref()) {
                        Some(ValueOverride::Omit) => {}
                        Some(ValueOverride::Replace(payload)) => {
                            self.erroneous_markup(payload, indent + 1, out)?;
                        }
                        None => {
                            self.newline(indent + 1, out);
                            let nested = over.and_then(|o| o.nested.as_deref());
                            self.encode(elem, element, indent + 1, out, nested)?;
                        }
                    }
                    if let Some(over) = over {
                        if let Some(payload) = &over.after {
                            self.erroneous_markup(payload, indent + 1, out)?;
                        }
                    }
                }
                if !untagged {
                    self.newline(indent, out);
                    out.push_str(&format!("</{}>", name));
                }
                Ok(())
            }
            TypeKind::Empty => {
                out.push_str(&format!("<{}{}/>", name, extra_attrs));
                Ok(())
            }
            _ => Err(CodecError::Internal(format!(
                "type {} fell through scalar content",
                descriptor.name
            ))),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_record(
        &mut self,
        value: &Value,
        descriptor: &'static TypeDescriptor,
        xer: &'static XerDescriptor,
        fields: &'static [FieldDescriptor],
        name: &str,
        extra_attrs: &mut String,
        indent: usize,
        out: &mut String,
        erroneous: Option<&ErroneousDescriptor>,
    ) -> CodecResult<()> {
        let ext = self.flavor.extended();
        let record = value.as_record()?;
        if record.field_count() != fields.len() {
            return Err(CodecError::Internal(format!(
                "value of type {} has {} fields, descriptor says {}",
                descriptor.name,
                record.field_count(),
                fields.len()
            )));
        }

        // Attribute fields contribute to the start tag, not the content
        let mut is_attribute = vec![false; fields.len()];
        if ext {
            for (index, field_descr) in fields.iter().enumerate() {
                let Some(field_xer) = field_descr.ty.xer else {
                    continue;
                };
                if field_xer.has(instr::ANY_ATTRIBUTE) {
                    is_attribute[index] = true;
                    let field = record.get_field(index)?;
                    if field.is_present() {
                        extra_attrs.push(' ');
                        extra_attrs.push_str(field.as_str()?);
                    }
                } else if field_xer.has(instr::ATTRIBUTE) {
                    is_attribute[index] = true;
                    let field = record.get_field(index)?;
                    if field.is_present() {
                        let text = self
                            .scalar_content(field, field_descr.ty, field_xer)?
                            .ok_or_else(|| {
                                CodecError::Internal(format!(
                                    "attribute field {} of {} is not scalar",
                                    field_descr.name, descriptor.name
                                ))
                            })?;
                        extra_attrs.push_str(&format!(
                            " {}=\"{}\"",
                            field_xer.name,
                            escape_attribute(&text)
                        ));
                    }
                }
            }
        }

        if ext && xer.has(instr::USE_NIL) {
            let carrier = fields.len() - 1;
            let field = record.get_field(carrier)?;
            if !field.is_present() {
                out.push_str(&format!(
                    "<{}{} xsi:nil=\"true\"/>",
                    name, extra_attrs
                ));
                return Ok(());
            }
            out.push_str(&format!("<{}{}>", name, extra_attrs));
            let field_xer = require_xer(fields[carrier].ty)?;
            match self.scalar_content(field, fields[carrier].ty, field_xer)? {
                Some(content) => out.push_str(&content),
                None => {
                    self.newline(indent + 1, out);
                    self.encode(field, fields[carrier].ty, indent + 1, out, None)?;
                    self.newline(indent, out);
                }
            }
            out.push_str(&format!("</{}>", name));
            return Ok(());
        }

        // Field emission order, possibly overridden by an order field
        let use_order = ext && xer.has(instr::USE_ORDER);
        let embed_values = ext && xer.has(instr::EMBED_VALUES);
        let first_content = (use_order || embed_values) as usize;
        let order: Vec<usize> = if use_order {
            self.validated_order(record.get_field(0)?, fields, &is_attribute, descriptor)?
        } else {
            (first_content..fields.len())
                .filter(|&i| !is_attribute[i])
                .collect()
        };

        let embedded: Option<&ttcn3_value::value::RecordOf> = if embed_values {
            Some(record.get_field(0)?.as_record_of()?)
        } else {
            None
        };
        let embedded_text = |slot: usize| -> CodecResult<Option<String>> {
            let Some(embedded) = embedded else {
                return Ok(None);
            };
            if slot >= embedded.len() {
                return Ok(None);
            }
            Ok(Some(escape_text(embedded.get_at(slot)?.as_str()?)))
        };

        if order.is_empty() {
            out.push_str(&format!("<{}{}/>", name, extra_attrs));
            return Ok(());
        }
        out.push_str(&format!("<{}{}>", name, extra_attrs));
        if let Some(text) = embedded_text(0)? {
            out.push_str(&text);
        }
        for (slot, &index) in order.iter().enumerate() {
            let field_descr = &fields[index];
            if let Some(e) = erroneous {
                if e.is_field_omitted(index) {
                    continue;
                }
            }
            let over = erroneous.and_then(|e| e.override_for(index));
            if let Some(over) = over {
                if let Some(payload) = &over.before {
                    self.erroneous_markup(payload, indent + 1, out)?;
                }
            }
            match over.and_then(|o| o.value.as_ref()) {
                Some(ValueOverride::Omit) => {}
                Some(ValueOverride::Replace(payload)) => {
                    self.erroneous_markup(payload, indent + 1, out)?;
                }
                None => {
                    let field = record.get_field(index)?;
                    if !matches!(field, Value::Omitted) {
                        self.newline(indent + 1, out);
                        let nested = over.and_then(|o| o.nested.as_deref());
                        self.encode(field, field_descr.ty, indent + 1, out, nested)?;
                    }
                }
            }
            if let Some(over) = over {
                if let Some(payload) = &over.after {
                    self.erroneous_markup(payload, indent + 1, out)?;
                }
            }
            if let Some(text) = embedded_text(slot + 1)? {
                out.push_str(&text);
            }
        }
        self.newline(indent, out);
        out.push_str(&format!("</{}>", name));
        Ok(())
    }

    /// Check an order field: a permutation of the content field indices
    fn validated_order(
        &self,
        order_field: &Value,
        fields: &'static [FieldDescriptor],
        is_attribute: &[bool],
        descriptor: &'static TypeDescriptor,
    ) -> CodecResult<Vec<usize>> {
        let expected: Vec<usize> = (1..fields.len()).filter(|&i| !is_attribute[i]).collect();
        let sequence = order_field.as_record_of()?;
        if sequence.len() != expected.len() {
            return Err(CodecError::Constraint(format!(
                "order field of {} has {} entries, {} content fields exist",
                descriptor.name,
                sequence.len(),
                expected.len()
            )));
        }
        let mut order = Vec::with_capacity(expected.len());
        let mut seen = vec![false; fields.len()];
        for entry in sequence.iter() {
            let index = entry.as_i64()? as usize + 1;
            if !expected.contains(&index) {
                return Err(CodecError::Constraint(format!(
                    "order field of {} names invalid field index {}",
                    descriptor.name,
                    index - 1
                )));
            }
            if seen[index] {
                return Err(CodecError::Constraint(format!(
                    "order field of {} names field index {} twice",
                    descriptor.name,
                    index - 1
                )));
            }
            seen[index] = true;
            order.push(index);
        }
        Ok(order)
    }

    fn encode_list(
        &mut self,
        value: &Value,
        element: &'static TypeDescriptor,
        _xer: &'static XerDescriptor,
        name: &str,
        extra_attrs: &str,
        out: &mut String,
    ) -> CodecResult<()> {
        let element_xer = require_xer(element)?;
        let sequence = value.as_record_of()?;
        let mut parts = Vec::with_capacity(sequence.len());
        for elem in sequence.iter() {
            let content = self
                .scalar_content(elem, element, element_xer)?
                .ok_or_else(|| {
                    CodecError::Internal(format!(
                        "list element type {} is not scalar",
                        element.name
                    ))
                })?;
            parts.push(content);
        }
        if parts.is_empty() {
            out.push_str(&format!("<{}{}/>", name, extra_attrs));
        } else {
            out.push_str(&format!(
                "<{}{}>{}</{}>",
                name,
                extra_attrs,
                parts.join(" "),
                name
            ));
        }
        Ok(())
    }

    /// A record of two charstrings encoded as one qualified name
    fn encode_qname(
        &mut self,
        value: &Value,
        descriptor: &'static TypeDescriptor,
        xer: &'static XerDescriptor,
        out: &mut String,
    ) -> CodecResult<()> {
        let record = value.as_record()?;
        if record.field_count() != 2 {
            return Err(CodecError::Internal(format!(
                "qualified-name type {} must have two fields",
                descriptor.name
            )));
        }
        let decls = self.pending_decls.take().unwrap_or_default();
        let uri = record.get_field(0)?;
        let local = record.get_field(1)?.as_str()?;
        if uri.is_present() && !uri.as_str()?.is_empty() {
            out.push_str(&format!(
                "<{}{} xmlns:b0=\"{}\">b0:{}</{}>",
                xer.name,
                decls,
                escape_attribute(uri.as_str()?),
                escape_text(local),
                xer.name
            ));
        } else {
            out.push_str(&format!(
                "<{}{}>{}</{}>",
                xer.name,
                decls,
                escape_text(local),
                xer.name
            ));
        }
        Ok(())
    }

    /// Markup placed inside the element for a scalar value; `None` for
    /// composite kinds
    fn scalar_content(
        &self,
        value: &Value,
        descriptor: &'static TypeDescriptor,
        xer: &'static XerDescriptor,
    ) -> CodecResult<Option<String>> {
        let content = match &descriptor.kind {
            TypeKind::Boolean => {
                if value.as_bool()? {
                    "<true/>".to_string()
                } else {
                    "<false/>".to_string()
                }
            }
            TypeKind::Integer => value.as_integer()?.to_string(),
            TypeKind::Float => format_xer_float(value.as_float()?),
            TypeKind::CharString => escape_text(value.as_str()?),
            TypeKind::OctetString => {
                if self.flavor.extended() && xer.has(instr::BASE_64) {
                    encode_base64(value.as_octets()?)
                } else {
                    encode_hex(value.as_octets()?)
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(content))
    }

    /// Element name, prefixed when its namespace carries a prefix; the
    /// declarations themselves sit on the top-level start tag
    fn qualified_name(&self, xer: &'static XerDescriptor) -> String {
        match xer.namespace {
            Some(ns) if self.flavor.extended() && !ns.prefix.is_empty() => {
                format!("{}:{}", ns.prefix, xer.name)
            }
            _ => xer.name.to_string(),
        }
    }

    fn erroneous_markup(
        &mut self,
        payload: &ErroneousValue,
        indent: usize,
        out: &mut String,
    ) -> CodecResult<()> {
        payload.check()?;
        match payload {
            ErroneousValue::Raw(bytes) => {
                self.newline(indent, out);
                out.push_str(&String::from_utf8_lossy(bytes));
                Ok(())
            }
            ErroneousValue::Typed { value, descriptor } => {
                self.newline(indent, out);
                self.encode(value, descriptor, indent, out, None)
            }
        }
    }

    fn newline(&self, indent: usize, out: &mut String) {
        if self.flavor != XerFlavor::Canonical {
            out.push('\n');
            for _ in 0..indent {
                out.push('\t');
            }
        }
    }
}

/// Gather the distinct namespaces of a descriptor tree into one run of
/// `xmlns` attributes for the top-level start tag. Nillable types pull
/// in the schema-instance namespace for their `xsi:nil` attribute.
fn collect_namespace_declarations(descriptor: &'static TypeDescriptor) -> String {
    fn walk(
        descriptor: &'static TypeDescriptor,
        namespaces: &mut Vec<(&'static str, &'static str)>,
        needs_xsi: &mut bool,
        visited: &mut Vec<*const TypeDescriptor>,
    ) {
        let key = descriptor as *const TypeDescriptor;
        if visited.contains(&key) {
            return;
        }
        visited.push(key);
        if let Some(xer) = descriptor.xer {
            if let Some(ns) = xer.namespace {
                if !namespaces
                    .iter()
                    .any(|&(prefix, uri)| prefix == ns.prefix && uri == ns.uri)
                {
                    namespaces.push((ns.prefix, ns.uri));
                }
            }
            if xer.has(instr::USE_NIL) {
                *needs_xsi = true;
            }
        }
        match &descriptor.kind {
            TypeKind::Record { fields, .. } => {
                for field in fields.iter() {
                    walk(field.ty, namespaces, needs_xsi, visited);
                }
            }
            TypeKind::RecordOf { element, .. } => {
                walk(element, namespaces, needs_xsi, visited);
            }
            _ => {}
        }
    }

    let mut namespaces = Vec::new();
    let mut needs_xsi = false;
    walk(descriptor, &mut namespaces, &mut needs_xsi, &mut Vec::new());

    let mut decls = String::new();
    if needs_xsi {
        decls.push_str(" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"");
    }
    for (prefix, uri) in namespaces {
        if prefix.is_empty() {
            decls.push_str(&format!(" xmlns=\"{}\"", escape_attribute(uri)));
        } else {
            decls.push_str(&format!(" xmlns:{}=\"{}\"", prefix, escape_attribute(uri)));
        }
    }
    decls
}

/// XER float text: decimal, or the schema spellings of the specials
pub(super) fn format_xer_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "INF".to_string()
    } else if value == f64::NEG_INFINITY {
        "-INF".to_string()
    } else if value == value.trunc() && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::super::decode;
    use super::*;
    use ttcn3_value::descriptor::xer::{Whitespace, XerNamespace};
    use ttcn3_value::descriptor::{self, FieldDescriptor, TypeKind};
    use ttcn3_value::value::Record;

    static PART_XER: XerDescriptor = XerDescriptor {
        name: "Part",
        namespace: Some(XerNamespace {
            prefix: "m",
            uri: "http://example.org/machine",
        }),
        instructions: 0,
        whitespace: Whitespace::Collapse,
    };

    static PART: TypeDescriptor = TypeDescriptor {
        name: "Part",
        kind: TypeKind::CharString,
        ber: None,
        raw: None,
        text: None,
        xer: Some(&PART_XER),
        json: None,
    };

    static MACHINE_XER: XerDescriptor = XerDescriptor {
        name: "Machine",
        namespace: Some(XerNamespace {
            prefix: "m",
            uri: "http://example.org/machine",
        }),
        instructions: 0,
        whitespace: Whitespace::Collapse,
    };

    static MACHINE: TypeDescriptor = TypeDescriptor {
        name: "Machine",
        kind: TypeKind::Record {
            fields: &[
                FieldDescriptor {
                    name: "rotor",
                    ty: &PART,
                    optional: false,
                    default: None,
                },
                FieldDescriptor {
                    name: "stator",
                    ty: &PART,
                    optional: false,
                    default: None,
                },
            ],
            is_set: false,
        },
        ber: None,
        raw: None,
        text: None,
        xer: Some(&MACHINE_XER),
        json: None,
    };

    static NILLED_XER: XerDescriptor = XerDescriptor {
        name: "Nilled",
        namespace: None,
        instructions: instr::USE_NIL,
        whitespace: Whitespace::Collapse,
    };

    static NILLED: TypeDescriptor = TypeDescriptor {
        name: "Nilled",
        kind: TypeKind::Record {
            fields: &[FieldDescriptor {
                name: "load",
                ty: &descriptor::INTEGER,
                optional: true,
                default: None,
            }],
            is_set: false,
        },
        ber: None,
        raw: None,
        text: None,
        xer: Some(&NILLED_XER),
        json: None,
    };

    #[test]
    fn test_scalar_elements() {
        let policy = ErrorPolicy::new();
        let mut encoder = XerEncoder::new(XerFlavor::Canonical, &policy);
        let mut out = String::new();
        encoder
            .encode(&Value::from(42i64), &descriptor::INTEGER, 0, &mut out, None)
            .unwrap();
        assert_eq!(out, "<INTEGER>42</INTEGER>");

        let mut out = String::new();
        encoder
            .encode(&Value::from(true), &descriptor::BOOLEAN, 0, &mut out, None)
            .unwrap();
        assert_eq!(out, "<BOOLEAN><true/></BOOLEAN>");
    }

    #[test]
    fn test_charstring_escaping() {
        let policy = ErrorPolicy::new();
        let mut encoder = XerEncoder::new(XerFlavor::Canonical, &policy);
        let mut out = String::new();
        encoder
            .encode(
                &Value::from("a<b&c"),
                &descriptor::CHARSTRING,
                0,
                &mut out,
                None,
            )
            .unwrap();
        assert_eq!(out, "<charstring>a&lt;b&amp;c</charstring>");
    }

    #[test]
    fn test_namespace_declared_once_on_the_root() {
        let policy = ErrorPolicy::new();
        let value = Value::Record(Record::from_fields(vec![
            Value::from("left"),
            Value::from("right"),
        ]));
        let mut out = String::new();
        XerEncoder::new(XerFlavor::Extended, &policy)
            .encode_message(&value, &MACHINE, &mut out, None)
            .unwrap();
        assert!(
            out.starts_with("<m:Machine xmlns:m=\"http://example.org/machine\">"),
            "got {}",
            out
        );
        assert_eq!(out.matches("xmlns:m=").count(), 1);
        assert_eq!(out.matches("<m:Part>").count(), 2);

        let decoded = decode(out.as_bytes(), &MACHINE, XerFlavor::Extended, &policy).unwrap();
        assert!(decoded.is_equal(&value));
    }

    #[test]
    fn test_nil_element_declares_xsi() {
        let policy = ErrorPolicy::new();
        let value = Value::Record(Record::from_fields(vec![Value::Omitted]));
        let mut out = String::new();
        XerEncoder::new(XerFlavor::Extended, &policy)
            .encode_message(&value, &NILLED, &mut out, None)
            .unwrap();
        assert_eq!(
            out,
            "<Nilled xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:nil=\"true\"/>"
        );

        let decoded = decode(out.as_bytes(), &NILLED, XerFlavor::Extended, &policy).unwrap();
        let record = decoded.as_record().unwrap();
        assert!(matches!(record.get_field(0).unwrap(), Value::Omitted));
    }

    #[test]
    fn test_float_spellings() {
        assert_eq!(format_xer_float(1.5), "1.5");
        assert_eq!(format_xer_float(2.0), "2.0");
        assert_eq!(format_xer_float(f64::INFINITY), "INF");
        assert_eq!(format_xer_float(f64::NEG_INFINITY), "-INF");
        assert_eq!(format_xer_float(f64::NAN), "NaN");
    }
}
