//! XMP packets as a flat list of properties.
//!
//! Properties are read from the attributes and child elements of every
//! `rdf:Description`. Simple values and Bag/Seq/Alt arrays of text are kept;
//! deeper structures are skipped.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::{self, Write};

use super::{CodecError, MetadataKind, MetadataRecord};

const RDF_DESCRIPTION: &str = "rdf:Description";
const X_NS: &str = "adobe:ns:meta/";
const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
const PACKET_HEADER: &str = "<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>";
const PACKET_TRAILER: &str = "<?xpacket end=\"w\"?>";

// Element depth below rdf:Description.
const PROPERTY_DEPTH: usize = 2;
const ARRAY_DEPTH: usize = 3;
const ITEM_DEPTH: usize = 4;

fn invalid<M: Into<String>>(message: M) -> CodecError {
    CodecError::new(MetadataKind::Xmp, message)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmpArrayKind {
    Bag,
    Seq,
    Alt,
}

impl XmpArrayKind {
    fn from_qname(name: &str) -> Option<XmpArrayKind> {
        match name {
            "rdf:Bag" => Some(XmpArrayKind::Bag),
            "rdf:Seq" => Some(XmpArrayKind::Seq),
            "rdf:Alt" => Some(XmpArrayKind::Alt),
            _ => None,
        }
    }

    fn qname(&self) -> &'static str {
        match self {
            XmpArrayKind::Bag => "rdf:Bag",
            XmpArrayKind::Seq => "rdf:Seq",
            XmpArrayKind::Alt => "rdf:Alt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmpValue {
    Text(String),
    Array {
        kind: XmpArrayKind,
        items: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmpProperty {
    pub prefix: String,
    pub namespace: String,
    pub name: String,
    pub value: XmpValue,
}

impl XmpProperty {
    pub fn text(prefix: &str, namespace: &str, name: &str, value: &str) -> XmpProperty {
        XmpProperty {
            prefix: prefix.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            value: XmpValue::Text(value.to_string()),
        }
    }

    pub fn array(
        prefix: &str,
        namespace: &str,
        name: &str,
        kind: XmpArrayKind,
        items: Vec<String>,
    ) -> XmpProperty {
        XmpProperty {
            prefix: prefix.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            value: XmpValue::Array { kind, items },
        }
    }

    /// `prefix:name`
    pub fn key(&self) -> String {
        format!("{}:{}", self.prefix, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmpData {
    properties: Vec<XmpProperty>,
}

struct PendingProperty {
    qname: String,
    text: String,
    array: Option<XmpArrayKind>,
    items: Vec<String>,
}

#[derive(Default)]
struct Namespaces(Vec<(String, String)>);

impl Namespaces {
    fn register(&mut self, e: &BytesStart) -> Result<(), CodecError> {
        for attr in e.attributes() {
            let attr = attr.map_err(|err| invalid(err.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if let Some(prefix) = key.strip_prefix("xmlns:") {
                let uri = attr
                    .unescape_value()
                    .map_err(|err| invalid(err.to_string()))?;
                self.0.push((prefix.to_string(), uri.into_owned()));
            }
        }
        Ok(())
    }

    fn lookup(&self, prefix: &str) -> String {
        self.0
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.clone())
            .unwrap_or_default()
    }
}

fn split_qname(qname: &str) -> (&str, &str) {
    match qname.find(':') {
        Some(idx) => (&qname[..idx], &qname[idx + 1..]),
        None => ("", qname),
    }
}

fn qname_of(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

impl XmpData {
    pub fn properties(&self) -> &[XmpProperty] {
        &self.properties
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn find(&self, prefix: &str, name: &str) -> Option<&XmpProperty> {
        self.properties
            .iter()
            .find(|p| p.prefix == prefix && p.name == name)
    }

    /// Add a property, replacing one with the same prefix and name.
    pub fn set(&mut self, property: XmpProperty) {
        match self
            .properties
            .iter_mut()
            .find(|p| p.prefix == property.prefix && p.name == property.name)
        {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
    }

    pub fn remove(&mut self, prefix: &str, name: &str) {
        self.properties
            .retain(|p| !(p.prefix == prefix && p.name == name));
    }

    fn push(&mut self, namespaces: &Namespaces, qname: &str, value: XmpValue) {
        let (prefix, name) = split_qname(qname);
        self.set(XmpProperty {
            prefix: prefix.to_string(),
            namespace: namespaces.lookup(prefix),
            name: name.to_string(),
            value,
        });
    }

    fn description_attributes(
        &mut self,
        namespaces: &Namespaces,
        e: &BytesStart,
    ) -> Result<(), CodecError> {
        for attr in e.attributes() {
            let attr = attr.map_err(|err| invalid(err.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if key.starts_with("xmlns") || key.starts_with("rdf:") {
                continue;
            }
            let value = attr
                .unescape_value()
                .map_err(|err| invalid(err.to_string()))?;
            self.push(namespaces, &key, XmpValue::Text(value.into_owned()));
        }
        Ok(())
    }

    pub fn decode(packet: &str) -> Result<XmpData, CodecError> {
        let mut data = XmpData::default();
        let mut namespaces = Namespaces::default();
        let mut reader = Reader::from_str(packet);
        reader.config_mut().trim_text(true);

        // 0 outside rdf:Description, 1 directly inside it.
        let mut depth = 0usize;
        let mut pending: Option<PendingProperty> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    namespaces.register(e)?;
                    let qname = qname_of(e);
                    if depth == 0 {
                        if qname == RDF_DESCRIPTION {
                            data.description_attributes(&namespaces, e)?;
                            depth = 1;
                        }
                        continue;
                    }
                    depth += 1;
                    match depth {
                        PROPERTY_DEPTH => {
                            pending = Some(PendingProperty {
                                qname,
                                text: String::new(),
                                array: None,
                                items: Vec::new(),
                            })
                        }
                        ARRAY_DEPTH => {
                            if let Some(p) = pending.as_mut() {
                                p.array = XmpArrayKind::from_qname(&qname);
                            }
                        }
                        ITEM_DEPTH => {
                            if let Some(p) = pending.as_mut() {
                                if p.array.is_some() && qname == "rdf:li" {
                                    p.items.push(String::new());
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    namespaces.register(e)?;
                    let qname = qname_of(e);
                    if depth == 0 && qname == RDF_DESCRIPTION {
                        data.description_attributes(&namespaces, e)?;
                    } else if depth + 1 == PROPERTY_DEPTH {
                        let resource = e
                            .try_get_attribute("rdf:resource")
                            .map_err(|err| invalid(err.to_string()))?;
                        let value = match resource {
                            Some(attr) => attr
                                .unescape_value()
                                .map_err(|err| invalid(err.to_string()))?
                                .into_owned(),
                            None => String::new(),
                        };
                        data.push(&namespaces, &qname, XmpValue::Text(value));
                    } else if depth + 1 == ITEM_DEPTH && qname == "rdf:li" {
                        if let Some(p) = pending.as_mut() {
                            if p.array.is_some() {
                                p.items.push(String::new());
                            }
                        }
                    }
                }
                Ok(Event::Text(ref t)) => {
                    if let Some(p) = pending.as_mut() {
                        let text = t.unescape().map_err(|err| invalid(err.to_string()))?;
                        if depth == PROPERTY_DEPTH {
                            p.text.push_str(&text);
                        } else if depth == ITEM_DEPTH && p.array.is_some() {
                            if let Some(item) = p.items.last_mut() {
                                item.push_str(&text);
                            }
                        }
                    }
                }
                Ok(Event::End(_)) => {
                    if depth == PROPERTY_DEPTH {
                        if let Some(p) = pending.take() {
                            let value = match p.array {
                                Some(kind) => XmpValue::Array {
                                    kind,
                                    items: p.items,
                                },
                                None => XmpValue::Text(p.text),
                            };
                            data.push(&namespaces, &p.qname, value);
                        }
                    }
                    depth = depth.saturating_sub(1);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(invalid(format!(
                        "XML error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
            }
        }

        Ok(data)
    }

    /// Serialize to a complete `xpacket` wrapped packet. No properties, no packet.
    pub fn encode(&self) -> Result<String, CodecError> {
        if self.properties.is_empty() {
            return Ok(String::new());
        }

        let mut declared: Vec<(&str, &str)> = Vec::new();
        for p in &self.properties {
            if p.prefix.is_empty() || p.namespace.is_empty() {
                return Err(invalid(format!(
                    "property {} has no namespace",
                    p.key()
                )));
            }
            if !declared.iter().any(|(prefix, _)| *prefix == p.prefix) {
                declared.push((p.prefix.as_str(), p.namespace.as_str()));
            }
        }

        let mut out = String::new();
        self.write_packet(&mut out, &declared)
            .map_err(|e| invalid(format!("cannot format packet: {}", e)))?;
        Ok(out)
    }
}

impl XmpData {
    fn write_packet(&self, out: &mut String, declared: &[(&str, &str)]) -> fmt::Result {
        writeln!(out, "{}", PACKET_HEADER)?;
        writeln!(out, "<x:xmpmeta xmlns:x=\"{}\">", X_NS)?;
        writeln!(out, " <rdf:RDF xmlns:rdf=\"{}\">", RDF_NS)?;
        write!(out, "  <rdf:Description rdf:about=\"\"")?;
        for (prefix, namespace) in declared {
            write!(out, "\n    xmlns:{}=\"{}\"", prefix, escape(*namespace))?;
        }
        writeln!(out, ">")?;
        for p in &self.properties {
            let key = p.key();
            match &p.value {
                XmpValue::Text(text) => {
                    writeln!(out, "   <{}>{}</{}>", key, escape(text.as_str()), key)?;
                }
                XmpValue::Array { kind, items } => {
                    writeln!(out, "   <{}>", key)?;
                    writeln!(out, "    <{}>", kind.qname())?;
                    for item in items {
                        writeln!(out, "     <rdf:li>{}</rdf:li>", escape(item.as_str()))?;
                    }
                    writeln!(out, "    </{}>", kind.qname())?;
                    writeln!(out, "   </{}>", key)?;
                }
            }
        }
        writeln!(out, "  </rdf:Description>")?;
        writeln!(out, " </rdf:RDF>")?;
        writeln!(out, "</x:xmpmeta>")?;
        out.write_str(PACKET_TRAILER)
    }
}

impl MetadataRecord for XmpData {
    fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
