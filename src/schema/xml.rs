//! Extension XML loader.
//!
//! ```xml
//! <XuiExtensions>
//!   <Class Name="XuiText" BaseClassName="XuiElement">
//!     <Property Name="Text" Type="String" Flags="Localize"/>
//!   </Class>
//! </XuiExtensions>
//! ```

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::types::{PropertyFlags, PropertyKind, XuClass};
use crate::util::{Error, Result};

fn load_error(msg: impl Into<String>) -> Error {
    Error::SchemaLoad(msg.into())
}

/// Read `(key, value)` attribute pairs of an element.
fn attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| load_error(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| load_error(err.to_string()))?
            .to_string();
        out.push((key, value));
    }
    Ok(out)
}

fn find<'a>(attrs: &'a [(String, String)], keys: &[&str]) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| keys.iter().any(|key| k.eq_ignore_ascii_case(key)))
        .map(|(_, v)| v.as_str())
}

fn start_class(e: &BytesStart<'_>) -> Result<XuClass> {
    let attrs = attributes(e)?;
    let name = find(&attrs, &["Name"]).ok_or_else(|| load_error("Class without Name"))?;
    let base = find(&attrs, &["BaseClassName", "Base"]).filter(|b| !b.is_empty());
    Ok(XuClass::new(name, base))
}

fn add_property(class: XuClass, e: &BytesStart<'_>) -> Result<XuClass> {
    let attrs = attributes(e)?;
    let name = find(&attrs, &["Name"])
        .ok_or_else(|| load_error(format!("property without Name in {}", class.name)))?;
    let type_name = find(&attrs, &["Type"])
        .ok_or_else(|| load_error(format!("{}.{name} has no Type", class.name)))?;
    let kind = PropertyKind::from_name(type_name)
        .ok_or_else(|| load_error(format!("{}.{name}: unknown type {type_name}", class.name)))?;
    let mut flags = match find(&attrs, &["Flags"]) {
        Some(text) => PropertyFlags::parse(text)
            .ok_or_else(|| load_error(format!("{}.{name}: bad flags {text:?}", class.name)))?,
        None => PropertyFlags::NONE,
    };
    if find(&attrs, &["Indexed"]).is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        flags = flags.union(PropertyFlags::INDEXED);
    }
    if class.property(name).is_some() {
        return Err(load_error(format!("{}.{name} defined twice", class.name)));
    }
    Ok(class.with_flagged_property(name, kind, flags))
}

/// Parse extension XML into classes, in document order.
pub fn parse_extension_xml(text: &str) -> Result<Vec<XuClass>> {
    let mut xml = Reader::from_str(text);
    xml.config_mut().trim_text(true);

    let mut classes = Vec::new();
    let mut current: Option<XuClass> = None;

    loop {
        match xml.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Class" => {
                    if current.is_some() {
                        return Err(load_error("nested Class elements"));
                    }
                    current = Some(start_class(e)?);
                }
                b"Property" => {
                    let class = current
                        .take()
                        .ok_or_else(|| load_error("Property outside Class"))?;
                    current = Some(add_property(class, e)?);
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"Class" => classes.push(start_class(e)?),
                b"Property" => {
                    let class = current
                        .take()
                        .ok_or_else(|| load_error("Property outside Class"))?;
                    current = Some(add_property(class, e)?);
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"Class" {
                    let class = current
                        .take()
                        .ok_or_else(|| load_error("unbalanced </Class>"))?;
                    classes.push(class);
                }
            }
            Err(e) => {
                return Err(load_error(format!(
                    "XML error at byte {}: {e}",
                    xml.buffer_position()
                )))
            }
            _ => {}
        }
    }

    if let Some(class) = current {
        return Err(load_error(format!("unterminated Class {}", class.name)));
    }
    tracing::debug!(classes = classes.len(), "parsed extension XML");
    Ok(classes)
}
