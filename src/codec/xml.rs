// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! XML (de)serialization of [`Value`]s against a [`Schema`], grounded
//! on `structs_xml_input`/`structs_xml_output`.
//!
//! Arrays and fixed arrays always use the element tag `item`; the
//! original library lets each array type name its own element tag,
//! but this crate has no per-array-type slot to carry that name in,
//! so the convention is fixed crate-wide (see `DESIGN.md`). Combined
//! tags (`STRUCTS_XML_COMB_TAGS`, e.g. `<a.b>content</a.b>` addressing
//! nested field `b` of field `a` without an intervening element) are
//! supported for structure and union fields.

use bitflags::bitflags;
use quick_xml::{
    Reader, Writer,
    events::{BytesStart, BytesText, Event},
};

use crate::{
    error::{Error, Result},
    structs::{Schema, UnionValue, Value},
};

const ARRAY_ELEM_TAG: &str = "item";
const SEPARATOR: char = '.';

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct InputFlags: u32 {
        /// Caller's `data` needs full initialization first (vs.
        /// already-initialized, only-overwrite-what's-present).
        const UNINIT    = 0x0001;
        /// Unknown tags / nested attributes warn instead of erroring.
        const LOOSE     = 0x0002;
        /// Parse but discard (structural validation only).
        const SCAN      = 0x0004;
        /// Allow `a.b.c`-combined element tags.
        const COMB_TAGS = 0x0008;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct OutputFlags: u32 {
        /// Emit fields even when they equal their default-initialized value.
        const FULL = 0x0001;
    }
}

/// Parse an XML document whose root element is `elem_tag` into a
/// `Value` matching `schema`. Returns the value and the root element's
/// attributes (name, value) pairs in document order.
pub fn input(schema: &Schema, elem_tag: &str, xml: &str, flags: InputFlags) -> Result<(Value, Vec<(String, String)>)> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event().map_err(|e| Error::parse("xml", e.to_string()))? {
            Event::Empty(start) => {
                let name = tag_name(&start)?;
                if name != elem_tag {
                    return Err(Error::parse("xml", format!("expected root element \"{elem_tag}\", got \"{name}\"")));
                }
                return Ok((Value::init(schema), read_attrs(&start)?));
            },
            Event::Start(start) => {
                let name = tag_name(&start)?;
                if name != elem_tag {
                    return Err(Error::parse("xml", format!("expected root element \"{elem_tag}\", got \"{name}\"")));
                }
                let attrs = read_attrs(&start)?;
                if flags.contains(InputFlags::SCAN) {
                    skip_element_body(&mut reader)?;
                    return Ok((Value::init(schema), attrs));
                }
                let value = parse_body(&mut reader, schema, flags)?;
                return Ok((value, attrs));
            },
            Event::Eof => return Err(Error::parse("xml", "unexpected end of document")),
            _ => continue,
        }
    }
}

fn parse_body(reader: &mut Reader<&[u8]>, schema: &Schema, flags: InputFlags) -> Result<Value> {
    match schema {
        Schema::Primitive(kind) => {
            let text = read_text_until_end(reader)?;
            Ok(Value::Primitive(kind.binify(text.trim())?))
        },
        Schema::Structure(fields) => {
            let mut value = Value::init(schema);
            loop {
                match reader.read_event().map_err(|e| Error::parse("xml", e.to_string()))? {
                    Event::End(_) => return Ok(value),
                    event @ (Event::Start(_) | Event::Empty(_)) => {
                        let empty = matches!(event, Event::Empty(_));
                        let start = match event {
                            Event::Start(s) | Event::Empty(s) => s,
                            _ => unreachable!(),
                        };
                        let name = tag_name(&start)?;
                        let parts: Vec<&str> = if flags.contains(InputFlags::COMB_TAGS) {
                            name.split(SEPARATOR).collect()
                        } else {
                            vec![name.as_str()]
                        };
                        set_structure_field(reader, fields, &mut value, &parts, flags, empty)?;
                    },
                    Event::Eof => return Err(Error::parse("xml", "unexpected end of document")),
                    _ => continue,
                }
            }
        },
        Schema::Union(fields) => {
            match reader.read_event().map_err(|e| Error::parse("xml", e.to_string()))? {
                event @ (Event::Start(_) | Event::Empty(_)) => {
                    let empty = matches!(event, Event::Empty(_));
                    let start = match event {
                        Event::Start(s) | Event::Empty(s) => s,
                        _ => unreachable!(),
                    };
                    let name = tag_name(&start)?;
                    let parts: Vec<&str> = if flags.contains(InputFlags::COMB_TAGS) {
                        name.split(SEPARATOR).collect()
                    } else {
                        vec![name.as_str()]
                    };
                    let uv = parse_union_path(fields, &parts, reader, flags, empty)?;
                    if !empty {
                        expect_struct_end(reader)?;
                    }
                    Ok(Value::Union(Box::new(uv)))
                },
                Event::End(_) => Ok(Value::init(schema)),
                Event::Eof => Err(Error::parse("xml", "unexpected end of document")),
                _ => Err(Error::parse("xml", "expected a union field element")),
            }
        },
        Schema::Array(elem) | Schema::FixedArray(elem, _) => {
            let mut items = Vec::new();
            loop {
                match reader.read_event().map_err(|e| Error::parse("xml", e.to_string()))? {
                    Event::End(_) => break,
                    event @ (Event::Start(_) | Event::Empty(_)) => {
                        let empty = matches!(event, Event::Empty(_));
                        let start = match event {
                            Event::Start(s) | Event::Empty(s) => s,
                            _ => unreachable!(),
                        };
                        let name = tag_name(&start)?;
                        if name != ARRAY_ELEM_TAG {
                            return Err(Error::parse("xml", format!("expected <{ARRAY_ELEM_TAG}>, got <{name}>")));
                        }
                        items.push(parse_element_body(reader, elem, flags, empty)?);
                    },
                    Event::Eof => return Err(Error::parse("xml", "unexpected end of document")),
                    _ => continue,
                }
            }
            Ok(if matches!(schema, Schema::Array(_)) { Value::Array(items) } else { Value::FixedArray(items) })
        },
        Schema::Pointer(inner) => parse_body(reader, inner, flags).map(|v| Value::Pointer(Some(Box::new(v)))),
    }
}

/// Dispatch on whether the element that opened this body was
/// self-closing (`<tag/>`, no further tokens to read for it) or a
/// regular start tag whose matching end tag `parse_body` must consume.
fn parse_element_body(reader: &mut Reader<&[u8]>, schema: &Schema, flags: InputFlags, empty: bool) -> Result<Value> {
    if empty {
        match schema {
            Schema::Primitive(kind) => Ok(Value::Primitive(kind.binify("")?)),
            _ => Ok(Value::init(schema)),
        }
    } else {
        parse_body(reader, schema, flags)
    }
}

fn set_structure_field(
    reader: &mut Reader<&[u8]>,
    fields: &'static [crate::structs::Field],
    value: &mut Value,
    parts: &[&str],
    flags: InputFlags,
    empty: bool,
) -> Result<()> {
    let Value::Structure(entries) = value else {
        return Err(Error::invalid("set_structure_field: not a structure"));
    };
    let Some(field) = fields.iter().find(|f| f.name == parts[0]) else {
        if flags.contains(InputFlags::LOOSE) {
            if !empty {
                skip_element_body(reader)?;
            }
            return Ok(());
        }
        return Err(Error::parse("xml", format!("element \"{}\" is not expected here", parts[0])));
    };
    let new_value = if parts.len() == 1 {
        parse_element_body(reader, field.schema, flags, empty)?
    } else {
        parse_nested_path(field.schema, &parts[1..], reader, flags, empty)?
    };
    if let Some(slot) = entries.iter_mut().find(|(n, _)| *n == field.name) {
        slot.1 = new_value;
    }
    Ok(())
}

/// Resolve remaining combined-tag path components against a structure
/// or union schema without consuming any new XML tokens until the
/// leaf component, whose body is the current element's actual content.
fn parse_nested_path(
    schema: &Schema,
    parts: &[&str],
    reader: &mut Reader<&[u8]>,
    flags: InputFlags,
    empty: bool,
) -> Result<Value> {
    if parts.is_empty() {
        return parse_element_body(reader, schema, flags, empty);
    }
    match schema {
        Schema::Structure(fields) => {
            let mut value = Value::init(schema);
            let Some(field) = fields.iter().find(|f| f.name == parts[0]) else {
                return Err(Error::parse("xml", format!("combined tag references unknown field \"{}\"", parts[0])));
            };
            let inner = parse_nested_path(field.schema, &parts[1..], reader, flags, empty)?;
            if let Value::Structure(entries) = &mut value
                && let Some(slot) = entries.iter_mut().find(|(n, _)| *n == field.name)
            {
                slot.1 = inner;
            }
            Ok(value)
        },
        Schema::Union(fields) => Ok(Value::Union(Box::new(parse_union_path(fields, parts, reader, flags, empty)?))),
        _ => Err(Error::parse("xml", "combined tag path descends into a non-composite type")),
    }
}

fn parse_union_path(
    fields: &'static [crate::structs::UnionField],
    parts: &[&str],
    reader: &mut Reader<&[u8]>,
    flags: InputFlags,
    empty: bool,
) -> Result<UnionValue> {
    let Some(field) = fields.iter().find(|f| f.name == parts[0]) else {
        return Err(Error::parse("xml", format!("union has no field \"{}\"", parts[0])));
    };
    let inner = parse_nested_path(field.schema, &parts[1..], reader, flags, empty)?;
    Ok(UnionValue { chosen: field.name, inner })
}

fn read_text_until_end(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut text = String::new();
    loop {
        match reader.read_event().map_err(|e| Error::parse("xml", e.to_string()))? {
            Event::Text(t) => text.push_str(&decode_text(&t)?),
            Event::End(_) => return Ok(text),
            Event::Eof => return Err(Error::parse("xml", "unexpected end of document")),
            _ => continue,
        }
    }
}

fn expect_struct_end(reader: &mut Reader<&[u8]>) -> Result<()> {
    loop {
        match reader.read_event().map_err(|e| Error::parse("xml", e.to_string()))? {
            Event::End(_) => return Ok(()),
            Event::Eof => return Err(Error::parse("xml", "unexpected end of document")),
            _ => continue,
        }
    }
}

fn skip_element_body(reader: &mut Reader<&[u8]>) -> Result<()> {
    let mut depth = 1u32;
    loop {
        match reader.read_event().map_err(|e| Error::parse("xml", e.to_string()))? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            },
            Event::Eof => return Err(Error::parse("xml", "unexpected end of document")),
            _ => continue,
        }
    }
}

fn tag_name(start: &BytesStart) -> Result<String> {
    std::str::from_utf8(start.name().as_ref())
        .map(|s| s.to_string())
        .map_err(|_| Error::parse("xml", "non-UTF8 element name"))
}

fn decode_text(text: &BytesText) -> Result<String> {
    text.unescape().map(|s| s.to_string()).map_err(|e| Error::parse("xml", e.to_string()))
}

fn read_attrs(start: &BytesStart) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::parse("xml", e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(|_| Error::parse("xml", "non-UTF8 attribute name"))?;
        let val = attr.unescape_value().map_err(|e| Error::parse("xml", e.to_string()))?;
        out.push((key.to_string(), val.to_string()));
    }
    Ok(out)
}

/// Render `value` (matching `schema`) as an XML document rooted at
/// `elem_tag` with attributes `attrs`. Fields equal to their default
/// ([`Value::init`]) value are omitted unless `OutputFlags::FULL`.
pub fn output(schema: &Schema, elem_tag: &str, value: &Value, attrs: &[(&str, &str)], flags: OutputFlags) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let mut start = BytesStart::new(elem_tag);
    for (k, v) in attrs {
        start.push_attribute((*k, *v));
    }
    writer.write_event(Event::Start(start)).map_err(|e| Error::parse("xml", e.to_string()))?;
    write_body(&mut writer, schema, value, flags)?;
    writer
        .write_event(Event::End(quick_xml::events::BytesEnd::new(elem_tag)))
        .map_err(|e| Error::parse("xml", e.to_string()))?;
    String::from_utf8(writer.into_inner()).map_err(|_| Error::parse("xml", "non-UTF8 output"))
}

fn write_body(writer: &mut Writer<Vec<u8>>, schema: &Schema, value: &Value, flags: OutputFlags) -> Result<()> {
    match (schema, value) {
        (Schema::Primitive(kind), Value::Primitive(v)) => {
            let text = kind.ascify(v)?;
            writer
                .write_event(Event::Text(BytesText::new(&text)))
                .map_err(|e| Error::parse("xml", e.to_string()))?;
            Ok(())
        },
        (Schema::Structure(fields), Value::Structure(entries)) => {
            let default = Value::init(schema);
            let Value::Structure(default_entries) = &default else { unreachable!() };
            for f in *fields {
                let v = entries.iter().find(|(n, _)| *n == f.name).map(|(_, v)| v).expect("field present");
                let is_default = default_entries
                    .iter()
                    .find(|(n, _)| *n == f.name)
                    .is_some_and(|(_, dv)| dv.structural_equal(v, f.schema));
                if is_default && !flags.contains(OutputFlags::FULL) {
                    continue;
                }
                write_element(writer, f.name, f.schema, v, flags)?;
            }
            Ok(())
        },
        (Schema::Union(fields), Value::Union(u)) => {
            let f = fields.iter().find(|f| f.name == u.chosen).ok_or_else(|| Error::not_found(u.chosen))?;
            write_element(writer, f.name, f.schema, &u.inner, flags)
        },
        (Schema::Array(elem), Value::Array(items)) | (Schema::FixedArray(elem, _), Value::FixedArray(items)) => {
            for item in items {
                write_element(writer, ARRAY_ELEM_TAG, elem, item, flags)?;
            }
            Ok(())
        },
        (Schema::Pointer(inner), Value::Pointer(slot)) => match slot {
            Some(v) => write_body(writer, inner, v, flags),
            None => Ok(()),
        },
        _ => Err(Error::invalid("xml output: schema/value mismatch")),
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, tag: &str, schema: &Schema, value: &Value, flags: OutputFlags) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag))).map_err(|e| Error::parse("xml", e.to_string()))?;
    write_body(writer, schema, value, flags)?;
    writer
        .write_event(Event::End(quick_xml::events::BytesEnd::new(tag)))
        .map_err(|e| Error::parse("xml", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::{Field, PrimitiveKind};

    static PORT: Schema = Schema::Primitive(PrimitiveKind::U16);
    static HOST: Schema = Schema::Primitive(PrimitiveKind::Str { max_len: None });
    static FIELDS: &[Field] = &[Field { name: "host", schema: &HOST }, Field { name: "port", schema: &PORT }];
    static ADDR: Schema = Schema::Structure(FIELDS);

    #[test]
    fn round_trip_structure() {
        let xml = "<addr><host>example.com</host><port>8080</port></addr>";
        let (value, attrs) = input(&ADDR, "addr", xml, InputFlags::empty()).unwrap();
        assert!(attrs.is_empty());
        let rendered = output(&ADDR, "addr", &value, &[], OutputFlags::FULL).unwrap();
        let (reparsed, _) = input(&ADDR, "addr", &rendered, InputFlags::empty()).unwrap();
        assert!(reparsed.structural_equal(&value, &ADDR));
    }

    #[test]
    fn defaults_are_omitted_unless_full() {
        let value = Value::init(&ADDR);
        let rendered = output(&ADDR, "addr", &value, &[], OutputFlags::empty()).unwrap();
        assert!(!rendered.contains("<host>"));
        let full = output(&ADDR, "addr", &value, &[], OutputFlags::FULL).unwrap();
        assert!(full.contains("<host>"));
    }

    #[test]
    fn root_attributes_are_captured() {
        let xml = "<addr id=\"7\"><host>h</host><port>1</port></addr>";
        let (_, attrs) = input(&ADDR, "addr", xml, InputFlags::empty()).unwrap();
        assert_eq!(attrs, vec![("id".to_string(), "7".to_string())]);
    }

    #[test]
    fn loose_mode_skips_unknown_elements() {
        let xml = "<addr><host>h</host><bogus>x</bogus><port>1</port></addr>";
        let (value, _) = input(&ADDR, "addr", xml, InputFlags::LOOSE).unwrap();
        let Value::Structure(entries) = &value else { panic!() };
        assert_eq!(entries.iter().find(|(n, _)| *n == "port").unwrap().1, Value::Primitive(crate::structs::PrimitiveValue::U16(1)));
    }
}
