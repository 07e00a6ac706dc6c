// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! XML-RPC request/response/fault codec, grounded on
//! `structs_xmlrpc.c`'s value union (`string`/`i4`/`int`/`boolean`/
//! `double`/`dateTime.iso8601`/`base64`/`struct`/`array`) and envelope
//! types (`xmlrpc_request`, `xmlrpc_response`, `xmlrpc_fault`).
//!
//! Unlike [`super::xml`], this speaks the fixed XML-RPC wire grammar
//! (`<struct><member><name>.../<name><value>...` and
//! `<array><data><value>...`) rather than a generic structs mapping,
//! since that grammar is mandated by the protocol and does not fit
//! the generic codec's array/field-name conventions.

use base64::Engine;
use chrono::{DateTime, Utc};
use quick_xml::{
    Reader, Writer,
    events::{BytesStart, BytesText, Event},
};

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Int(i32),
    Bool(bool),
    Double(f64),
    DateTime(DateTime<Utc>),
    Base64(Vec<u8>),
    Struct(Vec<(String, Value)>),
    Array(Vec<Value>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Fault {
    pub code: i32,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodCall {
    pub method_name: String,
    pub params: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MethodResponse {
    Success(Vec<Value>),
    Fault(Fault),
}

pub fn encode_call(call: &MethodCall) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_start(&mut writer, "methodCall")?;
    write_text_elem(&mut writer, "methodName", &call.method_name)?;
    write_start(&mut writer, "params")?;
    for param in &call.params {
        write_start(&mut writer, "param")?;
        write_value(&mut writer, param)?;
        write_end(&mut writer, "param")?;
    }
    write_end(&mut writer, "params")?;
    write_end(&mut writer, "methodCall")?;
    finish(writer)
}

pub fn decode_call(xml: &str) -> Result<MethodCall> {
    let mut reader = new_reader(xml);
    expect_start(&mut reader, "methodCall")?;
    expect_start(&mut reader, "methodName")?;
    let method_name = read_text(&mut reader)?;
    expect_start(&mut reader, "params")?;
    let mut params = Vec::new();
    loop {
        match next(&mut reader)? {
            Event::Start(s) if tag_eq(&s, "param") => {
                expect_start(&mut reader, "value")?;
                params.push(read_value(&mut reader)?);
                expect_end(&mut reader, "param")?;
            },
            Event::End(e) if tag_eq_end(&e, "params") => break,
            Event::Eof => return Err(Error::parse("xmlrpc", "unexpected eof in params")),
            _ => continue,
        }
    }
    expect_end(&mut reader, "methodCall")?;
    Ok(MethodCall { method_name, params })
}

pub fn encode_response(response: &MethodResponse) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_start(&mut writer, "methodResponse")?;
    match response {
        MethodResponse::Success(values) => {
            write_start(&mut writer, "params")?;
            for v in values {
                write_start(&mut writer, "param")?;
                write_value(&mut writer, v)?;
                write_end(&mut writer, "param")?;
            }
            write_end(&mut writer, "params")?;
        },
        MethodResponse::Fault(fault) => {
            write_start(&mut writer, "fault")?;
            let struct_value = Value::Struct(vec![
                ("faultCode".to_string(), Value::Int(fault.code)),
                ("faultString".to_string(), Value::String(fault.message.clone())),
            ]);
            write_value(&mut writer, &struct_value)?;
            write_end(&mut writer, "fault")?;
        },
    }
    write_end(&mut writer, "methodResponse")?;
    finish(writer)
}

pub fn decode_response(xml: &str) -> Result<MethodResponse> {
    let mut reader = new_reader(xml);
    expect_start(&mut reader, "methodResponse")?;
    let response = match next(&mut reader)? {
        Event::Start(s) if tag_eq(&s, "params") => {
            let mut values = Vec::new();
            loop {
                match next(&mut reader)? {
                    Event::Start(s) if tag_eq(&s, "param") => {
                        expect_start(&mut reader, "value")?;
                        values.push(read_value(&mut reader)?);
                        expect_end(&mut reader, "param")?;
                    },
                    Event::End(e) if tag_eq_end(&e, "params") => break,
                    Event::Eof => return Err(Error::parse("xmlrpc", "unexpected eof in params")),
                    _ => continue,
                }
            }
            MethodResponse::Success(values)
        },
        Event::Start(s) if tag_eq(&s, "fault") => {
            expect_start(&mut reader, "value")?;
            let value = read_value(&mut reader)?;
            expect_end(&mut reader, "fault")?;
            let Value::Struct(fields) = value else {
                return Err(Error::parse("xmlrpc", "fault value must be a struct"));
            };
            let code = fields
                .iter()
                .find(|(n, _)| n == "faultCode")
                .and_then(|(_, v)| if let Value::Int(i) = v { Some(*i) } else { None })
                .ok_or_else(|| Error::parse("xmlrpc", "fault missing faultCode"))?;
            let message = fields
                .iter()
                .find(|(n, _)| n == "faultString")
                .and_then(|(_, v)| if let Value::String(s) = v { Some(s.clone()) } else { None })
                .ok_or_else(|| Error::parse("xmlrpc", "fault missing faultString"))?;
            MethodResponse::Fault(Fault { code, message })
        },
        _ => return Err(Error::parse("xmlrpc", "expected <params> or <fault>")),
    };
    expect_end(&mut reader, "methodResponse")?;
    Ok(response)
}

fn new_reader(xml: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    reader
}

fn next<'a>(reader: &mut Reader<&'a [u8]>) -> Result<Event<'a>> {
    reader.read_event().map_err(|e| Error::parse("xmlrpc", e.to_string()))
}

fn tag_eq(start: &BytesStart, name: &str) -> bool {
    start.name().as_ref() == name.as_bytes()
}

fn tag_eq_end(end: &quick_xml::events::BytesEnd, name: &str) -> bool {
    end.name().as_ref() == name.as_bytes()
}

fn expect_start(reader: &mut Reader<&[u8]>, name: &str) -> Result<()> {
    loop {
        match next(reader)? {
            Event::Start(s) if tag_eq(&s, name) => return Ok(()),
            Event::Eof => return Err(Error::parse("xmlrpc", format!("expected <{name}>, hit eof"))),
            _ => continue,
        }
    }
}

fn expect_end(reader: &mut Reader<&[u8]>, name: &str) -> Result<()> {
    loop {
        match next(reader)? {
            Event::End(e) if tag_eq_end(&e, name) => return Ok(()),
            Event::Eof => return Err(Error::parse("xmlrpc", format!("expected </{name}>, hit eof"))),
            _ => continue,
        }
    }
}

fn read_text(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut text = String::new();
    loop {
        match next(reader)? {
            Event::Text(t) => text.push_str(&t.unescape().map_err(|e| Error::parse("xmlrpc", e.to_string()))?),
            Event::End(_) => return Ok(text),
            Event::Eof => return Err(Error::parse("xmlrpc", "unexpected eof reading text")),
            _ => continue,
        }
    }
}

/// Read the body of a `<value>` element (the `<value>` start tag has
/// already been consumed by the caller).
fn read_value(reader: &mut Reader<&[u8]>) -> Result<Value> {
    match next(reader)? {
        Event::End(e) if tag_eq_end(&e, "value") => Ok(Value::String(String::new())),
        Event::Text(t) => {
            let s = t.unescape().map_err(|e| Error::parse("xmlrpc", e.to_string()))?.to_string();
            expect_end(reader, "value")?;
            Ok(Value::String(s))
        },
        Event::Start(s) => {
            let type_name = std::str::from_utf8(s.name().as_ref())
                .map_err(|_| Error::parse("xmlrpc", "non-UTF8 type tag"))?
                .to_string();
            let value = match type_name.as_str() {
                "string" => Value::String(read_text(reader)?),
                "i4" | "int" => {
                    let text = read_text(reader)?;
                    Value::Int(text.trim().parse().map_err(|_| Error::parse("xmlrpc", format!("bad int \"{text}\"")))?)
                },
                "boolean" => {
                    let text = read_text(reader)?;
                    Value::Bool(text.trim() == "1")
                },
                "double" => {
                    let text = read_text(reader)?;
                    Value::Double(text.trim().parse().map_err(|_| Error::parse("xmlrpc", format!("bad double \"{text}\"")))?)
                },
                "dateTime.iso8601" => {
                    let text = read_text(reader)?;
                    let dt = DateTime::parse_from_str(text.trim(), "%Y%m%dT%H:%M:%S")
                        .map(|dt| dt.with_timezone(&Utc))
                        .or_else(|_| {
                            chrono::NaiveDateTime::parse_from_str(text.trim(), "%Y%m%dT%H:%M:%S")
                                .map(|ndt| ndt.and_utc())
                        })
                        .map_err(|_| Error::parse("xmlrpc", format!("bad dateTime.iso8601 \"{text}\"")))?;
                    Value::DateTime(dt)
                },
                "base64" => {
                    let text = read_text(reader)?;
                    let bytes = base64::engine::general_purpose::STANDARD
                        .decode(text.trim())
                        .map_err(|e| Error::parse("xmlrpc", e.to_string()))?;
                    Value::Base64(bytes)
                },
                "struct" => {
                    let mut fields = Vec::new();
                    loop {
                        match next(reader)? {
                            Event::Start(s) if tag_eq(&s, "member") => {
                                expect_start(reader, "name")?;
                                let name = read_text(reader)?;
                                expect_start(reader, "value")?;
                                let value = read_value(reader)?;
                                expect_end(reader, "member")?;
                                fields.push((name, value));
                            },
                            Event::End(e) if tag_eq_end(&e, "struct") => break,
                            Event::Eof => return Err(Error::parse("xmlrpc", "unexpected eof in struct")),
                            _ => continue,
                        }
                    }
                    Value::Struct(fields)
                },
                "array" => {
                    expect_start(reader, "data")?;
                    let mut items = Vec::new();
                    loop {
                        match next(reader)? {
                            Event::Start(s) if tag_eq(&s, "value") => items.push(read_value(reader)?),
                            Event::End(e) if tag_eq_end(&e, "data") => break,
                            Event::Eof => return Err(Error::parse("xmlrpc", "unexpected eof in array")),
                            _ => continue,
                        }
                    }
                    expect_end(reader, "array")?;
                    Value::Array(items)
                },
                other => return Err(Error::parse("xmlrpc", format!("unknown value type <{other}>"))),
            };
            expect_end(reader, "value")?;
            Ok(value)
        },
        Event::Eof => Err(Error::parse("xmlrpc", "unexpected eof reading value")),
        _ => Err(Error::parse("xmlrpc", "malformed <value>")),
    }
}

fn write_start(writer: &mut Writer<Vec<u8>>, tag: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag))).map_err(|e| Error::parse("xmlrpc", e.to_string()))
}

fn write_end(writer: &mut Writer<Vec<u8>>, tag: &str) -> Result<()> {
    writer
        .write_event(Event::End(quick_xml::events::BytesEnd::new(tag)))
        .map_err(|e| Error::parse("xmlrpc", e.to_string()))
}

fn write_text_elem(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    write_start(writer, tag)?;
    writer.write_event(Event::Text(BytesText::new(text))).map_err(|e| Error::parse("xmlrpc", e.to_string()))?;
    write_end(writer, tag)
}

fn write_value(writer: &mut Writer<Vec<u8>>, value: &Value) -> Result<()> {
    write_start(writer, "value")?;
    match value {
        Value::String(s) => write_text_elem(writer, "string", s)?,
        Value::Int(i) => write_text_elem(writer, "i4", &i.to_string())?,
        Value::Bool(b) => write_text_elem(writer, "boolean", if *b { "1" } else { "0" })?,
        Value::Double(d) => write_text_elem(writer, "double", &d.to_string())?,
        Value::DateTime(dt) => write_text_elem(writer, "dateTime.iso8601", &dt.format("%Y%m%dT%H:%M:%S").to_string())?,
        Value::Base64(bytes) => {
            write_text_elem(writer, "base64", &base64::engine::general_purpose::STANDARD.encode(bytes))?
        },
        Value::Struct(fields) => {
            write_start(writer, "struct")?;
            for (name, v) in fields {
                write_start(writer, "member")?;
                write_text_elem(writer, "name", name)?;
                write_value(writer, v)?;
                write_end(writer, "member")?;
            }
            write_end(writer, "struct")?;
        },
        Value::Array(items) => {
            write_start(writer, "array")?;
            write_start(writer, "data")?;
            for item in items {
                write_value(writer, item)?;
            }
            write_end(writer, "data")?;
            write_end(writer, "array")?;
        },
    }
    write_end(writer, "value")
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String> {
    String::from_utf8(writer.into_inner()).map_err(|_| Error::parse("xmlrpc", "non-UTF8 output"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_call() {
        let call = MethodCall {
            method_name: "echo".to_string(),
            params: vec![Value::String("hi".to_string()), Value::Int(42), Value::Bool(true)],
        };
        let xml = encode_call(&call).unwrap();
        let decoded = decode_call(&xml).unwrap();
        assert_eq!(decoded, call);
    }

    #[test]
    fn round_trip_struct_and_array() {
        let value = Value::Struct(vec![
            ("name".to_string(), Value::String("x".to_string())),
            ("items".to_string(), Value::Array(vec![Value::Int(1), Value::Int(2)])),
        ]);
        let response = MethodResponse::Success(vec![value.clone()]);
        let xml = encode_response(&response).unwrap();
        let decoded = decode_response(&xml).unwrap();
        assert_eq!(decoded, MethodResponse::Success(vec![value]));
    }

    #[test]
    fn fault_round_trip() {
        let response = MethodResponse::Fault(Fault { code: 4, message: "too many parameters".to_string() });
        let xml = encode_response(&response).unwrap();
        assert_eq!(decode_response(&xml).unwrap(), response);
    }

    #[test]
    fn bare_text_value_defaults_to_string() {
        let xml = "<methodResponse><params><param><value>plain</value></param></params></methodResponse>";
        let decoded = decode_response(xml).unwrap();
        assert_eq!(decoded, MethodResponse::Success(vec![Value::String("plain".to_string())]));
    }
}
