// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Concrete primitive types: the leaves of the structural type tree.
//!
//! Each [`PrimitiveKind`] carries its own 3-slot parameter vector worth of
//! configuration (vocabulary, bounds, lookup table, …) and knows how to
//! `init`/`ascify`/`binify`/`encode`/`decode`/`equal` its own
//! [`PrimitiveValue`]. Grounded on the teacher's `BasicHeaderSegment`
//! pattern of small, self-contained per-kind operations rather than a
//! single god-function.

use std::{
    fmt::Write as _,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs},
};

use chrono::{DateTime, Local, TimeZone, Utc};

use crate::error::{Error, Result};

/// Which ASCII vocabulary a boolean uses for its canonical ascify form.
/// Parsing always accepts every vocabulary case-insensitively; only the
/// canonical (ascify) output depends on this.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoolVocabulary {
    TrueFalse,
    YesNo,
    OnOff,
    EnabledDisabled,
    OneZero,
}

const BOOL_PAIRS: &[(BoolVocabulary, &str, &str)] = &[
    (BoolVocabulary::TrueFalse, "True", "False"),
    (BoolVocabulary::YesNo, "Yes", "No"),
    (BoolVocabulary::OnOff, "On", "Off"),
    (BoolVocabulary::EnabledDisabled, "Enabled", "Disabled"),
    (BoolVocabulary::OneZero, "1", "0"),
];

/// ASCII rendering chosen for opaque binary data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryForm {
    Base64,
    Hex,
}

/// A name ↔ integer lookup table backing an identifier-enum primitive.
#[derive(Clone, Debug)]
pub struct IdTable {
    pub entries: &'static [(&'static str, i64)],
    pub case_insensitive: bool,
}

impl IdTable {
    pub fn name_of(&self, value: i64) -> Option<&'static str> {
        self.entries.iter().find(|(_, v)| *v == value).map(|(n, _)| *n)
    }

    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(n, _)| {
                if self.case_insensitive {
                    n.eq_ignore_ascii_case(name)
                } else {
                    *n == name
                }
            })
            .map(|(_, v)| *v)
    }
}

/// The 3-slot parameter vector attached to a primitive's schema node,
/// reified as an enum instead of `(flags, ptr, string)` C-style slots.
#[derive(Clone, Debug)]
pub enum PrimitiveKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Bool(BoolVocabulary),
    /// Owning string, optionally length-bounded.
    Str { max_len: Option<usize> },
    /// Opaque binary blob, ascified per `form`, optionally length-bounded.
    Binary { form: BinaryForm, max_len: Option<usize> },
    Ip4,
    Ip6,
    Ether,
    /// Absolute instant, stored as seconds since the Unix epoch.
    Time,
    Id(&'static IdTable),
    /// `{ name, resolved_ips[] }`; `binify` triggers a DNS lookup.
    DnsName,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PrimitiveValue {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Str(String),
    Binary(Vec<u8>),
    Ip4(Ipv4Addr),
    Ip6(Ipv6Addr),
    Ether([u8; 6]),
    Time(i64),
    Id(i64),
    DnsName { name: String, resolved_ips: Vec<IpAddr> },
}

impl PrimitiveKind {
    /// In-memory size in bytes, reported for parity with the original API;
    /// not used to interpret memory layout (Rust values own their storage).
    pub fn size(&self) -> usize {
        match self {
            PrimitiveKind::I8 | PrimitiveKind::U8 | PrimitiveKind::Bool(_) => 1,
            PrimitiveKind::I16 | PrimitiveKind::U16 => 2,
            PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::F32 => 4,
            PrimitiveKind::I64
            | PrimitiveKind::U64
            | PrimitiveKind::F64
            | PrimitiveKind::Time
            | PrimitiveKind::Id(_) => 8,
            PrimitiveKind::Str { .. } | PrimitiveKind::Binary { .. } => {
                std::mem::size_of::<Vec<u8>>()
            },
            PrimitiveKind::Ip4 => 4,
            PrimitiveKind::Ip6 => 16,
            PrimitiveKind::Ether => 6,
            PrimitiveKind::DnsName => std::mem::size_of::<String>(),
        }
    }

    pub fn init(&self) -> PrimitiveValue {
        match self {
            PrimitiveKind::I8 => PrimitiveValue::I8(0),
            PrimitiveKind::U8 => PrimitiveValue::U8(0),
            PrimitiveKind::I16 => PrimitiveValue::I16(0),
            PrimitiveKind::U16 => PrimitiveValue::U16(0),
            PrimitiveKind::I32 => PrimitiveValue::I32(0),
            PrimitiveKind::U32 => PrimitiveValue::U32(0),
            PrimitiveKind::I64 => PrimitiveValue::I64(0),
            PrimitiveKind::U64 => PrimitiveValue::U64(0),
            PrimitiveKind::F32 => PrimitiveValue::F32(0.0),
            PrimitiveKind::F64 => PrimitiveValue::F64(0.0),
            PrimitiveKind::Bool(_) => PrimitiveValue::Bool(false),
            PrimitiveKind::Str { .. } => PrimitiveValue::Str(String::new()),
            PrimitiveKind::Binary { .. } => PrimitiveValue::Binary(Vec::new()),
            PrimitiveKind::Ip4 => PrimitiveValue::Ip4(Ipv4Addr::UNSPECIFIED),
            PrimitiveKind::Ip6 => PrimitiveValue::Ip6(Ipv6Addr::UNSPECIFIED),
            PrimitiveKind::Ether => PrimitiveValue::Ether([0; 6]),
            PrimitiveKind::Time => PrimitiveValue::Time(0),
            PrimitiveKind::Id(table) => {
                PrimitiveValue::Id(table.entries.first().map(|(_, v)| *v).unwrap_or(0))
            },
            PrimitiveKind::DnsName => {
                PrimitiveValue::DnsName { name: String::new(), resolved_ips: Vec::new() }
            },
        }
    }

    pub fn equal(&self, a: &PrimitiveValue, b: &PrimitiveValue) -> bool {
        a == b
    }

    pub fn ascify(&self, v: &PrimitiveValue) -> Result<String> {
        match (self, v) {
            (PrimitiveKind::I8, PrimitiveValue::I8(n)) => Ok(n.to_string()),
            (PrimitiveKind::U8, PrimitiveValue::U8(n)) => Ok(n.to_string()),
            (PrimitiveKind::I16, PrimitiveValue::I16(n)) => Ok(n.to_string()),
            (PrimitiveKind::U16, PrimitiveValue::U16(n)) => Ok(n.to_string()),
            (PrimitiveKind::I32, PrimitiveValue::I32(n)) => Ok(n.to_string()),
            (PrimitiveKind::U32, PrimitiveValue::U32(n)) => Ok(n.to_string()),
            (PrimitiveKind::I64, PrimitiveValue::I64(n)) => Ok(n.to_string()),
            (PrimitiveKind::U64, PrimitiveValue::U64(n)) => Ok(n.to_string()),
            (PrimitiveKind::F32, PrimitiveValue::F32(f)) => Ok(format_g(*f as f64, 16)),
            (PrimitiveKind::F64, PrimitiveValue::F64(f)) => Ok(format_g(*f, 16)),
            (PrimitiveKind::Bool(vocab), PrimitiveValue::Bool(b)) => {
                let (t, f) = BOOL_PAIRS
                    .iter()
                    .find(|(v, _, _)| v == vocab)
                    .map(|(_, t, f)| (*t, *f))
                    .unwrap_or(("True", "False"));
                Ok(if *b { t.to_string() } else { f.to_string() })
            },
            (PrimitiveKind::Str { .. }, PrimitiveValue::Str(s)) => Ok(s.clone()),
            (PrimitiveKind::Binary { form, .. }, PrimitiveValue::Binary(b)) => Ok(match form {
                BinaryForm::Base64 => {
                    use base64::Engine;
                    base64::engine::general_purpose::STANDARD.encode(b)
                },
                BinaryForm::Hex => hex::encode(b),
            }),
            (PrimitiveKind::Ip4, PrimitiveValue::Ip4(ip)) => Ok(ip.to_string()),
            (PrimitiveKind::Ip6, PrimitiveValue::Ip6(ip)) => Ok(ip.to_string()),
            (PrimitiveKind::Ether, PrimitiveValue::Ether(bytes)) => {
                let mut s = String::with_capacity(17);
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        s.push(':');
                    }
                    write!(s, "{b:02x}").map_err(|e| Error::parse("ether", e.to_string()))?;
                }
                Ok(s)
            },
            (PrimitiveKind::Time, PrimitiveValue::Time(secs)) => {
                let dt = Utc
                    .timestamp_opt(*secs, 0)
                    .single()
                    .ok_or_else(|| Error::Range("time out of range".into()))?;
                Ok(dt.to_rfc3339())
            },
            (PrimitiveKind::Id(table), PrimitiveValue::Id(v)) => table
                .name_of(*v)
                .map(str::to_string)
                .ok_or_else(|| Error::not_found(format!("no name for id value {v}"))),
            (PrimitiveKind::DnsName, PrimitiveValue::DnsName { name, .. }) => Ok(name.clone()),
            _ => Err(Error::invalid("ascify: kind/value mismatch")),
        }
    }

    pub fn binify(&self, s: &str) -> Result<PrimitiveValue> {
        match self {
            PrimitiveKind::I8 => Ok(PrimitiveValue::I8(parse_int(s)?)),
            PrimitiveKind::U8 => Ok(PrimitiveValue::U8(parse_int(s)?)),
            PrimitiveKind::I16 => Ok(PrimitiveValue::I16(parse_int(s)?)),
            PrimitiveKind::U16 => Ok(PrimitiveValue::U16(parse_int(s)?)),
            PrimitiveKind::I32 => Ok(PrimitiveValue::I32(parse_int(s)?)),
            PrimitiveKind::U32 => Ok(PrimitiveValue::U32(parse_int(s)?)),
            PrimitiveKind::I64 => Ok(PrimitiveValue::I64(parse_int(s)?)),
            PrimitiveKind::U64 => Ok(PrimitiveValue::U64(parse_int(s)?)),
            PrimitiveKind::F32 => {
                let v: f64 = s.trim().parse().map_err(|_| Error::parse("float", s))?;
                if v.is_infinite() || (v != 0.0 && v.abs() < f32::MIN_POSITIVE as f64) {
                    return Err(Error::Range(format!("float over/underflow: {s}")));
                }
                Ok(PrimitiveValue::F32(v as f32))
            },
            PrimitiveKind::F64 => {
                let v: f64 = s.trim().parse().map_err(|_| Error::parse("double", s))?;
                if v.is_infinite() {
                    return Err(Error::Range(format!("double overflow: {s}")));
                }
                Ok(PrimitiveValue::F64(v))
            },
            PrimitiveKind::Bool(_) => {
                let lower = s.trim().to_ascii_lowercase();
                for (_, t, f) in BOOL_PAIRS {
                    if lower == t.to_ascii_lowercase() {
                        return Ok(PrimitiveValue::Bool(true));
                    }
                    if lower == f.to_ascii_lowercase() {
                        return Ok(PrimitiveValue::Bool(false));
                    }
                }
                Err(Error::parse("bool", s))
            },
            PrimitiveKind::Str { max_len } => {
                if let Some(max) = max_len
                    && s.len() > *max
                {
                    return Err(Error::Range(format!(
                        "string length {} exceeds bound {max}",
                        s.len()
                    )));
                }
                Ok(PrimitiveValue::Str(s.to_string()))
            },
            PrimitiveKind::Binary { form, max_len } => {
                let bytes = match form {
                    BinaryForm::Base64 => {
                        use base64::Engine;
                        base64::engine::general_purpose::STANDARD
                            .decode(s.trim())
                            .map_err(|e| Error::parse("base64", e.to_string()))?
                    },
                    BinaryForm::Hex => {
                        hex::decode(s.trim()).map_err(|e| Error::parse("hex", e.to_string()))?
                    },
                };
                if let Some(max) = max_len
                    && bytes.len() > *max
                {
                    return Err(Error::Range(format!(
                        "binary length {} exceeds bound {max}",
                        bytes.len()
                    )));
                }
                Ok(PrimitiveValue::Binary(bytes))
            },
            PrimitiveKind::Ip4 => {
                Ok(PrimitiveValue::Ip4(s.trim().parse().map_err(|_| Error::parse("ip4", s))?))
            },
            PrimitiveKind::Ip6 => {
                Ok(PrimitiveValue::Ip6(s.trim().parse().map_err(|_| Error::parse("ip6", s))?))
            },
            PrimitiveKind::Ether => {
                let cleaned: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
                if cleaned.len() != 12 {
                    return Err(Error::parse("ether", s));
                }
                let raw = hex::decode(&cleaned).map_err(|e| Error::parse("ether", e.to_string()))?;
                let mut out = [0u8; 6];
                out.copy_from_slice(&raw);
                Ok(PrimitiveValue::Ether(out))
            },
            PrimitiveKind::Time => Ok(PrimitiveValue::Time(parse_time(s)?)),
            PrimitiveKind::Id(table) => table
                .value_of(s.trim())
                .map(PrimitiveValue::Id)
                .ok_or_else(|| Error::parse("id", s)),
            PrimitiveKind::DnsName => {
                let name = s.trim().to_string();
                let resolved_ips = resolve_dns_name(&name)?;
                Ok(PrimitiveValue::DnsName { name, resolved_ips })
            },
        }
    }

    pub fn encode(&self, v: &PrimitiveValue) -> Result<Vec<u8>> {
        Ok(match v {
            PrimitiveValue::I8(n) => n.to_be_bytes().to_vec(),
            PrimitiveValue::U8(n) => n.to_be_bytes().to_vec(),
            PrimitiveValue::I16(n) => n.to_be_bytes().to_vec(),
            PrimitiveValue::U16(n) => n.to_be_bytes().to_vec(),
            PrimitiveValue::I32(n) => n.to_be_bytes().to_vec(),
            PrimitiveValue::U32(n) => n.to_be_bytes().to_vec(),
            PrimitiveValue::I64(n) => n.to_be_bytes().to_vec(),
            PrimitiveValue::U64(n) => n.to_be_bytes().to_vec(),
            PrimitiveValue::F32(f) => f.to_be_bytes().to_vec(),
            PrimitiveValue::F64(f) => f.to_be_bytes().to_vec(),
            PrimitiveValue::Bool(b) => vec![*b as u8],
            PrimitiveValue::Str(s) => encode_length_prefixed(s.as_bytes()),
            PrimitiveValue::Binary(b) => encode_length_prefixed(b),
            PrimitiveValue::Ip4(ip) => ip.octets().to_vec(),
            PrimitiveValue::Ip6(ip) => ip.octets().to_vec(),
            PrimitiveValue::Ether(e) => e.to_vec(),
            PrimitiveValue::Time(t) => t.to_be_bytes().to_vec(),
            PrimitiveValue::Id(v) => v.to_be_bytes().to_vec(),
            PrimitiveValue::DnsName { name, .. } => encode_length_prefixed(name.as_bytes()),
        })
    }

    pub fn decode(&self, buf: &[u8]) -> Result<(PrimitiveValue, usize)> {
        fn need(buf: &[u8], n: usize) -> Result<()> {
            if buf.len() < n {
                return Err(Error::parse("decode", "buffer too short"));
            }
            Ok(())
        }
        Ok(match self {
            PrimitiveKind::I8 => {
                need(buf, 1)?;
                (PrimitiveValue::I8(buf[0] as i8), 1)
            },
            PrimitiveKind::U8 => {
                need(buf, 1)?;
                (PrimitiveValue::U8(buf[0]), 1)
            },
            PrimitiveKind::I16 => {
                need(buf, 2)?;
                (PrimitiveValue::I16(i16::from_be_bytes(buf[0..2].try_into().unwrap())), 2)
            },
            PrimitiveKind::U16 => {
                need(buf, 2)?;
                (PrimitiveValue::U16(u16::from_be_bytes(buf[0..2].try_into().unwrap())), 2)
            },
            PrimitiveKind::I32 => {
                need(buf, 4)?;
                (PrimitiveValue::I32(i32::from_be_bytes(buf[0..4].try_into().unwrap())), 4)
            },
            PrimitiveKind::U32 => {
                need(buf, 4)?;
                (PrimitiveValue::U32(u32::from_be_bytes(buf[0..4].try_into().unwrap())), 4)
            },
            PrimitiveKind::I64 => {
                need(buf, 8)?;
                (PrimitiveValue::I64(i64::from_be_bytes(buf[0..8].try_into().unwrap())), 8)
            },
            PrimitiveKind::U64 => {
                need(buf, 8)?;
                (PrimitiveValue::U64(u64::from_be_bytes(buf[0..8].try_into().unwrap())), 8)
            },
            PrimitiveKind::F32 => {
                need(buf, 4)?;
                (PrimitiveValue::F32(f32::from_be_bytes(buf[0..4].try_into().unwrap())), 4)
            },
            PrimitiveKind::F64 => {
                need(buf, 8)?;
                (PrimitiveValue::F64(f64::from_be_bytes(buf[0..8].try_into().unwrap())), 8)
            },
            PrimitiveKind::Bool(_) => {
                need(buf, 1)?;
                (PrimitiveValue::Bool(buf[0] != 0), 1)
            },
            PrimitiveKind::Str { .. } => {
                let (bytes, used) = decode_length_prefixed(buf)?;
                let s = String::from_utf8(bytes).map_err(|e| Error::parse("string", e.to_string()))?;
                (PrimitiveValue::Str(s), used)
            },
            PrimitiveKind::Binary { .. } => {
                let (bytes, used) = decode_length_prefixed(buf)?;
                (PrimitiveValue::Binary(bytes), used)
            },
            PrimitiveKind::Ip4 => {
                need(buf, 4)?;
                let mut o = [0u8; 4];
                o.copy_from_slice(&buf[0..4]);
                (PrimitiveValue::Ip4(Ipv4Addr::from(o)), 4)
            },
            PrimitiveKind::Ip6 => {
                need(buf, 16)?;
                let mut o = [0u8; 16];
                o.copy_from_slice(&buf[0..16]);
                (PrimitiveValue::Ip6(Ipv6Addr::from(o)), 16)
            },
            PrimitiveKind::Ether => {
                need(buf, 6)?;
                let mut o = [0u8; 6];
                o.copy_from_slice(&buf[0..6]);
                (PrimitiveValue::Ether(o), 6)
            },
            PrimitiveKind::Time => {
                need(buf, 8)?;
                (PrimitiveValue::Time(i64::from_be_bytes(buf[0..8].try_into().unwrap())), 8)
            },
            PrimitiveKind::Id(_) => {
                need(buf, 8)?;
                (PrimitiveValue::Id(i64::from_be_bytes(buf[0..8].try_into().unwrap())), 8)
            },
            PrimitiveKind::DnsName => {
                let (bytes, used) = decode_length_prefixed(buf)?;
                let name =
                    String::from_utf8(bytes).map_err(|e| Error::parse("dnsname", e.to_string()))?;
                (PrimitiveValue::DnsName { name, resolved_ips: Vec::new() }, used)
            },
        })
    }
}

fn encode_length_prefixed(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + data.len());
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
    out.push(0);
    out
}

fn decode_length_prefixed(buf: &[u8]) -> Result<(Vec<u8>, usize)> {
    if buf.len() < 4 {
        return Err(Error::parse("length-prefixed", "buffer too short for length"));
    }
    let len = u32::from_be_bytes(buf[0..4].try_into().unwrap()) as usize;
    if buf.len() < 4 + len + 1 {
        return Err(Error::parse("length-prefixed", "buffer too short for payload"));
    }
    Ok((buf[4..4 + len].to_vec(), 4 + len + 1))
}

fn parse_int<T>(s: &str) -> Result<T>
where T: TryFrom<i128> {
    let s = s.trim();
    let (neg, digits) = if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else {
        (false, s)
    };
    let magnitude: i128 = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i128::from_str_radix(hex, 16).map_err(|_| Error::parse("int", s))?
    } else {
        digits.parse().map_err(|_| Error::parse("int", s))?
    };
    let value = if neg { -magnitude } else { magnitude };
    T::try_from(value).map_err(|_| Error::Range(format!("{s} out of range")))
}

/// Mimics C's `%.16g`: up to `precision` significant digits, no trailing
/// zeros, switching to exponential notation for very large/small magnitudes.
pub fn format_g(v: f64, precision: usize) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    let exp = v.abs().log10().floor() as i32;
    let s = if !(-4..(precision as i32)).contains(&exp) {
        let formatted = format!("{v:.*e}", precision.saturating_sub(1));
        return trim_exponential(&formatted);
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        format!("{v:.decimals$}")
    };
    trim_trailing_zeros(&s)
}

fn trim_trailing_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    let trimmed = s.trim_end_matches('0');
    trimmed.trim_end_matches('.').to_string()
}

fn trim_exponential(s: &str) -> String {
    let (mantissa, exp) = s.split_once('e').unwrap_or((s, "0"));
    let mantissa = trim_trailing_zeros(mantissa);
    let exp_num: i32 = exp.parse().unwrap_or(0);
    format!("{mantissa}e{}{:02}", if exp_num >= 0 { "+" } else { "-" }, exp_num.abs())
}

fn parse_time(s: &str) -> Result<i64> {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix('@') {
        return rest.parse().map_err(|_| Error::parse("time", s));
    }
    if let Some(rest) = s.strip_prefix('+') {
        let delta: i64 = rest.parse().map_err(|_| Error::parse("time", s))?;
        return Ok(Utc::now().timestamp() + delta);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc).timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.with_timezone(&Utc).timestamp());
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        let local = Local
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| Error::parse("time", s))?;
        return Ok(local.with_timezone(&Utc).timestamp());
    }
    Err(Error::parse("time", s))
}

fn resolve_dns_name(name: &str) -> Result<Vec<IpAddr>> {
    if let Ok(ip) = name.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }
    let with_port = format!("{name}:0");
    let addrs = with_port
        .to_socket_addrs()
        .map_err(|e| Error::parse("dnsname", e.to_string()))?;
    Ok(addrs.map(|a| a.ip()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_hex_and_range() {
        let k = PrimitiveKind::U16;
        assert_eq!(k.binify("0xffff").unwrap(), PrimitiveValue::U16(0xFFFF));
        assert!(matches!(k.binify("65536"), Err(Error::Range(_))));
    }

    #[test]
    fn round_trip_encode_decode() {
        for v in [
            PrimitiveValue::U32(123456),
            PrimitiveValue::Str("hello".into()),
            PrimitiveValue::Binary(vec![1, 2, 3]),
        ] {
            let kind = match &v {
                PrimitiveValue::U32(_) => PrimitiveKind::U32,
                PrimitiveValue::Str(_) => PrimitiveKind::Str { max_len: None },
                PrimitiveValue::Binary(_) => {
                    PrimitiveKind::Binary { form: BinaryForm::Hex, max_len: None }
                },
                _ => unreachable!(),
            };
            let encoded = kind.encode(&v).unwrap();
            let (decoded, used) = kind.decode(&encoded).unwrap();
            assert_eq!(used, encoded.len());
            assert_eq!(decoded, v);
        }
    }

    #[test]
    fn bool_vocab_case_insensitive() {
        let k = PrimitiveKind::Bool(BoolVocabulary::YesNo);
        assert_eq!(k.binify("YES").unwrap(), PrimitiveValue::Bool(true));
        assert_eq!(k.binify("false").unwrap(), PrimitiveValue::Bool(false));
        assert_eq!(k.ascify(&PrimitiveValue::Bool(true)).unwrap(), "Yes");
    }

    #[test]
    fn ether_colonized_and_plain() {
        let k = PrimitiveKind::Ether;
        let a = k.binify("aa:bb:cc:dd:ee:ff").unwrap();
        let b = k.binify("aabbccddeeff").unwrap();
        assert_eq!(a, b);
        assert_eq!(k.ascify(&a).unwrap(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn ip6_ascify_is_rfc5952() {
        let k = PrimitiveKind::Ip6;
        let v = k.binify("2001:0db8:0000:0000:0000:0000:0000:0001").unwrap();
        assert_eq!(k.ascify(&v).unwrap(), "2001:db8::1");
    }
}
