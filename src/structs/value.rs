// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Reflective values: `Value` mirrors a [`Schema`] tree and carries the
//! actual data. Deep init/copy/equal/free and the binary codec all walk
//! `(schema, value)` pairs together.

use crate::{
    error::{Error, Result},
    structs::{
        primitive::PrimitiveValue,
        schema::Schema,
    },
};

/// A tagged union value: `{ chosen_field_name, owned value of that field's
/// declared type }`. The invariant that `inner`'s dynamic shape matches
/// the declared type of `chosen` is maintained by [`Value::union_set_field`]
/// — there is no other way to construct one outside this module.
#[derive(Clone, Debug, PartialEq)]
pub struct UnionValue {
    pub chosen: &'static str,
    pub inner: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Primitive(PrimitiveValue),
    /// Fields in schema declaration order — declaration order is the
    /// canonical encode/XML-render order throughout the crate.
    Structure(Vec<(&'static str, Value)>),
    Array(Vec<Value>),
    FixedArray(Vec<Value>),
    Union(Box<UnionValue>),
    Pointer(Option<Box<Value>>),
}

impl Value {
    /// Deep, recursively-initialized default value for `schema`. Always
    /// succeeds for the schema shapes this crate can express (no
    /// allocation-failure path exists in safe Rust).
    pub fn init(schema: &Schema) -> Value {
        match schema {
            Schema::Primitive(kind) => Value::Primitive(kind.init()),
            Schema::Structure(fields) => {
                Value::Structure(fields.iter().map(|f| (f.name, Value::init(f.schema))).collect())
            },
            Schema::Array(_) => Value::Array(Vec::new()),
            Schema::FixedArray(elem, n) => {
                Value::FixedArray((0..*n).map(|_| Value::init(elem)).collect())
            },
            Schema::Union(fields) => {
                let first = fields.first().expect("union type must declare at least one field");
                Value::Union(Box::new(UnionValue {
                    chosen: first.name,
                    inner: Value::init(first.schema),
                }))
            },
            Schema::Pointer(inner) => Value::Pointer(Some(Box::new(Value::init(inner)))),
        }
    }

    /// Deep copy. Rust ownership already gives us this via `Clone`; kept
    /// as a named operation to mirror the six-operation contract in the
    /// type descriptor, and because callers reason about it as a
    /// deliberate structural-copy step (e.g. app-config snapshotting).
    pub fn deep_copy(&self) -> Value {
        self.clone()
    }

    /// Deep structural equality, matching `schema`.
    pub fn structural_equal(&self, other: &Value, schema: &Schema) -> bool {
        match (schema, self, other) {
            (Schema::Primitive(kind), Value::Primitive(a), Value::Primitive(b)) => {
                kind.equal(a, b)
            },
            (Schema::Structure(fields), Value::Structure(a), Value::Structure(b)) => {
                fields.iter().all(|f| {
                    let av = a.iter().find(|(n, _)| *n == f.name).map(|(_, v)| v);
                    let bv = b.iter().find(|(n, _)| *n == f.name).map(|(_, v)| v);
                    matches!((av, bv), (Some(av), Some(bv)) if av.structural_equal(bv, f.schema))
                })
            },
            (Schema::Array(elem), Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structural_equal(y, elem))
            },
            (Schema::FixedArray(elem, _), Value::FixedArray(a), Value::FixedArray(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structural_equal(y, elem))
            },
            (Schema::Union(fields), Value::Union(a), Value::Union(b)) => {
                if a.chosen != b.chosen {
                    return false;
                }
                let Some(f) = fields.iter().find(|f| f.name == a.chosen) else {
                    return false;
                };
                a.inner.structural_equal(&b.inner, f.schema)
            },
            (Schema::Pointer(inner), Value::Pointer(a), Value::Pointer(b)) => match (a, b) {
                (Some(a), Some(b)) => a.structural_equal(b, inner),
                (None, None) => true,
                _ => false,
            },
            _ => false,
        }
    }

    /// Idempotent free: resets a pointer slot to `None`. Composite/array
    /// contents are dropped normally by Rust; this exists so pointer
    /// handles behave like the C API's nullable, re-freeable slots.
    pub fn free_pointer(&mut self) {
        if let Value::Pointer(slot) = self {
            *slot = None;
        }
    }

    pub fn as_primitive(&self) -> Result<&PrimitiveValue> {
        match self {
            Value::Primitive(p) => Ok(p),
            _ => Err(Error::invalid("value is not a primitive")),
        }
    }

    pub fn ascify(&self, schema: &Schema) -> Result<String> {
        match (schema, self) {
            (Schema::Primitive(kind), Value::Primitive(v)) => kind.ascify(v),
            _ => Err(Error::invalid("ascify only applies to primitive values")),
        }
    }

    pub fn binify(schema: &Schema, s: &str) -> Result<Value> {
        match schema {
            Schema::Primitive(kind) => Ok(Value::Primitive(kind.binify(s)?)),
            _ => Err(Error::invalid("binify only applies to primitive values")),
        }
    }

    /// Encode per §4.B: primitives use their own encoding; strings/binary
    /// length-prefix; arrays as `u32 length || element×n`; structs as
    /// field concatenation in declaration order; unions as
    /// `encoded_name || encoded_field`.
    pub fn encode(&self, schema: &Schema) -> Result<Vec<u8>> {
        match (schema, self) {
            (Schema::Primitive(kind), Value::Primitive(v)) => kind.encode(v),
            (Schema::Structure(fields), Value::Structure(values)) => {
                let mut out = Vec::new();
                for f in *fields {
                    let v = values
                        .iter()
                        .find(|(n, _)| *n == f.name)
                        .map(|(_, v)| v)
                        .ok_or_else(|| Error::not_found(f.name))?;
                    out.extend(v.encode(f.schema)?);
                }
                Ok(out)
            },
            (Schema::Array(elem), Value::Array(values))
            | (Schema::FixedArray(elem, _), Value::FixedArray(values)) => {
                let mut out = (values.len() as u32).to_be_bytes().to_vec();
                for v in values {
                    out.extend(v.encode(elem)?);
                }
                Ok(out)
            },
            (Schema::Union(fields), Value::Union(u)) => {
                let f = fields
                    .iter()
                    .find(|f| f.name == u.chosen)
                    .ok_or_else(|| Error::not_found(u.chosen))?;
                let name_kind = crate::structs::primitive::PrimitiveKind::Str { max_len: None };
                let mut out = name_kind
                    .encode(&crate::structs::primitive::PrimitiveValue::Str(u.chosen.to_string()))?;
                out.extend(u.inner.encode(f.schema)?);
                Ok(out)
            },
            (Schema::Pointer(inner), Value::Pointer(slot)) => match slot {
                Some(v) => {
                    let mut out = vec![1u8];
                    out.extend(v.encode(inner)?);
                    Ok(out)
                },
                None => Ok(vec![0u8]),
            },
            _ => Err(Error::invalid("encode: schema/value mismatch")),
        }
    }

    /// Decode the inverse of [`Value::encode`]; returns the value and the
    /// number of bytes consumed so callers can chain decodes (structures).
    pub fn decode(schema: &Schema, buf: &[u8]) -> Result<(Value, usize)> {
        match schema {
            Schema::Primitive(kind) => {
                let (v, used) = kind.decode(buf)?;
                Ok((Value::Primitive(v), used))
            },
            Schema::Structure(fields) => {
                let mut offset = 0;
                let mut out = Vec::with_capacity(fields.len());
                for f in *fields {
                    let (v, used) = Value::decode(f.schema, &buf[offset..])?;
                    offset += used;
                    out.push((f.name, v));
                }
                Ok((Value::Structure(out), offset))
            },
            Schema::Array(elem) | Schema::FixedArray(elem, _) => {
                if buf.len() < 4 {
                    return Err(Error::parse("array", "buffer too short for length"));
                }
                let len = u32::from_be_bytes(buf[0..4].try_into().unwrap()) as usize;
                let mut offset = 4;
                let mut out = Vec::with_capacity(len);
                for _ in 0..len {
                    let (v, used) = Value::decode(elem, &buf[offset..])?;
                    offset += used;
                    out.push(v);
                }
                let value = if matches!(schema, Schema::Array(_)) {
                    Value::Array(out)
                } else {
                    Value::FixedArray(out)
                };
                Ok((value, offset))
            },
            Schema::Union(fields) => {
                let name_kind = crate::structs::primitive::PrimitiveKind::Str { max_len: None };
                let (name_bytes, used) = name_kind.decode(buf)?;
                let crate::structs::primitive::PrimitiveValue::Str(name) = name_bytes else {
                    unreachable!("Str kind always decodes to PrimitiveValue::Str")
                };
                let f = fields
                    .iter()
                    .find(|f| f.name == name)
                    .ok_or_else(|| Error::not_found(name.clone()))?;
                let (inner, used2) = Value::decode(f.schema, &buf[used..])?;
                Ok((
                    Value::Union(Box::new(UnionValue { chosen: f.name, inner })),
                    used + used2,
                ))
            },
            Schema::Pointer(inner) => {
                if buf.is_empty() {
                    return Err(Error::parse("pointer", "buffer too short for tag"));
                }
                if buf[0] == 0 {
                    Ok((Value::Pointer(None), 1))
                } else {
                    let (v, used) = Value::decode(inner, &buf[1..])?;
                    Ok((Value::Pointer(Some(Box::new(v))), 1 + used))
                }
            },
        }
    }
}
