// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Dotted-name resolution and the array/union mutation operations that
//! are expressed in terms of it: `structure.field.subfield`, `array.3`,
//! `union.chosen_variant`, and the special `"length"` name on arrays.

use crate::{
    error::{Error, Result},
    structs::{
        schema::Schema,
        value::{UnionValue, Value},
    },
};

/// Split `"a.b.3.c"` into its dot-separated components.
fn components(name: &str) -> Vec<&str> {
    if name.is_empty() { Vec::new() } else { name.split('.').collect() }
}

/// Resolve `name` against `(schema, value)`, transparently descending
/// through pointers. Returns the schema/value pair the name designates.
pub fn find<'v>(schema: &'v Schema, value: &'v Value, name: &str) -> Result<(&'v Schema, &'v Value)> {
    find_parts(schema, value, &components(name))
}

fn find_parts<'v>(
    schema: &'v Schema,
    value: &'v Value,
    parts: &[&str],
) -> Result<(&'v Schema, &'v Value)> {
    let (schema, value) = deref_pointer(schema, value)?;
    let Some((head, rest)) = parts.split_first() else {
        return Ok((schema, value));
    };
    match (schema, value) {
        (Schema::Structure(fields), Value::Structure(values)) => {
            let f = fields.iter().find(|f| f.name == *head).ok_or_else(|| Error::not_found(*head))?;
            let v = values
                .iter()
                .find(|(n, _)| n == head)
                .map(|(_, v)| v)
                .ok_or_else(|| Error::not_found(*head))?;
            find_parts(f.schema, v, rest)
        },
        (Schema::Array(elem), Value::Array(values)) | (Schema::FixedArray(elem, _), Value::FixedArray(values)) => {
            if *head == "length" {
                if !rest.is_empty() {
                    return Err(Error::invalid("\"length\" is a leaf name"));
                }
                return Err(Error::invalid(
                    "\"length\" yields a synthesized primitive; use array_length() instead",
                ));
            }
            let idx: usize = head.parse().map_err(|_| Error::not_found(*head))?;
            let v = values.get(idx).ok_or_else(|| Error::Range(format!("index {idx} out of bounds")))?;
            find_parts(elem, v, rest)
        },
        (Schema::Union(fields), Value::Union(u)) => {
            if *head != u.chosen {
                return Err(Error::invalid(format!(
                    "union field '{head}' is not the active variant ('{}' is)",
                    u.chosen
                )));
            }
            let f = fields.iter().find(|f| f.name == *head).ok_or_else(|| Error::not_found(*head))?;
            find_parts(f.schema, &u.inner, rest)
        },
        _ => Err(Error::invalid(format!("cannot resolve '{head}' against a {}", schema.class_name()))),
    }
}

fn deref_pointer<'v>(schema: &'v Schema, value: &'v Value) -> Result<(&'v Schema, &'v Value)> {
    match (schema, value) {
        (Schema::Pointer(inner), Value::Pointer(Some(v))) => deref_pointer(inner, v),
        (Schema::Pointer(_), Value::Pointer(None)) => {
            Err(Error::not_found("dereferencing a null pointer"))
        },
        _ => Ok((schema, value)),
    }
}

/// The synthesized `"length"` pseudo-field on an array/fixed array.
pub fn array_length(value: &Value) -> Result<u32> {
    match value {
        Value::Array(v) | Value::FixedArray(v) => Ok(v.len() as u32),
        _ => Err(Error::invalid("\"length\" only applies to arrays")),
    }
}

/// Shift the tail right and insert a fresh `init`'d element at `idx`.
pub fn insert(elem_schema: &Schema, array: &mut Vec<Value>, idx: usize) -> Result<()> {
    if idx > array.len() {
        return Err(Error::Range(format!("insert index {idx} out of bounds")));
    }
    array.insert(idx, Value::init(elem_schema));
    Ok(())
}

/// Shift the tail left, dropping the element at `idx`.
pub fn delete(array: &mut Vec<Value>, idx: usize) -> Result<()> {
    if idx >= array.len() {
        return Err(Error::Range(format!("delete index {idx} out of bounds")));
    }
    array.remove(idx);
    Ok(())
}

/// Truncate (dropping removed elements) or extend (appending fresh
/// `init`'d elements) an array to exactly `n` elements.
pub fn setsize(elem_schema: &Schema, array: &mut Vec<Value>, n: usize) {
    if n < array.len() {
        array.truncate(n);
    } else {
        array.extend((array.len()..n).map(|_| Value::init(elem_schema)));
    }
}

/// Switch a union's active field. A no-op if already on `field_name`;
/// otherwise frees the old field's value and `init`s the new one.
pub fn union_set_field(fields: &'static [crate::structs::schema::UnionField], u: &mut UnionValue, field_name: &'static str) -> Result<()> {
    if u.chosen == field_name {
        return Ok(());
    }
    let f = fields
        .iter()
        .find(|f| f.name == field_name)
        .ok_or_else(|| Error::not_found(field_name))?;
    u.chosen = field_name;
    u.inner = Value::init(f.schema);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::{
        primitive::{PrimitiveKind, PrimitiveValue},
        schema::{Field, UnionField},
    };

    #[test]
    fn dotted_name_resolution() {
        static INNER: Schema = Schema::Primitive(PrimitiveKind::U32);
        static FIELDS: &[Field] = &[Field { name: "port", schema: &INNER }];
        static OUTER: Schema = Schema::Structure(FIELDS);

        let v = Value::init(&OUTER);
        let (s, found) = find(&OUTER, &v, "port").unwrap();
        assert!(matches!(s, Schema::Primitive(PrimitiveKind::U32)));
        assert_eq!(*found, Value::Primitive(PrimitiveValue::U32(0)));
    }

    #[test]
    fn array_insert_delete_setsize() {
        static ELEM: Schema = Schema::Primitive(PrimitiveKind::U8);
        let mut arr = vec![Value::Primitive(PrimitiveValue::U8(1)), Value::Primitive(PrimitiveValue::U8(2))];
        insert(&ELEM, &mut arr, 1).unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr[1], Value::Primitive(PrimitiveValue::U8(0)));
        delete(&mut arr, 1).unwrap();
        assert_eq!(arr.len(), 2);
        setsize(&ELEM, &mut arr, 4);
        assert_eq!(arr.len(), 4);
        setsize(&ELEM, &mut arr, 1);
        assert_eq!(arr.len(), 1);
    }

    #[test]
    fn union_set_field_is_noop_when_unchanged() {
        static A: Schema = Schema::Primitive(PrimitiveKind::U8);
        static B: Schema = Schema::Primitive(PrimitiveKind::Str { max_len: None });
        static FIELDS: &[UnionField] =
            &[UnionField { name: "a", schema: &A }, UnionField { name: "b", schema: &B }];

        let mut u = UnionValue { chosen: "a", inner: Value::Primitive(PrimitiveValue::U8(7)) };
        union_set_field(FIELDS, &mut u, "a").unwrap();
        assert_eq!(u.inner, Value::Primitive(PrimitiveValue::U8(7)));

        union_set_field(FIELDS, &mut u, "b").unwrap();
        assert_eq!(u.chosen, "b");
        assert_eq!(u.inner, Value::Primitive(PrimitiveValue::Str(String::new())));
    }

    #[test]
    fn union_reading_wrong_field_fails() {
        static A: Schema = Schema::Primitive(PrimitiveKind::U8);
        static FIELDS: &[UnionField] = &[UnionField { name: "a", schema: &A }];
        static UNION: Schema = Schema::Union(FIELDS);
        let v = Value::Union(Box::new(UnionValue { chosen: "a", inner: Value::Primitive(PrimitiveValue::U8(0)) }));
        assert!(find(&UNION, &v, "other").is_err());
    }
}
