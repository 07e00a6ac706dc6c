// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Type descriptors: the reflective schema that drives every `Value`.
//!
//! A [`Schema`] node only ever describes *shape*; [`super::value::Value`]
//! holds the data. This split is what lets `find`, `insert`, `setsize`,
//! and the XML/XML-RPC codecs walk a value generically without any
//! per-concrete-type code.

use crate::structs::primitive::PrimitiveKind;

/// One field of a `Structure` schema node.
#[derive(Clone, Debug)]
pub struct Field {
    pub name: &'static str,
    pub schema: &'static Schema,
}

/// One member of a `Union` schema node.
#[derive(Clone, Debug)]
pub struct UnionField {
    pub name: &'static str,
    pub schema: &'static Schema,
}

/// The five classes from §3.1 plus `Pointer`, expressed as a schema tree.
#[derive(Clone, Debug)]
pub enum Schema {
    Primitive(PrimitiveKind),
    Structure(&'static [Field]),
    Array(&'static Schema),
    FixedArray(&'static Schema, usize),
    Union(&'static [UnionField]),
    Pointer(&'static Schema),
}

impl Schema {
    pub fn class_name(&self) -> &'static str {
        match self {
            Schema::Primitive(_) => "primitive",
            Schema::Structure(_) => "structure",
            Schema::Array(_) => "array",
            Schema::FixedArray(_, _) => "fixedarray",
            Schema::Union(_) => "union",
            Schema::Pointer(_) => "pointer",
        }
    }

    /// Reported size in bytes, matching the C API's notion of "bytes
    /// occupied by an in-memory instance" — informational only.
    pub fn size(&self) -> usize {
        match self {
            Schema::Primitive(p) => p.size(),
            Schema::Structure(fields) => fields.iter().map(|f| f.schema.size()).sum(),
            Schema::Array(_) => std::mem::size_of::<usize>() * 2,
            Schema::FixedArray(elem, n) => elem.size() * n,
            Schema::Union(_) => std::mem::size_of::<usize>() * 2,
            Schema::Pointer(_) => std::mem::size_of::<usize>(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&'static Field> {
        match self {
            Schema::Structure(fields) => fields.iter().find(|f| f.name == name),
            _ => None,
        }
    }

    pub fn union_field(&self, name: &str) -> Option<&'static UnionField> {
        match self {
            Schema::Union(fields) => fields.iter().find(|f| f.name == name),
            _ => None,
        }
    }
}
