// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Reflective structural types: the type-descriptor/value model that
//! the rest of the crate (config engine, XML/XML-RPC codecs, protocol
//! framing) is built on top of.

pub mod path;
pub mod primitive;
pub mod schema;
pub mod value;

pub use path::{array_length, delete, find, insert, setsize, union_set_field};
pub use primitive::{BinaryForm, BoolVocabulary, IdTable, PrimitiveKind, PrimitiveValue};
pub use schema::{Field, Schema, UnionField};
pub use value::{UnionValue, Value};
