// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Structural codecs: XML (`structs_xml`) and XML-RPC (`structs_xmlrpc`).

pub mod xml;
pub mod xmlrpc;
