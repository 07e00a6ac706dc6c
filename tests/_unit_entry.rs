// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Placeholder entry point for the `unit` test binary. Every unit test
//! in this crate lives next to the code it tests, in a `#[cfg(test)]
//! mod tests` block run by `cargo test --lib`; this binary exists only
//! to keep the `[[test]] name = "unit"` entry in `Cargo.toml` valid.

#[test]
fn unit_tests_live_alongside_their_modules() {}
