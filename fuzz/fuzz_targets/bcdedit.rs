// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

#![no_main]

use libfuzzer_sys::fuzz_target;

use bootfix_rs_core::system::{bcdedit::parse_entry, fs::decode_text};

fuzz_target!(|data: &[u8]| {
    let _ = parse_entry(&decode_text(data));
});
