// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

#![no_main]

use libfuzzer_sys::fuzz_target;

use bootfix_rs_core::system::{fs::decode_text, setup_log::parse_setup_log};

fuzz_target!(|data: &[u8]| {
    let _ = parse_setup_log(&decode_text(data));
});
