// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

#![no_main]

use libfuzzer_sys::fuzz_target;

use bootfix_rs_core::system::{fs::decode_text, partitions::parse_partition_table};

fuzz_target!(|data: &[u8]| {
    let _ = parse_partition_table(&decode_text(data));
});
