// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

#![no_main]

use libfuzzer_sys::fuzz_target;

use bootfix_rs_core::discovery::Survey;

fuzz_target!(|data: &[u8]| {
    let _ = Survey::from_snapshot(data);
});
