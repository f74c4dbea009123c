// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

#![no_main]

use libfuzzer_sys::fuzz_target;

use bootfix_rs_core::config::DoctorConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = str::from_utf8(data) {
        let _ = DoctorConfig::parse(content);
    }
});
