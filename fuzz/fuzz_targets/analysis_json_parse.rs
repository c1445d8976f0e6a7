//! Fuzz target for analyze response parsing.
//!
//! This fuzzer feeds arbitrary byte sequences to the response parser,
//! checking for panics, crashes, or hangs.

#![no_main]

use libfuzzer_sys::fuzz_target;
use smearscope::model::AnalysisResult;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = AnalysisResult::from_slice(data);
});
