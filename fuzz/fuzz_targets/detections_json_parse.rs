//! Fuzz target for detection list parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use smearscope::annotate::parse_detections;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = parse_detections(data);
});
