//! Fuzz target for the raw-bytes evaluator entry point.
//!
//! Looks for panics on arbitrary stdin payloads and checks that any decoded
//! request agrees with a plain substring search on its candidate path.

#![no_main]

use libfuzzer_sys::fuzz_target;

use env_read_guard::{HookInput, Verdict, evaluate};

fuzz_target!(|data: &[u8]| {
    let Ok(evaluation) = evaluate(data) else {
        return;
    };

    let input = HookInput::from_slice(data).expect("evaluate accepted the same bytes");
    let candidate = input.candidate_path();
    assert_eq!(evaluation.path, candidate.path);

    let expected = if candidate.path.contains(".env") {
        Verdict::Deny
    } else {
        Verdict::Allow
    };
    assert_eq!(evaluation.verdict, expected);
});
