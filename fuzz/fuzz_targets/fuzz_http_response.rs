//! Fuzz target: backend response path
//!
//! Feeds arbitrary bytes to the HTTP/1.1 response parser, at every prefix
//! length and with and without EOF, then hands any parsed response to the
//! verdict decoder.  Neither may panic.
//!
//! cargo fuzz run fuzz_http_response

#![no_main]

use gymgate::backend::http::{ParseStatus, parse_response};
use gymgate::backend::wire::decode_verdict;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for cut in [data.len() / 2, data.len()] {
        let prefix = &data[..cut];
        for eof in [false, true] {
            if let Ok(ParseStatus::Done(resp)) = parse_response(prefix, eof) {
                assert!(resp.body.len() <= prefix.len());
                let _ = decode_verdict(resp.status, &resp.body);
            }
        }
    }
});
