//! Fuzz target: `QrAssembler::push`
//!
//! Streams arbitrary scanner bytes into the assembler and checks that it
//! never panics, never buffers past its limit, only emits requests with
//! both ids present, and is empty after every terminator.
//!
//! cargo fuzz run fuzz_qr_assembler

#![no_main]

use gymgate::config::SystemConfig;
use gymgate::scanner::QrAssembler;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let config = SystemConfig::default();
    let mut asm = QrAssembler::new(&config);

    for (i, &b) in data.iter().enumerate() {
        if let Some(req) = asm.push(b, i as u64) {
            assert!(!req.owner_id.is_empty() && !req.member_id.is_empty());
            assert!(!req.owner_id.contains(':') && !req.member_id.contains(':'));
        }
        assert!(asm.len() <= usize::from(config.qr_max_len) + 1);
        if b == config.qr_terminator {
            assert!(asm.is_empty(), "buffer survived a terminator");
        }
    }

    asm.expire_stale(u64::MAX);
    assert!(asm.is_empty());
});
