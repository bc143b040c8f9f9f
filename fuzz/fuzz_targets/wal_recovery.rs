#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 16 {
        return;
    }
    
    let _ = std::panic::catch_unwind(|| {
        // Simulate WAL frame parsing
        // This would test WAL recovery logic in a real implementation
    });
});
