#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    
    let _ = std::panic::catch_unwind(|| {
        // Simulate BTree operation fuzzing
        // This would test BTree insert/search logic in a real implementation
    });
});
