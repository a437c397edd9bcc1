#![no_main]

use libfuzzer_sys::fuzz_target;
use zoneline::utils::cipher::CipherFamily;
use zoneline::utils::compression::{inflate, SPAWN_MAX_INFLATED};
use zoneline::utils::transform::reverse;

fuzz_target!(|data: &[u8]| {
    // Reversal falls back instead of failing, and respects inflate limits
    for family in [CipherFamily::Profile, CipherFamily::Spawn] {
        let _ = reverse(family, data);
    }

    if let Ok(out) = inflate(data, SPAWN_MAX_INFLATED) {
        assert!(!out.is_empty() && out.len() <= SPAWN_MAX_INFLATED);
    }
});
