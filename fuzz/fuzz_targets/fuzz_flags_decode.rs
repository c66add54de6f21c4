//! Fuzzes flag word decoding for both shipped layouts.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_flags_decode
#![no_main]
use cluster_frame::FlagLayout;
use cluster_frame::flags::FUEL_MAX_PCT;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|flags: u16| {
    for layout in [FlagLayout::REFERENCE, FlagLayout::COMPACT] {
        let decoded = layout.decode(flags);
        assert!(decoded.fuel_pct <= FUEL_MAX_PCT);
        for indicator in decoded.active.iter() {
            assert!(layout.carried().contains(indicator));
        }
    }
});
