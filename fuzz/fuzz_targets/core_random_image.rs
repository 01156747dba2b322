#![no_main]

//! Feeds arbitrary bytes to the guest core as a firmware image and steps
//! it. Whatever the image decodes to, the host must stay healthy: no
//! panics, faults only as values, ROM immutable, and the session budget
//! always honored.

use libfuzzer_sys::fuzz_target;

use cinder::firmware::FirmwareImage;
use cinder::{Session, StopReason};

fuzz_target!(|data: &[u8]| {
    let image = match FirmwareImage::from_bytes(data.to_vec()) {
        Ok(image) => image,
        Err(_) => return, // empty or oversize, correctly refused
    };

    let mut session = Session::new(&image, None);
    session.set_budget(10_000);

    let stop = session.run();
    match stop {
        StopReason::BudgetExhausted => assert_eq!(session.executed(), 10_000),
        StopReason::Breakpoint(_) => panic!("no breakpoints were installed"),
        // A random image may well jump to the return sentinel on its own;
        // that's still a clean stop.
        _ => assert!(session.executed() <= 10_000),
    }

    // ROM must come through any guest behavior untouched.
    let rom = session.core.bus.read_bytes(0, data.len().min(16)).unwrap();
    assert_eq!(&rom[..], &data[..data.len().min(16)]);
});
