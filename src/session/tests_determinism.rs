use proptest::prelude::*;

use super::*;
use crate::asm::Asm;
use crate::firmware::{sample_target, FirmwareImage};
use crate::memory::RAM_BASE;

fn scribbling_session() -> (Session, Snapshot) {
    // Writes its r0 across a RAM span, then halts. Enough state churn to
    // make restore bugs visible.
    let mut asm = Asm::new();
    asm.ldi(1, RAM_BASE);
    asm.ldi(2, 64);
    asm.ldi(3, 0);
    let loop_top = asm.here();
    asm.stb(1, 0);
    asm.addi(1, 1);
    asm.addi(3, 1);
    let t = asm.jlt(3, 2, 0);
    asm.patch(t, loop_top);
    asm.hlt();
    let image = FirmwareImage::from_bytes(asm.finish()).unwrap();
    let session = Session::new(&image, None);
    let snapshot = session.snapshot();
    (session, snapshot)
}

#[test]
fn restore_is_bit_exact() {
    let (mut session, snapshot) = scribbling_session();
    let before = session.state_digest();

    session.core.r[0] = 0xAB;
    assert_eq!(session.run(), StopReason::Halted);
    assert_ne!(session.state_digest(), before);

    session.restore(&snapshot);
    assert_eq!(session.state_digest(), before);
    assert_eq!(session.executed(), 0);
}

#[test]
fn iterations_are_stateless() {
    // The second iteration must not observe the first one's RAM writes.
    let (mut session, snapshot) = scribbling_session();

    session.core.r[0] = 0xFF;
    assert_eq!(session.run(), StopReason::Halted);
    assert_eq!(session.core.bus.read_byte(RAM_BASE), Some(0xFF));

    session.restore(&snapshot);
    assert_eq!(session.core.bus.read_byte(RAM_BASE), Some(0));
}

#[test]
fn restore_covers_the_disk_window() {
    let (image, _) = sample_target();
    let mut session = Session::new(&image, Some(&[1, 2, 3]));
    let snapshot = session.snapshot();

    assert!(session.core.bus.write_byte(crate::memory::DISK_BASE, 0x77));
    session.restore(&snapshot);
    assert_eq!(session.core.bus.read_byte(crate::memory::DISK_BASE), Some(1));
}

#[test]
fn snapshot_survives_serde() {
    let (mut session, snapshot) = scribbling_session();
    let json = serde_json::to_string(&snapshot).unwrap();
    let back: Snapshot = serde_json::from_str(&json).unwrap();

    session.core.r[0] = 9;
    let _ = session.run();
    let digest_restored = {
        session.restore(&snapshot);
        session.state_digest()
    };
    session.core.r[0] = 9;
    let _ = session.run();
    session.restore(&back);
    assert_eq!(session.state_digest(), digest_restored);
}

proptest! {
    // Replaying the same register seed from a fresh restore reaches the
    // same stop and the same guest state, every time.
    #[test]
    fn prop_replay_is_deterministic(seed in any::<u32>()) {
        let (mut session, snapshot) = scribbling_session();

        session.restore(&snapshot);
        session.core.r[0] = seed;
        let stop_a = session.run();
        let digest_a = session.state_digest();

        session.restore(&snapshot);
        session.core.r[0] = seed;
        let stop_b = session.run();
        let digest_b = session.state_digest();

        prop_assert_eq!(stop_a, stop_b);
        prop_assert_eq!(digest_a, digest_b);
    }

    // restore() is idempotent for any number of repetitions.
    #[test]
    fn prop_restore_idempotent(repeats in 1..20usize) {
        let (mut session, snapshot) = scribbling_session();
        let reference = session.state_digest();

        let _ = session.run();
        for _ in 0..repeats {
            session.restore(&snapshot);
            prop_assert_eq!(session.state_digest(), reference);
        }
    }
}
