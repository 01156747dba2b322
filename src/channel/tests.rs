use super::*;
use crate::asm::Asm;
use crate::firmware::{sample_target, FirmwareImage};
use crate::memory::RAM_BASE;
use crate::oracle::{classify, Verdict};
use crate::session::Session;

fn fresh_sample(kind: ChannelKind) -> (Session, Box<dyn InputChannel>) {
    let (image, layout) = sample_target();
    let session = Session::new(&image, None);
    (session, build(kind, layout))
}

fn verdict_for(kind: ChannelKind, input: &[u8]) -> Verdict {
    let (mut session, channel) = fresh_sample(kind);
    match channel.deliver(&mut session, input) {
        Ok(()) => classify(&session.run()),
        Err(DeliveryError::GuestFault(fault)) => {
            classify(&crate::session::StopReason::Fault(fault))
        }
        Err(_) => Verdict::Timeout,
    }
}

#[test]
fn all_channels_deliver_the_crash_input() {
    for kind in [
        ChannelKind::DirectCall,
        ChannelKind::BreakpointTrap,
        ChannelKind::SyncExit,
    ] {
        assert_eq!(verdict_for(kind, b"abcd"), Verdict::Objective, "{:?}", kind);
    }
}

#[test]
fn all_channels_deliver_benign_input() {
    for kind in [
        ChannelKind::DirectCall,
        ChannelKind::BreakpointTrap,
        ChannelKind::SyncExit,
    ] {
        assert_eq!(verdict_for(kind, b"abcX"), Verdict::Continue, "{:?}", kind);
    }
}

#[test]
fn all_channels_deliver_the_word_crash_input() {
    // First little-endian word 0xaabbccdd with at least 8 bytes total.
    let input = [0xdd, 0xcc, 0xbb, 0xaa, 0, 0, 0, 0];
    for kind in [
        ChannelKind::DirectCall,
        ChannelKind::BreakpointTrap,
        ChannelKind::SyncExit,
    ] {
        assert_eq!(verdict_for(kind, &input), Verdict::Objective, "{:?}", kind);
    }
}

#[test]
fn word_crash_value_needs_eight_bytes() {
    // Matching first word, but too short for the word predicate.
    let input = [0xdd, 0xcc, 0xbb, 0xaa];
    for kind in [
        ChannelKind::DirectCall,
        ChannelKind::BreakpointTrap,
        ChannelKind::SyncExit,
    ] {
        assert_eq!(verdict_for(kind, &input), Verdict::Continue, "{:?}", kind);
    }
}

#[test]
fn zero_length_input_is_safe_on_every_channel() {
    for kind in [
        ChannelKind::DirectCall,
        ChannelKind::BreakpointTrap,
        ChannelKind::SyncExit,
    ] {
        assert_eq!(verdict_for(kind, &[]), Verdict::Continue, "{:?}", kind);
    }
}

#[test]
fn oversize_input_is_clamped_not_corrupting() {
    // Twice the buffer capacity; the prefix still matches the predicate.
    let mut oversize = vec![b'x'; 2048];
    oversize[..4].copy_from_slice(b"abcd");
    for kind in [
        ChannelKind::DirectCall,
        ChannelKind::BreakpointTrap,
        ChannelKind::SyncExit,
    ] {
        assert_eq!(verdict_for(kind, &oversize), Verdict::Objective, "{:?}", kind);
    }
}

#[test]
fn direct_call_stages_registers_and_stack() {
    let (mut session, channel) = fresh_sample(ChannelKind::DirectCall);
    let (_, layout) = sample_target();

    channel.deliver(&mut session, b"hi").unwrap();
    assert_eq!(session.core.pc, layout.entry);
    assert_eq!(session.core.r[0], layout.input_addr);
    assert_eq!(session.core.r[1], 2);
    assert_eq!(
        session.core.bus.read_bytes(layout.input_addr, 2).unwrap(),
        b"hi"
    );
}

#[test]
fn breakpoint_trap_injects_at_the_entry() {
    let (mut session, channel) = fresh_sample(ChannelKind::BreakpointTrap);
    let (_, layout) = sample_target();

    channel.deliver(&mut session, b"hello").unwrap();
    assert_eq!(session.core.pc, layout.entry);
    assert_eq!(session.core.r[1], 5);
    assert_eq!(
        session.core.bus.read_bytes(layout.input_addr, 5).unwrap(),
        b"hello"
    );
}

#[test]
fn sync_exit_writes_where_the_guest_asked() {
    let (mut session, channel) = fresh_sample(ChannelKind::SyncExit);

    channel.deliver(&mut session, b"ping").unwrap();
    // The sample target requests input into its RAM buffer.
    assert_eq!(session.core.r[0], RAM_BASE);
    assert_eq!(session.core.r[1], 4);
    assert_eq!(session.core.bus.read_bytes(RAM_BASE, 4).unwrap(), b"ping");
}

#[test]
fn sync_exit_respects_guest_capacity() {
    // A guest that asks for at most 2 bytes gets at most 2 bytes.
    let mut asm = Asm::new();
    asm.ldi(0, RAM_BASE);
    asm.ldi(1, 2);
    asm.syc();
    asm.hlt();
    let image = FirmwareImage::from_bytes(asm.finish()).unwrap();
    let mut session = Session::new(&image, None);
    let channel = SyncExit;

    channel.deliver(&mut session, b"toolong").unwrap();
    assert_eq!(session.core.r[1], 2);
    assert_eq!(session.core.bus.read_bytes(RAM_BASE, 3).unwrap(), b"to\0");
}

#[test]
fn sync_exit_rejects_unwritable_destination() {
    // Guest asks for input into ROM.
    let mut asm = Asm::new();
    asm.ldi(0, 0x100);
    asm.ldi(1, 16);
    asm.syc();
    asm.hlt();
    let image = FirmwareImage::from_bytes(asm.finish()).unwrap();
    let mut session = Session::new(&image, None);

    let err = SyncExit.deliver(&mut session, b"data").unwrap_err();
    assert_eq!(err, DeliveryError::WriteFailed { addr: 0x100 });
}

#[test]
fn trap_channels_time_out_when_the_guest_never_cooperates() {
    // Firmware that spins without ever reaching an entry or a SYC.
    let mut asm = Asm::new();
    asm.jmp(0);
    let image = FirmwareImage::from_bytes(asm.finish()).unwrap();
    let (_, layout) = sample_target();

    for kind in [ChannelKind::BreakpointTrap, ChannelKind::SyncExit] {
        let mut session = Session::new(&image, None);
        session.set_budget(500);
        let err = build(kind, layout).deliver(&mut session, b"x").unwrap_err();
        assert_eq!(err, DeliveryError::BudgetExhausted, "{:?}", kind);
    }
}

#[test]
fn trap_channels_surface_startup_faults() {
    let mut asm = Asm::new();
    asm.brk();
    let image = FirmwareImage::from_bytes(asm.finish()).unwrap();
    let (_, layout) = sample_target();

    let mut session = Session::new(&image, None);
    let err = build(ChannelKind::BreakpointTrap, layout)
        .deliver(&mut session, b"x")
        .unwrap_err();
    assert!(matches!(err, DeliveryError::GuestFault(_)));
}

#[test]
fn breakpoint_trap_reports_unexpected_halt() {
    let mut asm = Asm::new();
    asm.hlt();
    let image = FirmwareImage::from_bytes(asm.finish()).unwrap();
    let (_, layout) = sample_target();

    let mut session = Session::new(&image, None);
    let err = build(ChannelKind::BreakpointTrap, layout)
        .deliver(&mut session, b"x")
        .unwrap_err();
    assert!(matches!(err, DeliveryError::UnexpectedStop(_)));
}
