use super::*;
use crate::asm::Asm;
use crate::memory::Bus;

fn core_with(program: impl FnOnce(&mut Asm)) -> Cpu {
    let mut asm = Asm::new();
    program(&mut asm);
    let mut bus = Bus::new();
    bus.load_rom(&asm.finish());
    Cpu::new(bus)
}

#[test]
fn brk_is_an_abort_fault() {
    let mut core = core_with(|asm| asm.brk());
    assert_eq!(core.step(), Step::Fault(Fault::Abort { pc: 0 }));
}

#[test]
fn undefined_opcode_faults_with_pc() {
    let mut core = core_with(|asm| {
        asm.nop();
        asm.raw(&[0xEE]);
    });
    assert_eq!(core.step(), Step::Normal);
    assert_eq!(
        core.step(),
        Step::Fault(Fault::IllegalInstruction { opcode: 0xEE, pc: 1 })
    );
}

#[test]
fn out_of_range_register_operand_faults() {
    let mut core = core_with(|asm| {
        asm.raw(&[opcodes::MOV, 8, 0]);
    });
    assert_eq!(
        core.step(),
        Step::Fault(Fault::IllegalInstruction {
            opcode: opcodes::MOV,
            pc: 0
        })
    );
}

#[test]
fn load_from_unmapped_memory_faults() {
    let mut core = core_with(|asm| {
        asm.ldi(0, 0x0004_0000);
        asm.ldb(1, 0);
    });
    assert_eq!(core.step(), Step::Normal);
    assert_eq!(
        core.step(),
        Step::Fault(Fault::MemoryFault {
            addr: 0x0004_0000,
            pc: 6
        })
    );
}

#[test]
fn store_to_rom_faults() {
    let mut core = core_with(|asm| {
        asm.ldi(0, 0x10);
        asm.ldi(1, 0xAA);
        asm.stb(0, 1);
    });
    assert_eq!(core.step(), Step::Normal);
    assert_eq!(core.step(), Step::Normal);
    assert_eq!(
        core.step(),
        Step::Fault(Fault::MemoryFault { addr: 0x10, pc: 12 })
    );
}

#[test]
fn fetch_past_the_map_faults() {
    let mut core = core_with(|asm| asm.nop());
    core.pc = 0xFFFF_0000;
    assert!(matches!(
        core.step(),
        Step::Fault(Fault::MemoryFault { addr: 0xFFFF_0000, .. })
    ));
}

#[test]
fn ret_with_unmapped_stack_faults() {
    let mut core = core_with(|asm| asm.ret());
    core.sp = 0x0005_0000;
    assert!(matches!(
        core.step(),
        Step::Fault(Fault::MemoryFault { addr: 0x0005_0000, .. })
    ));
}

#[test]
fn faulting_instruction_reports_its_own_pc() {
    // The fault carries the pc of the faulting instruction's first byte,
    // even when the failing access happens mid-decode.
    let mut core = core_with(|asm| {
        asm.nop();
        asm.nop();
        asm.brk();
    });
    assert_eq!(core.step(), Step::Normal);
    assert_eq!(core.step(), Step::Normal);
    assert_eq!(core.step(), Step::Fault(Fault::Abort { pc: 2 }));
}
