//! Guest CPU core
//!
//! A small 32-bit register machine executed by a pure interpreter. The core
//! is the deterministic heart of the harness: one `step()` per instruction,
//! no wall-clock input anywhere, so the instruction counter doubles as the
//! guest's clock. Guest-visible misbehavior (undefined opcodes, out-of-map
//! memory access, the explicit abort instruction) surfaces as a [`Fault`]
//! value, never as a host-side panic.
//!
//! ## Instruction set
//!
//! | Opcode | Mnemonic        | Size | Description                         |
//! |:-------|:----------------|:-----|:------------------------------------|
//! | 0x00   | NOP             | 1    | No operation                        |
//! | 0x01   | HLT             | 1    | Halt (normal termination)           |
//! | 0x02   | BRK             | 1    | Abort (guest crash signal)          |
//! | 0x03   | SYC             | 1    | Synchronous exit to the host        |
//! | 0x10   | LDI rd, imm32   | 6    | Load immediate                      |
//! | 0x11   | MOV rd, rs      | 3    | Register copy                       |
//! | 0x12   | LDB rd, [rs]    | 3    | Load byte, zero-extended            |
//! | 0x13   | STB [rd], rs    | 3    | Store low byte                      |
//! | 0x14   | LDW rd, [rs]    | 3    | Load 32-bit little-endian word      |
//! | 0x15   | STW [rd], rs    | 3    | Store 32-bit little-endian word     |
//! | 0x16   | MSP rs          | 2    | Set stack pointer from register     |
//! | 0x20   | ADD rd, rs      | 3    | Wrapping add                        |
//! | 0x21   | SUB rd, rs      | 3    | Wrapping subtract                   |
//! | 0x22   | AND rd, rs      | 3    | Bitwise and                         |
//! | 0x23   | XOR rd, rs      | 3    | Bitwise xor                         |
//! | 0x24   | ADDI rd, imm32  | 6    | Wrapping add immediate              |
//! | 0x30   | JMP imm32       | 5    | Unconditional jump                  |
//! | 0x31   | JEQ ra, rb, a   | 7    | Jump if ra == rb                    |
//! | 0x32   | JNE ra, rb, a   | 7    | Jump if ra != rb                    |
//! | 0x33   | JLT ra, rb, a   | 7    | Jump if ra < rb (unsigned)          |
//! | 0x34   | CAL imm32       | 5    | Push return address, jump           |
//! | 0x35   | RET             | 1    | Pop return address                  |
//!
//! Anything else decodes to [`Fault::IllegalInstruction`]. Immediates and
//! memory words are little-endian.

use serde::{Deserialize, Serialize};

use crate::memory::Bus;

/// Opcode constants, shared with the encoder and the channels.
pub mod opcodes {
    pub const NOP: u8 = 0x00;
    pub const HLT: u8 = 0x01;
    pub const BRK: u8 = 0x02;
    pub const SYC: u8 = 0x03;
    pub const LDI: u8 = 0x10;
    pub const MOV: u8 = 0x11;
    pub const LDB: u8 = 0x12;
    pub const STB: u8 = 0x13;
    pub const LDW: u8 = 0x14;
    pub const STW: u8 = 0x15;
    pub const MSP: u8 = 0x16;
    pub const ADD: u8 = 0x20;
    pub const SUB: u8 = 0x21;
    pub const AND: u8 = 0x22;
    pub const XOR: u8 = 0x23;
    pub const ADDI: u8 = 0x24;
    pub const JMP: u8 = 0x30;
    pub const JEQ: u8 = 0x31;
    pub const JNE: u8 = 0x32;
    pub const JLT: u8 = 0x33;
    pub const CAL: u8 = 0x34;
    pub const RET: u8 = 0x35;
}

/// Number of general-purpose registers.
pub const NUM_REGS: usize = 8;

/// A guest-side fault. Faults are the signal the harness exists to catch;
/// they are data flowing back to the oracle, not host errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fault {
    /// Undefined opcode or malformed operand byte.
    IllegalInstruction { opcode: u8, pc: u32 },
    /// Access outside the guest memory map, or a write to ROM.
    MemoryFault { addr: u32, pc: u32 },
    /// The guest executed BRK (its explicit abort path).
    Abort { pc: u32 },
}

/// Outcome of executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Instruction retired, execution continues.
    Normal,
    /// HLT executed.
    Halted,
    /// SYC executed; the host owns control until the core is resumed.
    SyncExit,
    /// The instruction faulted. CPU state is left as of the fault.
    Fault(Fault),
}

/// Guest CPU state. The CPU owns its bus for the lifetime of the session.
#[derive(Debug, Clone)]
pub struct Cpu {
    /// General-purpose registers r0..r7. By convention r0/r1 carry the
    /// (buffer, length) arguments into the target entry point and r0
    /// carries the status value back.
    pub r: [u32; NUM_REGS],
    /// Program counter.
    pub pc: u32,
    /// Stack pointer. Grows downward; CAL/RET go through it.
    pub sp: u32,
    /// Guest memory map.
    pub bus: Bus,
}

impl Cpu {
    pub fn new(bus: Bus) -> Self {
        Self {
            r: [0; NUM_REGS],
            pc: 0,
            sp: 0,
            bus,
        }
    }

    /// Reset registers to the power-on state. Memory is untouched.
    pub fn reset(&mut self) {
        self.r = [0; NUM_REGS];
        self.pc = 0;
        self.sp = 0;
    }

    /// Execute exactly one instruction.
    pub fn step(&mut self) -> Step {
        let pc = self.pc;
        match self.exec(pc) {
            Ok(flow) => flow,
            Err(fault) => Step::Fault(fault),
        }
    }

    fn exec(&mut self, start_pc: u32) -> Result<Step, Fault> {
        let opcode = self.fetch_byte(start_pc)?;

        match opcode {
            opcodes::NOP => {}
            opcodes::HLT => return Ok(Step::Halted),
            opcodes::BRK => {
                return Err(Fault::Abort { pc: start_pc });
            }
            opcodes::SYC => return Ok(Step::SyncExit),
            opcodes::LDI => {
                let rd = self.fetch_reg(start_pc, opcode)?;
                let imm = self.fetch_word(start_pc)?;
                self.r[rd] = imm;
            }
            opcodes::MOV => {
                let rd = self.fetch_reg(start_pc, opcode)?;
                let rs = self.fetch_reg(start_pc, opcode)?;
                self.r[rd] = self.r[rs];
            }
            opcodes::LDB => {
                let rd = self.fetch_reg(start_pc, opcode)?;
                let rs = self.fetch_reg(start_pc, opcode)?;
                let addr = self.r[rs];
                self.r[rd] = self.load_byte(start_pc, addr)? as u32;
            }
            opcodes::STB => {
                let rd = self.fetch_reg(start_pc, opcode)?;
                let rs = self.fetch_reg(start_pc, opcode)?;
                let addr = self.r[rd];
                self.store_byte(start_pc, addr, self.r[rs] as u8)?;
            }
            opcodes::LDW => {
                let rd = self.fetch_reg(start_pc, opcode)?;
                let rs = self.fetch_reg(start_pc, opcode)?;
                let addr = self.r[rs];
                self.r[rd] = self.load_word(start_pc, addr)?;
            }
            opcodes::STW => {
                let rd = self.fetch_reg(start_pc, opcode)?;
                let rs = self.fetch_reg(start_pc, opcode)?;
                let addr = self.r[rd];
                self.store_word(start_pc, addr, self.r[rs])?;
            }
            opcodes::MSP => {
                let rs = self.fetch_reg(start_pc, opcode)?;
                self.sp = self.r[rs];
            }
            opcodes::ADD => self.alu(start_pc, opcode, u32::wrapping_add)?,
            opcodes::SUB => self.alu(start_pc, opcode, u32::wrapping_sub)?,
            opcodes::AND => self.alu(start_pc, opcode, |a, b| a & b)?,
            opcodes::XOR => self.alu(start_pc, opcode, |a, b| a ^ b)?,
            opcodes::ADDI => {
                let rd = self.fetch_reg(start_pc, opcode)?;
                let imm = self.fetch_word(start_pc)?;
                self.r[rd] = self.r[rd].wrapping_add(imm);
            }
            opcodes::JMP => {
                let target = self.fetch_word(start_pc)?;
                self.pc = target;
            }
            opcodes::JEQ => self.branch(start_pc, opcode, |a, b| a == b)?,
            opcodes::JNE => self.branch(start_pc, opcode, |a, b| a != b)?,
            opcodes::JLT => self.branch(start_pc, opcode, |a, b| a < b)?,
            opcodes::CAL => {
                let target = self.fetch_word(start_pc)?;
                let ret = self.pc;
                self.push(start_pc, ret)?;
                self.pc = target;
            }
            opcodes::RET => {
                self.pc = self.pop(start_pc)?;
            }
            _ => {
                return Err(Fault::IllegalInstruction {
                    opcode,
                    pc: start_pc,
                });
            }
        }

        Ok(Step::Normal)
    }

    // ========== Fetch helpers ==========

    fn fetch_byte(&mut self, start_pc: u32) -> Result<u8, Fault> {
        let byte = self.bus.read_byte(self.pc).ok_or(Fault::MemoryFault {
            addr: self.pc,
            pc: start_pc,
        })?;
        self.pc = self.pc.wrapping_add(1);
        Ok(byte)
    }

    /// Fetch a register operand byte. Operand bytes past the register file
    /// decode as illegal, carrying the instruction's opcode for the report.
    fn fetch_reg(&mut self, start_pc: u32, opcode: u8) -> Result<usize, Fault> {
        let idx = self.fetch_byte(start_pc)? as usize;
        if idx < NUM_REGS {
            Ok(idx)
        } else {
            Err(Fault::IllegalInstruction {
                opcode,
                pc: start_pc,
            })
        }
    }

    fn fetch_word(&mut self, start_pc: u32) -> Result<u32, Fault> {
        let b0 = self.fetch_byte(start_pc)? as u32;
        let b1 = self.fetch_byte(start_pc)? as u32;
        let b2 = self.fetch_byte(start_pc)? as u32;
        let b3 = self.fetch_byte(start_pc)? as u32;
        Ok(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }

    // ========== Data access helpers ==========

    fn load_byte(&self, start_pc: u32, addr: u32) -> Result<u8, Fault> {
        self.bus
            .read_byte(addr)
            .ok_or(Fault::MemoryFault { addr, pc: start_pc })
    }

    fn store_byte(&mut self, start_pc: u32, addr: u32, value: u8) -> Result<(), Fault> {
        if self.bus.write_byte(addr, value) {
            Ok(())
        } else {
            Err(Fault::MemoryFault { addr, pc: start_pc })
        }
    }

    fn load_word(&self, start_pc: u32, addr: u32) -> Result<u32, Fault> {
        let mut value = 0u32;
        for i in 0..4 {
            let byte = self.load_byte(start_pc, addr.wrapping_add(i))?;
            value |= (byte as u32) << (8 * i);
        }
        Ok(value)
    }

    fn store_word(&mut self, start_pc: u32, addr: u32, value: u32) -> Result<(), Fault> {
        for i in 0..4 {
            self.store_byte(start_pc, addr.wrapping_add(i), (value >> (8 * i)) as u8)?;
        }
        Ok(())
    }

    fn push(&mut self, start_pc: u32, value: u32) -> Result<(), Fault> {
        self.sp = self.sp.wrapping_sub(4);
        self.store_word(start_pc, self.sp, value)
    }

    fn pop(&mut self, start_pc: u32) -> Result<u32, Fault> {
        let value = self.load_word(start_pc, self.sp)?;
        self.sp = self.sp.wrapping_add(4);
        Ok(value)
    }

    // ========== Shared instruction bodies ==========

    fn alu(&mut self, start_pc: u32, opcode: u8, op: fn(u32, u32) -> u32) -> Result<(), Fault> {
        let rd = self.fetch_reg(start_pc, opcode)?;
        let rs = self.fetch_reg(start_pc, opcode)?;
        self.r[rd] = op(self.r[rd], self.r[rs]);
        Ok(())
    }

    fn branch(&mut self, start_pc: u32, opcode: u8, cond: fn(u32, u32) -> bool) -> Result<(), Fault> {
        let ra = self.fetch_reg(start_pc, opcode)?;
        let rb = self.fetch_reg(start_pc, opcode)?;
        let target = self.fetch_word(start_pc)?;
        if cond(self.r[ra], self.r[rb]) {
            self.pc = target;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests_faults;
