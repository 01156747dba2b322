//! Tiny instruction encoder
//!
//! Builds guest firmware images in-process for tests, benches, the fuzz
//! targets, and the built-in sample target. This is not a toolchain: it
//! encodes the core's fixed-width instructions one call at a time and lets
//! the caller patch forward jump targets once their address is known.

use crate::cpu::opcodes;

/// Incremental firmware builder. Addresses are ROM-relative, which equals
/// absolute since ROM is mapped at zero.
#[derive(Debug, Default)]
pub struct Asm {
    bytes: Vec<u8>,
}

impl Asm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current encoding position, usable as a label.
    pub fn here(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// Patch a previously encoded imm32 field with a now-known target.
    pub fn patch(&mut self, field: u32, target: u32) {
        let at = field as usize;
        self.bytes[at..at + 4].copy_from_slice(&target.to_le_bytes());
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }

    pub fn nop(&mut self) {
        self.bytes.push(opcodes::NOP);
    }

    pub fn hlt(&mut self) {
        self.bytes.push(opcodes::HLT);
    }

    pub fn brk(&mut self) {
        self.bytes.push(opcodes::BRK);
    }

    pub fn syc(&mut self) {
        self.bytes.push(opcodes::SYC);
    }

    pub fn ldi(&mut self, rd: u8, imm: u32) {
        self.bytes.push(opcodes::LDI);
        self.bytes.push(rd);
        self.bytes.extend_from_slice(&imm.to_le_bytes());
    }

    pub fn mov(&mut self, rd: u8, rs: u8) {
        self.reg_reg(opcodes::MOV, rd, rs);
    }

    pub fn ldb(&mut self, rd: u8, rs: u8) {
        self.reg_reg(opcodes::LDB, rd, rs);
    }

    pub fn stb(&mut self, rd: u8, rs: u8) {
        self.reg_reg(opcodes::STB, rd, rs);
    }

    pub fn ldw(&mut self, rd: u8, rs: u8) {
        self.reg_reg(opcodes::LDW, rd, rs);
    }

    pub fn stw(&mut self, rd: u8, rs: u8) {
        self.reg_reg(opcodes::STW, rd, rs);
    }

    pub fn msp(&mut self, rs: u8) {
        self.bytes.push(opcodes::MSP);
        self.bytes.push(rs);
    }

    pub fn add(&mut self, rd: u8, rs: u8) {
        self.reg_reg(opcodes::ADD, rd, rs);
    }

    pub fn sub(&mut self, rd: u8, rs: u8) {
        self.reg_reg(opcodes::SUB, rd, rs);
    }

    pub fn and(&mut self, rd: u8, rs: u8) {
        self.reg_reg(opcodes::AND, rd, rs);
    }

    pub fn xor(&mut self, rd: u8, rs: u8) {
        self.reg_reg(opcodes::XOR, rd, rs);
    }

    pub fn addi(&mut self, rd: u8, imm: u32) {
        self.bytes.push(opcodes::ADDI);
        self.bytes.push(rd);
        self.bytes.extend_from_slice(&imm.to_le_bytes());
    }

    /// Returns the offset of the imm32 field for forward patching.
    pub fn jmp(&mut self, target: u32) -> u32 {
        self.bytes.push(opcodes::JMP);
        self.imm_field(target)
    }

    pub fn jeq(&mut self, ra: u8, rb: u8, target: u32) -> u32 {
        self.branch(opcodes::JEQ, ra, rb, target)
    }

    pub fn jne(&mut self, ra: u8, rb: u8, target: u32) -> u32 {
        self.branch(opcodes::JNE, ra, rb, target)
    }

    pub fn jlt(&mut self, ra: u8, rb: u8, target: u32) -> u32 {
        self.branch(opcodes::JLT, ra, rb, target)
    }

    pub fn cal(&mut self, target: u32) -> u32 {
        self.bytes.push(opcodes::CAL);
        self.imm_field(target)
    }

    pub fn ret(&mut self) {
        self.bytes.push(opcodes::RET);
    }

    /// Raw bytes, for deliberately malformed images in tests.
    pub fn raw(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    fn reg_reg(&mut self, opcode: u8, rd: u8, rs: u8) {
        self.bytes.push(opcode);
        self.bytes.push(rd);
        self.bytes.push(rs);
    }

    fn branch(&mut self, opcode: u8, ra: u8, rb: u8, target: u32) -> u32 {
        self.bytes.push(opcode);
        self.bytes.push(ra);
        self.bytes.push(rb);
        self.imm_field(target)
    }

    fn imm_field(&mut self, target: u32) -> u32 {
        let field = self.here();
        self.bytes.extend_from_slice(&target.to_le_bytes());
        field
    }
}
