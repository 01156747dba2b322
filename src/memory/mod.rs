//! Guest Memory Bus
//!
//! Routes guest memory accesses to the appropriate backing region. The map
//! is deliberately small and fully deterministic: every address either hits
//! a backing region or is unmapped, and unmapped access is a guest fault
//! (reported by the core, not here).
//!
//! ## Guest Memory Map
//!
//! | Address Range         | Size  | Description                          |
//! |:----------------------|:------|:-------------------------------------|
//! | 0x00000000-0x0000FFFF | 64 KB | ROM (firmware image, read-only)      |
//! | 0x00010000-0x0001FFFF | 64 KB | Work RAM (input buffer, stack)       |
//! | 0x00020000-0x0002FFFF | 64 KB | Disk window (discard-on-exit)        |
//! | 0x00030000-0x0003000F | 16 B  | Console sink (write-only, discarded) |
//!
//! The disk window is loaded from an externally provisioned image and is
//! never written back; restoring a snapshot throws away every write the
//! previous iteration made to it. The console sink accepts writes and drops
//! the bytes, so guest output can never introduce host interaction into an
//! iteration.

/// Base address of the ROM region.
pub const ROM_BASE: u32 = 0x0000_0000;
/// Size of the ROM region.
pub const ROM_SIZE: u32 = 0x1_0000;

/// Base address of work RAM.
pub const RAM_BASE: u32 = 0x0001_0000;
/// Size of work RAM.
pub const RAM_SIZE: u32 = 0x1_0000;

/// Base address of the disk window.
pub const DISK_BASE: u32 = 0x0002_0000;
/// Size of the disk window.
pub const DISK_SIZE: u32 = 0x1_0000;

/// Base address of the console sink.
pub const CONSOLE_BASE: u32 = 0x0003_0000;
/// Size of the console sink.
pub const CONSOLE_SIZE: u32 = 0x10;

/// Guest memory bus.
#[derive(Debug, Clone)]
pub struct Bus {
    /// Firmware image. Immutable after load.
    pub rom: Vec<u8>,

    /// Work RAM.
    pub ram: Box<[u8]>,

    /// In-memory copy of the attached disk image. Writes land here and
    /// nowhere else; the backing image is never committed.
    pub disk: Box<[u8]>,
}

impl Bus {
    /// Create a bus with empty ROM and zeroed RAM/disk.
    pub fn new() -> Self {
        Self {
            rom: Vec::new(),
            ram: vec![0; RAM_SIZE as usize].into_boxed_slice(),
            disk: vec![0; DISK_SIZE as usize].into_boxed_slice(),
        }
    }

    /// Load a firmware image into ROM. The caller has already checked the
    /// image fits the ROM window.
    pub fn load_rom(&mut self, data: &[u8]) {
        self.rom = data.to_vec();
    }

    /// Load a disk image into the disk window. A short image leaves the
    /// tail zeroed.
    pub fn load_disk(&mut self, data: &[u8]) {
        let len = data.len().min(DISK_SIZE as usize);
        self.disk[..len].copy_from_slice(&data[..len]);
    }

    /// Read a byte. `None` means the address is unmapped (or write-only).
    pub fn read_byte(&self, addr: u32) -> Option<u8> {
        match addr {
            ROM_BASE..=0x0000_FFFF => {
                let off = (addr - ROM_BASE) as usize;
                // Window past the image reads as pulled-up bus lines.
                Some(self.rom.get(off).copied().unwrap_or(0xFF))
            }
            RAM_BASE..=0x0001_FFFF => Some(self.ram[(addr - RAM_BASE) as usize]),
            DISK_BASE..=0x0002_FFFF => Some(self.disk[(addr - DISK_BASE) as usize]),
            _ => None,
        }
    }

    /// Write a byte. Returns `false` when the address is unmapped or
    /// read-only, which the core reports as a memory fault.
    pub fn write_byte(&mut self, addr: u32, value: u8) -> bool {
        match addr {
            ROM_BASE..=0x0000_FFFF => false, // ROM is read-only
            RAM_BASE..=0x0001_FFFF => {
                self.ram[(addr - RAM_BASE) as usize] = value;
                true
            }
            DISK_BASE..=0x0002_FFFF => {
                self.disk[(addr - DISK_BASE) as usize] = value;
                true
            }
            CONSOLE_BASE..=0x0003_000F => true, // sink, byte discarded
            _ => false,
        }
    }

    /// Host-side bulk write, used by the input channels. Fails atomically:
    /// if any byte of the span would be unwritable, nothing is written.
    pub fn write_bytes(&mut self, addr: u32, data: &[u8]) -> bool {
        if data.is_empty() {
            return true;
        }
        let end = match addr.checked_add(data.len() as u32) {
            Some(end) => end,
            None => return false,
        };
        if !self.span_writable(addr, end) {
            return false;
        }
        for (i, &byte) in data.iter().enumerate() {
            self.write_byte(addr + i as u32, byte);
        }
        true
    }

    /// Host-side bulk read, used by tests and crash reports.
    pub fn read_bytes(&self, addr: u32, len: usize) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            out.push(self.read_byte(addr.wrapping_add(i as u32))?);
        }
        Some(out)
    }

    fn span_writable(&self, start: u32, end: u32) -> bool {
        let in_ram = start >= RAM_BASE && end <= RAM_BASE + RAM_SIZE;
        let in_disk = start >= DISK_BASE && end <= DISK_BASE + DISK_SIZE;
        in_ram || in_disk
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests_property;
