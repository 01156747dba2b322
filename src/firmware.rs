//! Firmware images and their layout metadata
//!
//! The harness consumes an externally built firmware image as an opaque
//! byte blob; the only validation here is that the blob exists and fits the
//! ROM window. Setup problems are the one class of fatal error in this
//! crate, surfaced before any fuzz iteration runs.
//!
//! A [`FirmwareLayout`] is the slice of the target's linker map the input
//! channels need: where the entry point lives, where the input buffer is,
//! and where the stack starts. How the image was produced is somebody
//! else's concern.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::asm::Asm;
use crate::memory::{RAM_BASE, RAM_SIZE, ROM_SIZE};

/// Fatal setup errors. Everything after setup is a verdict, not an error.
#[derive(Debug)]
pub enum SetupError {
    /// The image (or disk image) could not be read.
    Io { path: PathBuf, source: io::Error },
    /// The image does not fit the guest ROM window.
    ImageTooLarge { size: usize, max: usize },
    /// Zero-byte images have no first instruction to run.
    EmptyImage,
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::Io { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            SetupError::ImageTooLarge { size, max } => {
                write!(f, "firmware image is {} bytes, ROM window is {}", size, max)
            }
            SetupError::EmptyImage => write!(f, "firmware image is empty"),
        }
    }
}

impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SetupError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// An opaque, validated firmware image.
#[derive(Debug, Clone)]
pub struct FirmwareImage {
    pub bytes: Vec<u8>,
}

impl FirmwareImage {
    /// Read and validate an image from disk.
    pub fn load(path: &Path) -> Result<Self, SetupError> {
        let bytes = fs::read(path).map_err(|source| SetupError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(bytes)
    }

    /// Validate an in-memory image.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SetupError> {
        if bytes.is_empty() {
            return Err(SetupError::EmptyImage);
        }
        if bytes.len() > ROM_SIZE as usize {
            return Err(SetupError::ImageTooLarge {
                size: bytes.len(),
                max: ROM_SIZE as usize,
            });
        }
        Ok(Self { bytes })
    }
}

/// The addresses the input channels need from the target's linker map.
///
/// Guest ABI: the entry point takes `r0` = input buffer pointer and `r1` =
/// input length, and returns a status value in `r0`. Abnormal termination,
/// not a return value, is the crash signal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FirmwareLayout {
    /// Address of the target entry point's first instruction.
    pub entry: u32,
    /// Guest address of the pre-agreed input buffer.
    pub input_addr: u32,
    /// Capacity of the input buffer; longer inputs are clamped.
    pub input_capacity: u32,
    /// Initial stack pointer for direct calls.
    pub stack_top: u32,
}

/// Built-in sample target, used by tests, benches, the fuzz targets, and
/// the CLI's demo mode.
///
/// The crash predicates mirror the classic harness self-test: an input of
/// at least 8 bytes whose first little-endian word is `0xaabb_ccdd`
/// aborts, an input whose first four bytes are `"abcd"` aborts, anything
/// else (including inputs shorter than four bytes) returns status 0. The
/// startup code establishes its own stack, then loops requesting input via
/// SYC and calling the entry point, so the same image is reachable through
/// all three channels.
pub fn sample_target() -> (FirmwareImage, FirmwareLayout) {
    const INPUT_ADDR: u32 = RAM_BASE;
    const INPUT_CAP: u32 = 1024;
    const STACK_TOP: u32 = RAM_BASE + RAM_SIZE;

    let mut asm = Asm::new();

    // start: establish the stack, then request input, call the entry
    // point, loop.
    asm.ldi(6, STACK_TOP);
    asm.msp(6);
    let main_loop = asm.here();
    asm.ldi(0, INPUT_ADDR);
    asm.ldi(1, INPUT_CAP);
    asm.syc();
    let call_field = asm.cal(0);
    asm.jmp(main_loop);

    // entry(r0 = buf, r1 = len) -> r0 = status
    let entry = asm.here();
    asm.ldi(2, 8);
    let word_short_field = asm.jlt(1, 2, 0); // len < 8: word predicate off
    asm.ldw(3, 0);
    asm.ldi(4, 0xaabb_ccdd);
    let word_miss_field = asm.jne(3, 4, 0);
    asm.brk(); // word predicate satisfied

    let prefix_check = asm.here();
    asm.ldi(2, 4);
    let short_field = asm.jlt(1, 2, 0); // len < 4: nothing to match
    asm.mov(3, 0);
    let mut miss_fields = Vec::new();
    for (i, &expected) in b"abcd".iter().enumerate() {
        if i > 0 {
            asm.addi(3, 1);
        }
        asm.ldb(4, 3);
        asm.ldi(5, expected as u32);
        miss_fields.push(asm.jne(4, 5, 0));
    }
    asm.brk(); // prefix predicate satisfied

    let ok = asm.here();
    asm.ldi(0, 0);
    asm.ret();

    asm.patch(call_field, entry);
    asm.patch(word_short_field, prefix_check);
    asm.patch(word_miss_field, prefix_check);
    asm.patch(short_field, ok);
    for field in miss_fields {
        asm.patch(field, ok);
    }

    let image = FirmwareImage::from_bytes(asm.finish())
        .expect("sample target must encode to a valid image");
    let layout = FirmwareLayout {
        entry,
        input_addr: INPUT_ADDR,
        input_capacity: INPUT_CAP,
        stack_top: STACK_TOP,
    };
    (image, layout)
}
