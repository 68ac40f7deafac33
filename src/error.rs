use thiserror::Error;

/// Reasons a byte range or pointer is not a usable fat binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FatBinaryError {
    #[error("Fat binary truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Bad fat binary magic {found:#010x}")]
    BadMagic { found: u32 },

    #[error("Unsupported fat binary version {0}")]
    UnsupportedVersion(u16),

    #[error("Fat binary header size {0} is smaller than the 16-byte header")]
    HeaderTooSmall(u16),

    #[error("Fat binary size overflows the address space")]
    SizeOverflow,

    #[error("Null fat binary pointer")]
    NullPointer,

    #[error("Fat binary at {addr:#x} is not 8-byte aligned")]
    Misaligned { addr: usize },

    #[error("Bad fatbinc wrapper magic {found:#010x}")]
    BadWrapperMagic { found: u32 },
}
