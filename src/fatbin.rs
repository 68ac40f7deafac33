//! Fat-binary container header and the fatbinc control record.
//!
//! nvcc embeds each translation unit's device code as a fat binary in the
//! `.nv_fatbin` section and emits a `__fatBinC_Wrapper_t` pointing at it in
//! `.nvFatBinSegment`. The wrapper is what host stubs hand to
//! `__cudaRegisterFatBinary`.

use core::ffi::{c_int, c_ulonglong, c_void};
use core::mem::{align_of, size_of};
use core::{ptr, slice};

use bytemuck::{Pod, PodCastError, Zeroable};

use crate::error::FatBinaryError;

/// Magic number at offset 0 of every fat binary.
pub const FATBIN_MAGIC: u32 = 0xBA55_ED50;
/// The only fat binary header revision in use.
pub const FATBIN_VERSION: u16 = 1;
/// Byte length of [`fatBinaryHeader`].
pub const FATBIN_HEADER_SIZE: u16 = 16;

/// Magic number of a fatbinc wrapper.
pub const FATBINC_MAGIC: c_int = 0x4662_43B1;
pub const FATBINC_VERSION: c_int = 1;
/// Wrapper version of relocatable device code awaiting device linking.
pub const FATBINC_LINK_VERSION: c_int = 2;

pub const FATBIN_CONTROL_SECTION_NAME: &str = ".nvFatBinSegment";
pub const FATBIN_DATA_SECTION_NAME: &str = ".nv_fatbin";
pub const FATBIN_PRELINK_DATA_SECTION_NAME: &str = "__nv_relfatbin";

/// Header at the start of a fat binary. `fatSize` bytes of payload follow
/// the `headerSize` bytes of header.
#[repr(C, align(8))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct fatBinaryHeader {
    pub magic: u32,
    pub version: u16,
    pub headerSize: u16,
    pub fatSize: u64,
}

pub type FatBinaryHeader = fatBinaryHeader;

const _: () = assert!(align_of::<fatBinaryHeader>() == 8);
const _: () = assert!(size_of::<fatBinaryHeader>() == FATBIN_HEADER_SIZE as usize);

impl fatBinaryHeader {
    pub const SIZE: usize = FATBIN_HEADER_SIZE as usize;

    /// Header for a payload of `fat_size` bytes.
    pub const fn new(fat_size: u64) -> Self {
        Self {
            magic: FATBIN_MAGIC,
            version: FATBIN_VERSION,
            headerSize: FATBIN_HEADER_SIZE,
            fatSize: fat_size,
        }
    }

    /// Decodes and validates the header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, FatBinaryError> {
        let raw: &[u8; Self::SIZE] = bytes
            .get(..Self::SIZE)
            .and_then(|head| head.try_into().ok())
            .ok_or(FatBinaryError::Truncated {
                needed: Self::SIZE,
                available: bytes.len(),
            })?;

        let header = Self::from_bytes(raw);
        header.validate()?;
        Ok(header)
    }

    /// Decodes the little-endian fields without validating them.
    pub fn from_bytes(raw: &[u8; Self::SIZE]) -> Self {
        let header: Self = bytemuck::pod_read_unaligned(raw);
        Self {
            magic: u32::from_le(header.magic),
            version: u16::from_le(header.version),
            headerSize: u16::from_le(header.headerSize),
            fatSize: u64::from_le(header.fatSize),
        }
    }

    /// Encodes the fields little-endian.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let le = Self {
            magic: self.magic.to_le(),
            version: self.version.to_le(),
            headerSize: self.headerSize.to_le(),
            fatSize: self.fatSize.to_le(),
        };
        let mut raw = [0u8; Self::SIZE];
        raw.copy_from_slice(bytemuck::bytes_of(&le));
        raw
    }

    pub fn validate(&self) -> Result<(), FatBinaryError> {
        if self.magic != FATBIN_MAGIC {
            return Err(FatBinaryError::BadMagic { found: self.magic });
        }
        if self.version != FATBIN_VERSION {
            return Err(FatBinaryError::UnsupportedVersion(self.version));
        }
        if self.headerSize < FATBIN_HEADER_SIZE {
            return Err(FatBinaryError::HeaderTooSmall(self.headerSize));
        }
        Ok(())
    }

    /// Header plus payload length, `None` if it does not fit in `usize`.
    pub fn total_size(&self) -> Option<usize> {
        let fat_size = usize::try_from(self.fatSize).ok()?;
        usize::from(self.headerSize).checked_add(fat_size)
    }
}

/// A validated fat binary borrowed from memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatBinary<'a> {
    header: fatBinaryHeader,
    bytes: &'a [u8],
}

impl<'a> FatBinary<'a> {
    /// Views the fat binary at the start of `bytes`. Bytes past the end of
    /// the payload are ignored.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, FatBinaryError> {
        let header = fatBinaryHeader::parse(bytes)?;
        let total = header.total_size().ok_or(FatBinaryError::SizeOverflow)?;
        let bytes = bytes.get(..total).ok_or(FatBinaryError::Truncated {
            needed: total,
            available: bytes.len(),
        })?;
        Ok(Self { header, bytes })
    }

    /// Views a fat binary through a raw pointer, as received by a
    /// registration hook.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must point to at least 16 readable bytes. If those
    /// hold an aligned, valid header, as many bytes as the header announces
    /// must be readable and stay unmodified for `'a`.
    pub unsafe fn from_ptr(ptr: *const c_void) -> Result<Self, FatBinaryError> {
        if ptr.is_null() {
            return Err(FatBinaryError::NullPointer);
        }

        let head = slice::from_raw_parts(ptr.cast::<u8>(), fatBinaryHeader::SIZE);
        let header = *bytemuck::try_from_bytes::<fatBinaryHeader>(head).map_err(|err| match err {
            PodCastError::TargetAlignmentGreaterAndInputNotAligned
            | PodCastError::AlignmentMismatch => FatBinaryError::Misaligned { addr: ptr as usize },
            _ => FatBinaryError::Truncated {
                needed: fatBinaryHeader::SIZE,
                available: head.len(),
            },
        })?;
        header.validate()?;
        let total = header.total_size().ok_or(FatBinaryError::SizeOverflow)?;
        if total > isize::MAX as usize {
            return Err(FatBinaryError::SizeOverflow);
        }

        let bytes = slice::from_raw_parts(ptr.cast::<u8>(), total);
        Ok(Self { header, bytes })
    }

    pub fn header(&self) -> &fatBinaryHeader {
        &self.header
    }

    /// The `fatSize` bytes following the header.
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[usize::from(self.header.headerSize)..]
    }

    /// Header and payload as one contiguous slice.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// No payload follows the header.
    pub fn payload_is_empty(&self) -> bool {
        self.header.fatSize == 0
    }
}

/// Iterator over fat binaries laid out back to back in a data section,
/// each starting on an 8-byte boundary. Stops at trailing zero padding or
/// after yielding the first malformed entry.
#[derive(Debug, Clone)]
pub struct FatBinaries<'a> {
    section: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> FatBinaries<'a> {
    pub fn new(section: &'a [u8]) -> Self {
        Self {
            section,
            offset: 0,
            done: false,
        }
    }

    /// Offset of the next entry within the section.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for FatBinaries<'a> {
    type Item = Result<FatBinary<'a>, FatBinaryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let rest = self.section.get(self.offset..).unwrap_or_default();
        if rest.iter().all(|&b| b == 0) {
            self.done = true;
            return None;
        }

        match FatBinary::parse(rest) {
            Ok(fatbin) => {
                let end = self.offset + fatbin.as_bytes().len();
                let align = align_of::<fatBinaryHeader>();
                self.offset = end
                    .checked_next_multiple_of(align)
                    .unwrap_or(self.section.len())
                    .min(self.section.len());
                Some(Ok(fatbin))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl core::iter::FusedIterator for FatBinaries<'_> {}

/// Control record handed to `__cudaRegisterFatBinary`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct __fatBinC_Wrapper_t {
    pub magic: c_int,
    pub version: c_int,
    pub data: *const c_ulonglong,
    pub filename_or_fatbins: *mut c_void,
}

pub type FatbincWrapper = __fatBinC_Wrapper_t;

impl __fatBinC_Wrapper_t {
    /// Wrapper around an ordinary, fully linked fat binary.
    pub const fn new(data: *const c_ulonglong) -> Self {
        Self {
            magic: FATBINC_MAGIC,
            version: FATBINC_VERSION,
            data,
            filename_or_fatbins: ptr::null_mut(),
        }
    }

    /// Relocatable device code that still needs a device link step.
    pub fn is_prelinked(&self) -> bool {
        self.version == FATBINC_LINK_VERSION
    }

    /// Follows `data` to the wrapped fat binary.
    ///
    /// # Safety
    ///
    /// `data` must satisfy the contract of [`FatBinary::from_ptr`] for as
    /// long as `self` is borrowed.
    pub unsafe fn fat_binary(&self) -> Result<FatBinary<'_>, FatBinaryError> {
        if self.magic != FATBINC_MAGIC {
            return Err(FatBinaryError::BadWrapperMagic {
                found: self.magic as u32,
            });
        }
        FatBinary::from_ptr(self.data.cast())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::offset_of;
    use std::vec;
    use std::vec::Vec;

    use bytemuck::cast_slice_mut;

    fn blob(header: fatBinaryHeader, payload: &[u8]) -> Vec<u8> {
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    // u64 backing storage keeps the copy 8-byte aligned
    fn aligned(bytes: &[u8]) -> Vec<u64> {
        let mut words = vec![0u64; bytes.len().div_ceil(8)];
        cast_slice_mut::<u64, u8>(&mut words)[..bytes.len()].copy_from_slice(bytes);
        words
    }

    #[test]
    fn header_layout_matches_vendor() {
        assert_eq!(size_of::<fatBinaryHeader>(), 16);
        assert_eq!(align_of::<fatBinaryHeader>(), 8);
        assert_eq!(offset_of!(fatBinaryHeader, magic), 0);
        assert_eq!(offset_of!(fatBinaryHeader, version), 4);
        assert_eq!(offset_of!(fatBinaryHeader, headerSize), 6);
        assert_eq!(offset_of!(fatBinaryHeader, fatSize), 8);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn wrapper_layout() {
        assert_eq!(size_of::<__fatBinC_Wrapper_t>(), 24);
        assert_eq!(align_of::<__fatBinC_Wrapper_t>(), 8);
        assert_eq!(offset_of!(__fatBinC_Wrapper_t, data), 8);
        assert_eq!(offset_of!(__fatBinC_Wrapper_t, filename_or_fatbins), 16);
    }

    #[test]
    fn header_bytes_are_little_endian() {
        let raw = fatBinaryHeader::new(0x20).to_bytes();
        assert_eq!(&raw[..4], &[0x50, 0xED, 0x55, 0xBA]);
        assert_eq!(&raw[4..8], &[1, 0, 16, 0]);
        assert_eq!(&raw[8..], &[0x20, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn parses_blob_and_ignores_trailing_bytes() {
        let mut bytes = blob(fatBinaryHeader::new(5), b"hello");
        bytes.extend_from_slice(b"junk");

        let fatbin = FatBinary::parse(&bytes).unwrap();
        assert_eq!(fatbin.header().fatSize, 5);
        assert_eq!(fatbin.payload(), b"hello");
        assert_eq!(fatbin.as_bytes().len(), 21);
        assert_eq!(fatbin.as_bytes(), &bytes[..21]);
        assert!(!fatbin.payload_is_empty());
    }

    #[test]
    fn payload_starts_after_extended_header() {
        let mut header = fatBinaryHeader::new(3);
        header.headerSize = 24;
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(&[0xEE; 8]);
        bytes.extend_from_slice(b"abc");

        let fatbin = FatBinary::parse(&bytes).unwrap();
        assert_eq!(fatbin.payload(), b"abc");
        assert_eq!(fatbin.header().total_size(), Some(27));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut header = fatBinaryHeader::new(0);
        header.magic = 0xDEAD_BEEF;
        assert_eq!(
            FatBinary::parse(&header.to_bytes()),
            Err(FatBinaryError::BadMagic { found: 0xDEAD_BEEF })
        );
    }

    #[test]
    fn rejects_unknown_version() {
        let mut header = fatBinaryHeader::new(0);
        header.version = 2;
        assert_eq!(
            fatBinaryHeader::parse(&header.to_bytes()),
            Err(FatBinaryError::UnsupportedVersion(2))
        );
    }

    #[test]
    fn rejects_short_header_size() {
        let mut header = fatBinaryHeader::new(0);
        header.headerSize = 8;
        assert_eq!(header.validate(), Err(FatBinaryError::HeaderTooSmall(8)));
    }

    #[test]
    fn reports_truncation() {
        let bytes = blob(fatBinaryHeader::new(5), b"hello");
        assert_eq!(
            FatBinary::parse(&bytes[..10]),
            Err(FatBinaryError::Truncated { needed: 16, available: 10 })
        );
        assert_eq!(
            FatBinary::parse(&bytes[..19]),
            Err(FatBinaryError::Truncated { needed: 21, available: 19 })
        );
    }

    #[test]
    fn oversized_payload_overflows() {
        let header = fatBinaryHeader::new(u64::MAX);
        assert_eq!(header.total_size(), None);
        assert_eq!(FatBinary::parse(&header.to_bytes()), Err(FatBinaryError::SizeOverflow));

        let words = aligned(&header.to_bytes());
        assert_eq!(
            unsafe { FatBinary::from_ptr(words.as_ptr().cast()) },
            Err(FatBinaryError::SizeOverflow)
        );
    }

    #[test]
    fn raw_pointer_rejects_sizes_past_isize_max() {
        // Fits usize but no allocation can be that large
        let header = fatBinaryHeader::new((usize::MAX - 16) as u64);
        assert_eq!(header.total_size(), Some(usize::MAX));

        let words = aligned(&header.to_bytes());
        assert_eq!(
            unsafe { FatBinary::from_ptr(words.as_ptr().cast()) },
            Err(FatBinaryError::SizeOverflow)
        );
    }

    #[test]
    fn header_only_blob_has_empty_payload() {
        let bytes = blob(fatBinaryHeader::new(0), b"");
        let fatbin = FatBinary::parse(&bytes).unwrap();
        assert!(fatbin.payload_is_empty());
        assert!(fatbin.payload().is_empty());
        assert_eq!(fatbin.as_bytes().len(), fatBinaryHeader::SIZE);
    }

    #[test]
    fn iterates_section_with_padding() {
        let mut section = blob(fatBinaryHeader::new(5), b"first");
        section.resize(24, 0);
        section.extend_from_slice(&blob(fatBinaryHeader::new(8), b"second!!"));
        section.extend_from_slice(&[0; 16]);

        let mut iter = FatBinaries::new(&section);
        assert_eq!(iter.next().unwrap().unwrap().payload(), b"first");
        assert_eq!(iter.offset(), 24);
        assert_eq!(iter.next().unwrap().unwrap().payload(), b"second!!");
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn iteration_stops_after_malformed_entry() {
        let mut section = blob(fatBinaryHeader::new(0), b"");
        section.extend_from_slice(&[0xFF; 16]);

        let entries: Vec<_> = FatBinaries::new(&section).collect();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_ok());
        assert_eq!(entries[1], Err(FatBinaryError::BadMagic { found: u32::MAX }));
    }

    #[test]
    fn empty_section_yields_nothing() {
        assert_eq!(FatBinaries::new(&[]).count(), 0);
        assert_eq!(FatBinaries::new(&[0u8; 32]).count(), 0);
    }

    #[test]
    fn reads_through_raw_pointer() {
        let words = aligned(&blob(fatBinaryHeader::new(4), b"cubn"));
        let fatbin = unsafe { FatBinary::from_ptr(words.as_ptr().cast()) }.unwrap();
        assert_eq!(fatbin.payload(), b"cubn");
        assert_eq!(fatbin.as_bytes().len(), 20);
    }

    #[test]
    fn raw_pointer_checks() {
        assert_eq!(
            unsafe { FatBinary::from_ptr(ptr::null()) },
            Err(FatBinaryError::NullPointer)
        );

        let words = aligned(&blob(fatBinaryHeader::new(8), &[0; 8]));
        let skewed = words.as_ptr().cast::<u8>().wrapping_add(4);
        assert_eq!(
            unsafe { FatBinary::from_ptr(skewed.cast()) },
            Err(FatBinaryError::Misaligned { addr: skewed as usize })
        );
    }

    #[test]
    fn wrapper_follows_data_pointer() {
        let words = aligned(&blob(fatBinaryHeader::new(2), b"ok"));
        let wrapper = FatbincWrapper::new(words.as_ptr());
        assert!(!wrapper.is_prelinked());
        assert!(wrapper.filename_or_fatbins.is_null());

        let fatbin = unsafe { wrapper.fat_binary() }.unwrap();
        assert_eq!(fatbin.payload(), b"ok");
    }

    #[test]
    fn wrapper_magic_is_checked() {
        let words = aligned(&blob(fatBinaryHeader::new(0), b""));
        let mut wrapper = FatbincWrapper::new(words.as_ptr());
        wrapper.magic = 0x1234;
        wrapper.version = FATBINC_LINK_VERSION;
        assert!(wrapper.is_prelinked());
        assert_eq!(
            unsafe { wrapper.fat_binary() }.unwrap_err(),
            FatBinaryError::BadWrapperMagic { found: 0x1234 }
        );
    }
}
