//! Device-code registration entry points of the CUDA runtime.
//!
//! nvcc-generated host stubs call these from a static constructor: one
//! `__cudaRegisterFatBinary` per translation unit, one registration call per
//! kernel, variable, texture and surface, then `__cudaRegisterFatBinaryEnd`.
//! `__cudaUnregisterFatBinary` runs at exit.
//!
//! `CUDARTAPI` is `__stdcall` on 32-bit Windows and the C convention
//! everywhere else, which is what `extern "system"` selects.

use core::ffi::{c_char, c_int, c_uint, c_void};
use core::marker::{PhantomData, PhantomPinned};

/// Handle returned by `__cudaRegisterFatBinary`.
pub type FatCubinHandle = *mut *mut c_void;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct uint3 {
    pub x: c_uint,
    pub y: c_uint,
    pub z: c_uint,
}

impl uint3 {
    pub const fn new(x: c_uint, y: c_uint, z: c_uint) -> Self {
        Self { x, y, z }
    }
}

/// Launch dimensions. Unspecified components default to 1.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct dim3 {
    pub x: c_uint,
    pub y: c_uint,
    pub z: c_uint,
}

impl dim3 {
    pub const fn new(x: c_uint, y: c_uint, z: c_uint) -> Self {
        Self { x, y, z }
    }

    /// Threads (or blocks) covered by these dimensions.
    pub const fn volume(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }
}

impl Default for dim3 {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

impl From<c_uint> for dim3 {
    fn from(x: c_uint) -> Self {
        Self::new(x, 1, 1)
    }
}

impl From<(c_uint, c_uint)> for dim3 {
    fn from((x, y): (c_uint, c_uint)) -> Self {
        Self::new(x, y, 1)
    }
}

impl From<(c_uint, c_uint, c_uint)> for dim3 {
    fn from((x, y, z): (c_uint, c_uint, c_uint)) -> Self {
        Self::new(x, y, z)
    }
}

impl From<uint3> for dim3 {
    fn from(v: uint3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// Host-side texture reference, only handled by pointer.
#[repr(C)]
pub struct textureReference {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

/// Host-side surface reference, only handled by pointer.
#[repr(C)]
pub struct surfaceReference {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

extern "system" {
    /// Registers the fat binary behind a `__fatBinC_Wrapper_t` and returns
    /// its handle.
    pub fn __cudaRegisterFatBinary(fatCubin: *mut c_void) -> FatCubinHandle;

    pub fn __cudaRegisterFatBinaryEnd(fatCubinHandle: FatCubinHandle);

    pub fn __cudaUnregisterFatBinary(fatCubinHandle: FatCubinHandle);

    pub fn __cudaRegisterVar(
        fatCubinHandle: FatCubinHandle,
        hostVar: *mut c_char,
        deviceAddress: *mut c_char,
        deviceName: *const c_char,
        ext: c_int,
        size: usize,
        constant: c_int,
        global: c_int,
    );

    /// Like `__cudaRegisterVar`, but the runtime writes the managed
    /// allocation's address through `hostVarPtrAddress`.
    pub fn __cudaRegisterManagedVar(
        fatCubinHandle: FatCubinHandle,
        hostVarPtrAddress: *mut *mut c_void,
        deviceAddress: *mut c_char,
        deviceName: *const c_char,
        ext: c_int,
        size: usize,
        constant: c_int,
        global: c_int,
    );

    /// Loads the module now rather than on first use. The status byte is
    /// the runtime's.
    pub fn __cudaInitModule(fatCubinHandle: FatCubinHandle) -> c_char;

    pub fn __cudaRegisterTexture(
        fatCubinHandle: FatCubinHandle,
        hostVar: *const textureReference,
        deviceAddress: *mut *const c_void,
        deviceName: *const c_char,
        dim: c_int,
        norm: c_int,
        ext: c_int,
    );

    pub fn __cudaRegisterSurface(
        fatCubinHandle: FatCubinHandle,
        hostVar: *const surfaceReference,
        deviceAddress: *mut *const c_void,
        deviceName: *const c_char,
        dim: c_int,
        ext: c_int,
    );

    /// Binds the host stub `hostFun` to the kernel `deviceName`. The
    /// launch-geometry pointers may be null; `thread_limit` is -1 when the
    /// kernel has no launch bounds.
    pub fn __cudaRegisterFunction(
        fatCubinHandle: FatCubinHandle,
        hostFun: *const c_char,
        deviceFun: *mut c_char,
        deviceName: *const c_char,
        thread_limit: c_int,
        tid: *mut uint3,
        bid: *mut uint3,
        bDim: *mut dim3,
        gDim: *mut dim3,
        wSize: *mut c_int,
    );
}

// Same signatures as function pointers, for symbols resolved at run time.
pub type PFN___cudaRegisterFatBinary =
    unsafe extern "system" fn(fatCubin: *mut c_void) -> FatCubinHandle;
pub type PFN___cudaRegisterFatBinaryEnd =
    unsafe extern "system" fn(fatCubinHandle: FatCubinHandle);
pub type PFN___cudaUnregisterFatBinary =
    unsafe extern "system" fn(fatCubinHandle: FatCubinHandle);
pub type PFN___cudaRegisterVar = unsafe extern "system" fn(
    fatCubinHandle: FatCubinHandle,
    hostVar: *mut c_char,
    deviceAddress: *mut c_char,
    deviceName: *const c_char,
    ext: c_int,
    size: usize,
    constant: c_int,
    global: c_int,
);
pub type PFN___cudaRegisterManagedVar = unsafe extern "system" fn(
    fatCubinHandle: FatCubinHandle,
    hostVarPtrAddress: *mut *mut c_void,
    deviceAddress: *mut c_char,
    deviceName: *const c_char,
    ext: c_int,
    size: usize,
    constant: c_int,
    global: c_int,
);
pub type PFN___cudaInitModule =
    unsafe extern "system" fn(fatCubinHandle: FatCubinHandle) -> c_char;
pub type PFN___cudaRegisterTexture = unsafe extern "system" fn(
    fatCubinHandle: FatCubinHandle,
    hostVar: *const textureReference,
    deviceAddress: *mut *const c_void,
    deviceName: *const c_char,
    dim: c_int,
    norm: c_int,
    ext: c_int,
);
pub type PFN___cudaRegisterSurface = unsafe extern "system" fn(
    fatCubinHandle: FatCubinHandle,
    hostVar: *const surfaceReference,
    deviceAddress: *mut *const c_void,
    deviceName: *const c_char,
    dim: c_int,
    ext: c_int,
);
pub type PFN___cudaRegisterFunction = unsafe extern "system" fn(
    fatCubinHandle: FatCubinHandle,
    hostFun: *const c_char,
    deviceFun: *mut c_char,
    deviceName: *const c_char,
    thread_limit: c_int,
    tid: *mut uint3,
    bid: *mut uint3,
    bDim: *mut dim3,
    gDim: *mut dim3,
    wSize: *mut c_int,
);

// The aliases must stay in sync with the declarations above.
const _: PFN___cudaRegisterFatBinary = __cudaRegisterFatBinary;
const _: PFN___cudaRegisterFatBinaryEnd = __cudaRegisterFatBinaryEnd;
const _: PFN___cudaUnregisterFatBinary = __cudaUnregisterFatBinary;
const _: PFN___cudaRegisterVar = __cudaRegisterVar;
const _: PFN___cudaRegisterManagedVar = __cudaRegisterManagedVar;
const _: PFN___cudaInitModule = __cudaInitModule;
const _: PFN___cudaRegisterTexture = __cudaRegisterTexture;
const _: PFN___cudaRegisterSurface = __cudaRegisterSurface;
const _: PFN___cudaRegisterFunction = __cudaRegisterFunction;

/// Symbol names of the entry points, for `dlsym`-style lookup.
pub mod symbols {
    pub const REGISTER_FAT_BINARY: &core::ffi::CStr = c"__cudaRegisterFatBinary";
    pub const REGISTER_FAT_BINARY_END: &core::ffi::CStr = c"__cudaRegisterFatBinaryEnd";
    pub const UNREGISTER_FAT_BINARY: &core::ffi::CStr = c"__cudaUnregisterFatBinary";
    pub const REGISTER_VAR: &core::ffi::CStr = c"__cudaRegisterVar";
    pub const REGISTER_MANAGED_VAR: &core::ffi::CStr = c"__cudaRegisterManagedVar";
    pub const INIT_MODULE: &core::ffi::CStr = c"__cudaInitModule";
    pub const REGISTER_TEXTURE: &core::ffi::CStr = c"__cudaRegisterTexture";
    pub const REGISTER_SURFACE: &core::ffi::CStr = c"__cudaRegisterSurface";
    pub const REGISTER_FUNCTION: &core::ffi::CStr = c"__cudaRegisterFunction";
}
