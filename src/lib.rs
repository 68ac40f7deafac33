//! # cudart-fatbin-sys
//!
//! Raw FFI bindings for the CUDA runtime's device-code registration ABI and
//! the fat-binary container header nvcc embeds in host executables.
//!
//! The registration entry points (`__cudaRegisterFatBinary`,
//! `__cudaRegisterFunction`, ...) are undocumented runtime internals that
//! nvcc-generated host stubs call at load time. Interposition layers and
//! custom loaders need their exact signatures, and need to look inside the
//! fat binary handed to them. This crate provides both.
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! cudart-fatbin-sys = "0.1"
//! ```
//!
//! Inspecting a fat binary pulled out of a `.nv_fatbin` section:
//!
//! ```rust
//! use cudart_fatbin_sys::{FatBinaries, FatBinaryHeader};
//!
//! let mut section = FatBinaryHeader::new(4).to_bytes().to_vec();
//! section.extend_from_slice(b"elf!");
//!
//! for fatbin in FatBinaries::new(&section) {
//!     let fatbin = fatbin.unwrap();
//!     assert_eq!(fatbin.payload(), b"elf!");
//! }
//! ```
//!
//! In your `build.rs`, you can access the toolkit the runtime was found in:
//!
//! ```rust,no_run
//! fn main() {
//!     let cuda_include = std::env::var("DEP_CUDART_INCLUDE")
//!         .expect("cudart-fatbin-sys should set this");
//!     // Use cuda_include in your cc::Build configuration
//! }
//! ```
//!
//! ## Environment Variables
//!
//! - `CUDA_PATH`, `CUDA_ROOT`, `CUDA_TOOLKIT_ROOT_DIR`: toolkit root, checked in that order
//! - `CUDA_LIBRARY_PATH`: extra directories to search for `cudart`
//!
//! ## Features
//!
//! - `static`: link `cudart_static` instead of the shared runtime
//! - `bindgen`: generate the full runtime (`cuda_runtime.h`) and driver
//!   (`cuda.h`) APIs from the installed toolkit into `bindings`. Needs
//!   libclang and a toolkit at build time, and links `libcuda`.
//!
//! ## Note
//!
//! If no toolkit is found the build only warns. The layout types and the
//! fat-binary reader work without CUDA; calling a registration entry point
//! then fails to link.

#![no_std]
#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

#[cfg(test)]
extern crate std;

#[cfg(feature = "bindgen")]
pub mod bindings;
mod error;
pub mod fatbin;
pub mod runtime;

pub use error::FatBinaryError;
pub use fatbin::{
    fatBinaryHeader, FatBinaries, FatBinary, FatBinaryHeader, FatbincWrapper, __fatBinC_Wrapper_t,
    FATBINC_LINK_VERSION, FATBINC_MAGIC, FATBINC_VERSION, FATBIN_HEADER_SIZE, FATBIN_MAGIC,
    FATBIN_VERSION,
};
pub use runtime::*;
