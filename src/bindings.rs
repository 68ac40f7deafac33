//! Bindings generated by `build.rs` from the toolkit headers.
//!
//! The runtime and driver APIs share many type names, so each header gets
//! its own module.

#[allow(dead_code, improper_ctypes, clippy::all)]
pub mod runtime {
    include!(concat!(env!("OUT_DIR"), "/cuda-runtime.rs"));
}

#[allow(dead_code, improper_ctypes, clippy::all)]
pub mod driver {
    include!(concat!(env!("OUT_DIR"), "/cuda-driver.rs"));
}
