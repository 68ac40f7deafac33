use std::env;
use std::path::{Path, PathBuf};

const ROOT_VARS: [&str; 3] = ["CUDA_PATH", "CUDA_ROOT", "CUDA_TOOLKIT_ROOT_DIR"];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=CUDA_LIBRARY_PATH");
    println!("cargo:rerun-if-env-changed=DOCS_RS");
    for var in ROOT_VARS {
        println!("cargo:rerun-if-env-changed={}", var);
    }

    // docs.rs has no toolkit; the bindings are still documentable.
    if env::var_os("DOCS_RS").is_some() {
        return;
    }

    let cuda_root = match link_cudart() {
        Ok(root) => Some(root),
        Err(err) => {
            println!("cargo:warning={}", err);
            println!("cargo:warning=cudart not linked; registration entry points are unresolved");
            None
        }
    };

    #[cfg(feature = "bindgen")]
    {
        let cuda_root = cuda_root.expect("The bindgen feature needs a CUDA installation");
        generate_bindings(&cuda_root).expect("Failed to generate CUDA bindings");
    }
    #[cfg(not(feature = "bindgen"))]
    let _ = cuda_root;
}

fn link_cudart() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let cuda_root = find_cuda_root().ok_or("Could not find a CUDA installation (set CUDA_PATH)")?;

    // Emit the toolkit location for dependent crates (DEP_CUDART_ROOT / DEP_CUDART_INCLUDE)
    println!("cargo:root={}", cuda_root.display());
    println!("cargo:include={}", cuda_root.join("include").display());

    let lib_dirs = find_cuda_lib_dirs(&cuda_root)?;
    if lib_dirs.is_empty() {
        return Err(format!("No CUDA library directory found under {}", cuda_root.display()).into());
    }
    for dir in &lib_dirs {
        println!("cargo:rustc-link-search=native={}", dir.display());
    }

    if cfg!(feature = "static") {
        println!("cargo:rustc-link-lib=static=cudart_static");
        if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("linux") {
            println!("cargo:rustc-link-lib=dylib=dl");
            println!("cargo:rustc-link-lib=dylib=rt");
            println!("cargo:rustc-link-lib=dylib=pthread");
        }
    } else {
        println!("cargo:rustc-link-lib=dylib=cudart");
    }

    // The generated driver bindings call into libcuda
    if cfg!(feature = "bindgen") {
        println!("cargo:rustc-link-lib=dylib=cuda");
    }

    println!(
        "cargo:warning=Linking {} from {}",
        if cfg!(feature = "static") { "cudart_static" } else { "cudart" },
        cuda_root.display()
    );

    Ok(cuda_root)
}

/// Writes `cuda-runtime.rs` and `cuda-driver.rs` to `OUT_DIR` from the
/// toolkit headers.
#[cfg(feature = "bindgen")]
fn generate_bindings(cuda_root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let out_path = PathBuf::from(env::var("OUT_DIR")?);
    let include_dir = cuda_root.join("include");

    for (header, output) in [
        ("csrc/cuda-runtime.h", "cuda-runtime.rs"),
        ("csrc/cuda-driver.h", "cuda-driver.rs"),
    ] {
        println!("cargo:rerun-if-changed={}", header);
        println!("cargo:warning=Generating {} from {}", output, header);

        let bindings = bindgen::Builder::default()
            .header(header)
            .clang_arg(format!("-I{}", include_dir.display()))
            .use_core()
            .ctypes_prefix("core::ffi")
            .derive_default(true)
            .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
            .generate()
            .map_err(|err| format!("Unable to generate bindings for {}: {}", header, err))?;

        bindings.write_to_file(out_path.join(output))?;
    }

    Ok(())
}

// A toolkit root must carry the runtime headers the declarations mirror
fn is_cuda_root_path<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().join("include").join("cuda_runtime.h").is_file()
}

fn find_cuda_root() -> Option<PathBuf> {
    // Environment variables win over the default install locations
    if let Some(path) = ROOT_VARS
        .iter()
        .filter_map(|name| env::var_os(name))
        .map(PathBuf::from)
        .find(|path| is_cuda_root_path(path))
    {
        return Some(path);
    }

    let windows = env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("windows");
    default_roots(windows).into_iter().find(|path| is_cuda_root_path(path))
}

fn default_roots(windows: bool) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if windows {
        // Newest toolkit first
        let mut versioned = glob_dirs("C:/Program Files/NVIDIA GPU Computing Toolkit/CUDA/v*");
        versioned.sort();
        roots.extend(versioned.into_iter().rev());
    } else {
        roots.push(PathBuf::from("/usr/local/cuda"));
        roots.push(PathBuf::from("/opt/cuda"));
        let mut versioned = glob_dirs("/usr/local/cuda-*");
        versioned.sort();
        roots.extend(versioned.into_iter().rev());
        roots.push(PathBuf::from("/usr/lib/cuda"));
    }
    roots
}

fn glob_dirs(pattern: &str) -> Vec<PathBuf> {
    match glob::glob(pattern) {
        Ok(paths) => paths.flatten().filter(|p| p.is_dir()).collect(),
        Err(err) => {
            println!("cargo:warning=Bad search pattern {}: {}", pattern, err);
            Vec::new()
        }
    }
}

fn find_cuda_lib_dirs(cuda_root: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    // CUDA_LIBRARY_PATH can pin the library location outright
    let mut candidates: Vec<PathBuf> = match env::var_os("CUDA_LIBRARY_PATH") {
        Some(paths) => env::split_paths(&paths).collect(),
        None => Vec::new(),
    };

    let arch = env::var("CARGO_CFG_TARGET_ARCH")?;
    let target_arch = match arch.as_str() {
        "aarch64" => "sbsa",
        other => other,
    };

    let targets_lib = cuda_root
        .join("targets")
        .join(format!("{}-linux", target_arch))
        .join("lib");

    candidates.push(cuda_root.join("lib64"));
    candidates.push(cuda_root.join("lib"));
    candidates.push(targets_lib.clone());
    candidates.push(cuda_root.join("lib").join("x64"));

    // Stub libraries last, so a real libcuda wins when present
    candidates.push(cuda_root.join("lib64").join("stubs"));
    candidates.push(targets_lib.join("stubs"));

    let mut valid = Vec::new();
    for dir in candidates {
        if dir.is_dir() && !valid.contains(&dir) {
            valid.push(dir);
        }
    }
    Ok(valid)
}
