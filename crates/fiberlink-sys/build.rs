use std::env;
use std::path::PathBuf;

const DEFAULT_LIB_NAME: &str = "fiberlink_vm";

fn main() {
    println!("cargo:rerun-if-env-changed=FIBERLINK_VM_LIB_DIR");
    println!("cargo:rerun-if-env-changed=FIBERLINK_VM_LIB_NAME");
    println!("cargo:rerun-if-env-changed=FIBERLINK_VM_STATIC");

    if env::var_os("CARGO_FEATURE_LINK").is_none() {
        return;
    }

    if let Some(dir) = env::var_os("FIBERLINK_VM_LIB_DIR") {
        let dir = PathBuf::from(dir);
        if !dir.exists() {
            panic!("FIBERLINK_VM_LIB_DIR does not exist: {}", dir.display());
        }
        println!("cargo:rustc-link-search=native={}", dir.display());
    }

    let name = env::var("FIBERLINK_VM_LIB_NAME").unwrap_or_else(|_| DEFAULT_LIB_NAME.to_string());
    let kind = if env::var_os("FIBERLINK_VM_STATIC").is_some() {
        "static"
    } else {
        "dylib"
    };
    println!("cargo:rustc-link-lib={}={}", kind, name);

    // The static archive is built from C and needs libm on unix targets.
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if kind == "static" && target_os != "windows" {
        println!("cargo:rustc-link-lib=m");
    }
}
