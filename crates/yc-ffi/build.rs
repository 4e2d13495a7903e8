use std::env;
use std::path::PathBuf;

/// (cargo feature, library prefix, written in C++)
const CORES: &[(&str, &str, bool)] = &[
    ("FCEUMM", "fceumm", false),
    ("BSNES", "bsnes", true),
    ("GAMBATTE", "gambatte", true),
    ("MGBA", "mgba", false),
    ("CLOWNMDEMU", "clownmdemu", false),
    ("MELONDS", "melonds", true),
    ("MUPEN64PLUS_NEXT", "mupen64plus_next", true),
    ("PCSX_REARMED", "pcsx_rearmed", false),
];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=YC_CORES_DIR");

    let enabled: Vec<_> = CORES
        .iter()
        .filter(|(feature, _, _)| env::var_os(format!("CARGO_FEATURE_{}", feature)).is_some())
        .collect();

    // Nothing to link for the default (test pattern only) build
    if enabled.is_empty() {
        return;
    }

    // Prebuilt prefixed archives live outside the crate; default to
    // <workspace>/cores/lib
    let cores_dir = match env::var_os("YC_CORES_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let manifest_dir = PathBuf::from(
                env::var("CARGO_MANIFEST_DIR")
                    .expect("CARGO_MANIFEST_DIR environment variable not set"),
            );
            manifest_dir
                .parent()
                .and_then(|p| p.parent())
                .expect("Failed to get workspace root")
                .join("cores")
                .join("lib")
        }
    };

    if !cores_dir.exists() {
        println!(
            "cargo:warning=Core archive directory {} not found, set YC_CORES_DIR",
            cores_dir.display()
        );
    }

    println!("cargo:rustc-link-search=native={}", cores_dir.display());

    let mut needs_cpp = false;
    for (_, prefix, cpp) in enabled {
        println!("cargo:rustc-link-lib=static={}_libretro", prefix);
        needs_cpp |= *cpp;
    }

    if needs_cpp {
        let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
        match target_os.as_str() {
            "ios" | "macos" => println!("cargo:rustc-link-lib=c++"),
            "windows" => {}
            _ => println!("cargo:rustc-link-lib=stdc++"),
        }
    }
}
