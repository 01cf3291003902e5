//! Build script for meids-sys.
//!
//! The declarations in `src/lib.rs` are written by hand from the ME-iDS
//! headers, so nothing is generated here. With the `meids-sdk` feature the
//! script locates `libmedriver` and emits the link directives.

fn main() {
    println!("cargo:rerun-if-env-changed=MEIDS_LIB_DIR");

    #[cfg(feature = "meids-sdk")]
    link_medriver();
}

#[cfg(feature = "meids-sdk")]
fn link_medriver() {
    // Explicit override wins over discovery
    if let Ok(dir) = std::env::var("MEIDS_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", dir);
        println!("cargo:rustc-link-lib=medriver");
        return;
    }

    if pkg_config::probe_library("medriver").is_ok() {
        return;
    }

    println!("cargo:rustc-link-lib=medriver");

    let lib_paths = ["/usr/local/lib", "/usr/lib", "/usr/lib/x86_64-linux-gnu"];
    for path in lib_paths {
        if std::path::Path::new(path).join("libmedriver.so").exists()
            || std::path::Path::new(path).join("libmedriver.a").exists()
        {
            println!("cargo:rustc-link-search=native={}", path);
            break;
        }
    }
}
