//! Build script for `erg`.
//!
//! Embeds build metadata (timestamp, rustc version, target triple) into the
//! binary for display in `erg --version`. Missing metadata is not an error.

use vergen_gix::{BuildBuilder, CargoBuilder, Emitter, RustcBuilder};

fn main() {
    let mut emitter = Emitter::default();

    match BuildBuilder::default().build_timestamp(true).build() {
        Ok(build) => {
            if let Err(e) = emitter.add_instructions(&build) {
                println!("cargo:warning=erg: build timestamp unavailable: {e}");
            }
        }
        Err(e) => println!("cargo:warning=erg: build metadata unavailable: {e}"),
    }

    match CargoBuilder::default().target_triple(true).build() {
        Ok(cargo) => {
            if let Err(e) = emitter.add_instructions(&cargo) {
                println!("cargo:warning=erg: target triple unavailable: {e}");
            }
        }
        Err(e) => println!("cargo:warning=erg: cargo metadata unavailable: {e}"),
    }

    match RustcBuilder::default().semver(true).build() {
        Ok(rustc) => {
            if let Err(e) = emitter.add_instructions(&rustc) {
                println!("cargo:warning=erg: rustc version unavailable: {e}");
            }
        }
        Err(e) => println!("cargo:warning=erg: rustc metadata unavailable: {e}"),
    }

    if let Err(e) = emitter.emit() {
        println!("cargo:warning=erg: failed to emit build metadata: {e}");
    }
}
