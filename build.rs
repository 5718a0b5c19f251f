//! Build script for the notevibes Spotify link.
//!
//! Copies the `.env.example` configuration template into the platform data
//! directory (`notevibes/.env.example`) so a fresh install has a template
//! next to the place `config::load_env` reads `.env` from.
//!
//! Copying is best effort: a read-only or sandboxed home directory produces a
//! cargo warning, never a failed build.

use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=.env.example");

    let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") else {
        return;
    };
    let env_example_path = PathBuf::from(manifest_dir).join(".env.example");
    if !env_example_path.is_file() {
        println!(
            "cargo:warning=.env.example not found at {}",
            env_example_path.display()
        );
        return;
    }

    let mut out_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    out_dir.push("notevibes");

    let copied = fs::create_dir_all(&out_dir)
        .and_then(|_| fs::copy(&env_example_path, out_dir.join(".env.example")));
    if let Err(e) = copied {
        println!(
            "cargo:warning=cannot copy .env.example to {}: {}",
            out_dir.display(),
            e
        );
    }
}
