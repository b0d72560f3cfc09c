//! Build script: render the CLI manual page into `OUT_DIR` for packaging.

use clap::CommandFactory;
use clap_mangen::Man;
use std::{env, fs, path::PathBuf};

#[path = "src/cli.rs"]
mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-env-changed=CARGO_PKG_VERSION");

    let cmd = cli::Cli::command();
    let binary_name = cmd.get_name().to_owned();
    let version = env::var("CARGO_PKG_VERSION").map_err(
        |_| "CARGO_PKG_VERSION must be set by Cargo; cannot render manual page without it.",
    )?;

    let man = Man::new(cmd)
        .section("1")
        .source(format!("{binary_name} {version}"));
    let mut buf = Vec::new();
    man.render(&mut buf)?;

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").ok_or("OUT_DIR must be set by Cargo")?);
    fs::write(out_dir.join(format!("{binary_name}.1")), buf)?;
    Ok(())
}
