//! Otto Demo
//!
//! Command-line client for the Otto library. It either:
//!
//! 1. **Sends** a file: the content is checksummed, the checksum is signed
//!    with the configured certificate, and the file is uploaded. The object
//!    id assigned by OTTER is printed.
//!
//! 2. **Receives** an object: the object is streamed into a local file and
//!    the byte count is printed.
//!
//! The native library is loaded at runtime from `--lib-dir`.

mod args;
mod demo;

use std::io;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use otto_core::DynamicLibrary;

use args::Args;

fn main() -> Result<()> {
    color_eyre::install()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "otto_core=info,otto::native=info,ottodemo=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let config = Args::parse().into_config();
    tracing::debug!(mode = ?config.mode, lib_dir = %config.lib_dir.display(), "Starting");

    let library = DynamicLibrary::load(&config.lib_dir).wrap_err_with(|| {
        format!("Could not load the Otto library from {}", config.lib_dir.display())
    })?;
    tracing::info!(path = %library.path().display(), "Loaded Otto library");

    let stdin = io::stdin();
    let stdout = io::stdout();
    demo::run(library, &config, &mut stdin.lock(), &mut stdout.lock())?;
    Ok(())
}
