//! Binary entry point for the routeprobe CLI.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout = io::stdout().lock();
    // Unlocked: log events from worker threads also write to stderr.
    let mut stderr = io::stderr();
    let exit = routeprobe_cli::run(std::env::args_os(), &mut stdout, &mut stderr);
    let _ = stdout.flush();
    exit
}
