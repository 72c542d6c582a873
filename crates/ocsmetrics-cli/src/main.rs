use clap::Parser;
use ocsmetrics::{Cli, run};
use std::process::ExitCode;

fn main() -> ExitCode {
    // Piping a report into `head` ends with a closed stdout
    #[cfg(unix)]
    restore_default_sigpipe();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(unix)]
fn restore_default_sigpipe() {
    // SAFETY: runs before any other thread exists
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}
