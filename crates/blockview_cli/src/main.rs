//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `blockview_core` linkage, logging and schema bootstrap from a shell.
//! - Keep output deterministic for quick local sanity checks.

use blockview_core::KernelConfig;
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = KernelConfig::from_env();
    match blockview_core::init_logging_from_config(&config) {
        Ok(()) => println!("blockview_core logging={}", config.log_dir.display()),
        Err(err) => eprintln!("blockview_core logging=disabled {err}"),
    }
    println!("blockview_core ping={}", blockview_core::ping());
    println!("blockview_core version={}", blockview_core::core_version());
    println!("blockview_core schema={}", blockview_core::schema_version());
    println!("blockview_core case_sensitive={}", config.case_sensitive);

    match blockview_core::open_db_in_memory() {
        Ok(_) => {
            println!("blockview_core db=ok");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("blockview_core db=error {err}");
            ExitCode::FAILURE
        }
    }
}
