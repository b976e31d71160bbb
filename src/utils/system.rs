// src/utils/system.rs: System functions

use sysinfo::System;


/// Physical cores on this machine, if sysinfo can tell.
pub fn physical_cores() -> Option<usize> {
    System::physical_core_count()
}


/// Checks the requested thread count against the hardware.
///
/// The count is handed to every tool unchanged; this only reports when the run
/// would oversubscribe the machine.
///
/// # Arguments
///
/// * `requested` - Thread count from the command line.
/// * `cores` - Detected physical cores, if known.
///
/// # Returns
///
/// Some(warning) when `requested` exceeds `cores`.
pub fn thread_advisory(requested: usize, cores: Option<usize>) -> Option<String> {
    match cores {
        Some(cores) if requested > cores => Some(format!(
            "Requested {} threads but only {} physical cores were detected; external tools may be oversubscribed",
            requested, cores
        )),
        _ => None,
    }
}
