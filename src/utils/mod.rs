pub mod artifacts;
pub mod command;
pub mod file;
pub mod process;
pub mod system;
