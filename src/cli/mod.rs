pub mod command;
pub mod decode;
pub mod progress;
pub mod report;
