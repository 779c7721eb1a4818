//! Utility functions and supporting infrastructure.
//!
//! Provides bit-level reading, the bounds-checked byte cursor used to walk
//! the stream, and error types.

pub mod bitstream_io;
pub mod cursor;
pub mod errors;
