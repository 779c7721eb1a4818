//! Data structures representing SBC frame components.
//!
//! - **Header** ([`header`]): packed 4-byte frame header
//! - **Geometry** ([`geometry`]): derived channel/block/subband counts and frame length
//! - **Allocation** ([`allocation`]): per-subband bit allocation
//! - **Synthesis** ([`synthesis`]): polyphase synthesis filter bank

pub mod allocation;
pub mod geometry;
pub mod header;
pub mod synthesis;
