//! Shared helpers: bit sequences, bit/byte packing and the tap-set enumeration.

pub mod bits;
pub mod combinations;
