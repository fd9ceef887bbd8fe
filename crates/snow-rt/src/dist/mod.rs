//! Distribution subsystem for Snow.
//!
//! Provides PID bit-packing helpers and the Snow Term Format (STF)
//! binary serializer/deserializer for inter-node message transport.

pub mod wire;
