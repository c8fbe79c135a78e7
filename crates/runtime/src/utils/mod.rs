//! Helpers shared by the runtime and its tests.

pub mod hash;
