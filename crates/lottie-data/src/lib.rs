//! Serde model of the Lottie JSON format.
//!
//! The model only types the parts of a composition that the optimizer reads or
//! rewrites. Everything else is carried through `extra` maps so that a
//! parse/serialize round trip keeps the file intact.

pub mod model;
