//! This module holds typed parameters for various endpoint inputs.
//!
//! By using typed parameters, inputs are validated (by type) and correctly
//! formatted before they reach the push engine.

pub(crate) mod connection;
pub(crate) mod stream;
