//! Shared data model for the settlement workspace.
//!
//! Orders, output descriptions, fill records, the execution context every
//! state transition receives, the Solidity ABI bindings used for hashing and
//! callbacks, the protocol event bus and configuration schema validation.

pub mod abi;
pub mod context;
pub mod events;
pub mod order;
pub mod primitives;
pub mod standards;
pub mod validation;

pub use context::*;
pub use events::*;
pub use order::*;
pub use primitives::*;
pub use standards::eip7683::*;
pub use validation::*;
