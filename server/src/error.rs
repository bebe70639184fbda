//! Error types for the simulation core and the transport around it.

use shared::EntityId;
use thiserror::Error;

/// Raised when no identifier is left below the allocator's ceiling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("entity id space exhausted: all {capacity} ids below 2^{bits} are in use")]
    Exhausted { bits: u32, capacity: u64 },
}

/// Failure of a single entity's per-tick update. Isolated to that entity.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntityError {
    #[error("entity {id} produced a non-finite position")]
    NonFinitePosition { id: EntityId },
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("packet encoding failed: {0}")]
    Encode(#[from] bincode::Error),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("invalid zone table: {0}")]
    InvalidZones(String),
}

pub type ServerResult<T> = Result<T, ServerError>;
