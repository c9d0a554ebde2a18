//! Shared types used across the adoption lifecycle engine.

pub mod types;

pub use types::{Actor, ActorKind, AdoptionId, CompanyId, ProductId};
