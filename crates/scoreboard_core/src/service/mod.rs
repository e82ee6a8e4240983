//! Coordination and use-case services.
//!
//! # Responsibility
//! - Serialize writes (`write_coordinator`) and push live reads
//!   (`query_observer`) over any `PlayerStore` backend.
//! - Package the player actions used by front ends (`players`).

pub mod players;
pub mod query_observer;
pub mod write_coordinator;
