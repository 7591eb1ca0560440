// crates/tessera-slot/src/lib.rs
//
// tessera-slot: slot and phase timing for the Tessera Protocol.
//
// A slot is one full consensus cycle; phases are sub-intervals computed
// purely from wall-clock time against a shared epoch start. Because phase
// math needs no rendezvous, a validator can join mid-slot and land in the
// same slot and phase as every other validator.

pub mod config;
pub mod coordinator;
pub mod phase;

pub use config::SlotConfig;
pub use coordinator::{SlotCoordinator, SlotPosition};
pub use phase::SlotPhase;
