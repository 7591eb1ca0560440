// crates/tessera-p2p/src/lib.rs
//
// tessera-p2p: the score exchange between validators.
//
// Outbound: a validator signs its local scores for a cycle and pushes them
// to every configured peer concurrently; an unreachable peer is never
// fatal to the round. Inbound: submissions pass a validation pipeline
// (loop-back, cycle window, signature, address binding) before they are
// accepted idempotently into the per-cycle score book.

pub mod broadcast;
pub mod exchange;
pub mod peers;

pub use broadcast::{broadcast_scores, sign_submission};
pub use exchange::{RejectReason, ScoreExchange};
pub use peers::{PeerRegistry, PeerState};
