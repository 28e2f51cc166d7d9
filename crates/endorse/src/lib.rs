//! Endorsement pipeline for ledgergate.
//!
//! - **Planner**: picks the peers whose endorsements satisfy a chaincode's
//!   policy, preferring the gateway's own peer
//! - **Collector**: sends a signed proposal to every planned peer at once
//!   under a shared deadline
//! - **Assembler**: checks that the endorsers agree and builds the unsigned
//!   transaction envelope

pub mod assembler;
pub mod collector;
pub mod planner;

// Re-export commonly used types
pub use assembler::{assemble, AssembledTransaction, AssemblyError};
pub use collector::{OutcomeError, ProposalCollector, ProposalOutcome};
pub use planner::{EndorsementPlanner, PlanError};
