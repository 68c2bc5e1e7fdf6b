//! # Adapters Layer (Hexagonal Architecture)
//!
//! In-memory implementations of every outbound port. Used by the unit tests,
//! the scenario suite and local simulation.

mod events;
mod gas;
mod ledger;
mod liquidity;
mod memory_store;
mod outbound_queue;
mod policy;

pub use events::InMemoryEventSink;
pub use gas::StaticGasOracle;
pub use ledger::InMemoryLedger;
pub use liquidity::InMemoryLiquidityWithdrawer;
pub use memory_store::InMemoryCustodyStore;
pub use outbound_queue::InMemoryOutboundQueue;
pub use policy::InMemoryPolicyStore;
