//! Domain layer for vault custody.

pub mod cursor;
pub mod evidence;
pub mod keygen;
pub mod majority;
pub mod node;
pub mod observed;
pub mod outbound;
pub mod pool;
pub mod vault;
pub mod voter;

pub use cursor::{Page, PageRequest, WorkBudget};
pub use evidence::{ByzantineEvidence, EvidenceKind};
pub use keygen::{ceremony_id, CeremonyId, Keygen, KeygenBlock, KeygenType};
pub use majority::{has_simple_majority, has_super_majority, Ratio};
pub use node::{Jail, NodeAccount, NodeStatus};
pub use observed::{ObservedTx, ObservedTxVoter};
pub use outbound::{Memo, TxOut, TxOutItem};
pub use pool::{LiquidityProvider, Pool, PoolStatus};
pub use vault::{ChainContract, Vault, VaultSet, VaultStatus, VaultType};
pub use voter::{
    keysign_attempt_id, Blame, ConsensusVoter, KeygenOutcome, KeygenVoter, KeysignFailVoter,
    KEYSIGN_ROUND_7,
};
