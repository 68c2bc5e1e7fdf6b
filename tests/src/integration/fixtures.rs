//! Shared scenario fixtures: an in-memory network around one
//! [`CustodyService`].

use std::sync::{Arc, Once};

use qc_18_vault_custody::adapters::{
    InMemoryCustodyStore, InMemoryEventSink, InMemoryLedger, InMemoryLiquidityWithdrawer,
    InMemoryOutboundQueue, InMemoryPolicyStore, StaticGasOracle,
};
use qc_18_vault_custody::{
    CustodyApi, CustodyConfig, CustodyDependencies, CustodyService, CustodyStore, KeygenOutcome,
    KeygenProgress, KeygenResultMsg, KeygenType, NodeAccount, NodeStatus, ObservedOutbound,
    OutboundQueue, TxOutItem,
};
use shared_types::{Asset, Chain, Coin, NodeAddress, PubKey, TxId};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a test subscriber once per process. `RUST_LOG` overrides the
/// default `warn` level.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub fn pk(id: u8) -> PubKey {
    PubKey([id; 33])
}

pub fn addr(id: u8) -> NodeAddress {
    NodeAddress([id; 20])
}

pub fn btc() -> Asset {
    Chain::Bitcoin.gas_asset()
}

pub fn eth() -> Asset {
    Chain::Ethereum.gas_asset()
}

/// Minimum bond of 1_000 and three chains.
pub fn scenario_config() -> CustodyConfig {
    CustodyConfig {
        minimum_bond: 1_000,
        supported_chains: vec![Chain::Thor, Chain::Bitcoin, Chain::Ethereum],
        ..Default::default()
    }
}

pub struct Network {
    pub store: Arc<InMemoryCustodyStore>,
    pub ledger: Arc<InMemoryLedger>,
    pub policy: Arc<InMemoryPolicyStore>,
    pub queue: Arc<InMemoryOutboundQueue>,
    pub events: Arc<InMemoryEventSink>,
    pub withdrawer: Arc<InMemoryLiquidityWithdrawer>,
    pub service: CustodyService,
}

impl Network {
    pub fn new(config: CustodyConfig, gas: StaticGasOracle) -> Self {
        init_tracing();
        let store = Arc::new(InMemoryCustodyStore::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let policy = Arc::new(InMemoryPolicyStore::new());
        let queue = Arc::new(InMemoryOutboundQueue::new());
        let events = Arc::new(InMemoryEventSink::new());
        let withdrawer = Arc::new(InMemoryLiquidityWithdrawer::new(
            store.clone(),
            queue.clone(),
        ));
        let service = CustodyService::new(
            config,
            CustodyDependencies {
                store: store.clone(),
                ledger: ledger.clone(),
                policy_store: policy.clone(),
                outbound: queue.clone(),
                gas: Arc::new(gas),
                withdrawer: withdrawer.clone(),
                events: events.clone(),
            },
        )
        .expect("scenario config is valid");
        Self {
            store,
            ledger,
            policy,
            queue,
            events,
            withdrawer,
            service,
        }
    }

    pub fn add_node(&self, id: u8, status: NodeStatus, bond: u128) {
        self.store
            .set_node_account(NodeAccount::new(addr(id), status, pk(id), bond))
            .expect("store accepts node");
    }

    /// `signer` reports a successful keygen of `vault` by `members`,
    /// requested at `requested`.
    pub fn report_keygen(
        &self,
        height: u64,
        requested: u64,
        members: &[u8],
        signer: u8,
        vault: PubKey,
        chains: &[Chain],
    ) -> KeygenProgress {
        let msg = KeygenResultMsg {
            height: requested,
            keygen_type: KeygenType::Asgard,
            members: members.iter().map(|m| pk(*m)).collect(),
            outcome: KeygenOutcome::Success {
                pool_pub_key: vault,
            },
            chains: chains.to_vec(),
            signer: addr(signer),
        };
        self.service
            .process_keygen_result(height, msg)
            .expect("keygen report accepted")
    }

    /// Every member reports in turn. Returns the progress of the last report.
    pub fn complete_keygen(
        &self,
        height: u64,
        requested: u64,
        members: &[u8],
        vault: PubKey,
        chains: &[Chain],
    ) -> KeygenProgress {
        let mut last = KeygenProgress::Pending;
        for member in members {
            last = self.report_keygen(height, requested, members, *member, vault, chains);
        }
        last
    }

    /// Items queued at exactly `height`.
    pub fn queued_at(&self, height: u64) -> Vec<TxOutItem> {
        self.queue
            .get_tx_out(height)
            .expect("queue readable")
            .items
    }

    /// Report that `item`, queued at `scheduled`, went out paying `gas`.
    pub fn observe(&self, height: u64, scheduled: u64, item: &TxOutItem, gas: u128, tx: u8) {
        let observed = ObservedOutbound {
            tx_id: TxId([tx; 32]),
            chain: item.chain,
            vault_pub_key: item.vault_pub_key,
            to_address: item.to_address.clone(),
            coins: vec![item.coin.clone()],
            gas: vec![Coin::new(item.chain.gas_asset(), gas)],
            memo: item.memo.clone(),
            scheduled_height: scheduled,
        };
        self.service
            .record_outbound_observed(height, observed)
            .expect("observation recorded");
    }
}
