//! A retiring vault drained into its successor over the migration rounds.

use qc_18_vault_custody::adapters::StaticGasOracle;
use qc_18_vault_custody::{
    CustodyApi, CustodyConfig, CustodyEvent, CustodyStore, Memo, NodeStatus, Pool, VaultStatus,
};
use shared_types::{Chain, Coin};
use tracing::info;

use super::fixtures::{btc, pk, scenario_config, Network};

const CHAINS: [Chain; 3] = [Chain::Thor, Chain::Bitcoin, Chain::Ethereum];

/// Vault pk(100) holding `funded` BTC retires in favour of pk(101) at 1_001.
fn churned_network(funded: u128) -> Network {
    let net = Network::new(
        scenario_config(),
        StaticGasOracle::new().with_max_gas(Chain::Bitcoin, 1),
    );
    for id in 1..=4 {
        net.add_node(id, NodeStatus::Active, 10_000);
    }
    let mut pool = Pool::new(btc());
    pool.balance_rune = 1_000;
    pool.balance_asset = 100;
    net.store.set_pool(pool).unwrap();

    net.service.genesis(1).unwrap();
    net.complete_keygen(2, 1, &[1, 2, 3, 4], pk(100), &CHAINS);
    let mut old = net.store.get_vault(&pk(100)).unwrap();
    old.add_funds(&[Coin::new(btc(), funded)]);
    net.store.set_vault(old).unwrap();

    net.add_node(5, NodeStatus::Ready, 10_000);
    net.service
        .trigger_keygen(1_000, vec![pk(2), pk(3), pk(4), pk(5)])
        .unwrap();
    net.complete_keygen(1_001, 1_000, &[2, 3, 4, 5], pk(101), &CHAINS);
    net
}

#[test]
fn test_retiring_vault_drained_over_rounds() {
    let net = churned_network(100);

    let mut migrated = Vec::new();
    for height in 1_001..=2_500u64 {
        net.service.end_block(height);
        for item in net.queued_at(height) {
            assert!(matches!(item.memo, Memo::Migrate { .. }));
            assert_eq!(item.vault_pub_key, pk(100));
            info!(height, coin = %item.coin, "migration observed");
            net.observe(height + 1, height, &item, 1, migrated.len() as u8 + 1);
            migrated.push((height, item.coin.amount));
        }
    }

    assert_eq!(
        migrated,
        vec![(1_001, 19), (1_361, 31), (1_721, 27), (2_081, 15), (2_441, 3)]
    );
    let old = net.store.get_vault(&pk(100)).unwrap();
    assert!(!old.has_funds());
    assert_eq!(old.status, VaultStatus::Inactive);
    assert_eq!(old.outbound_tx_count, 5);
    // one unit of gas per round
    let new = net.store.get_vault(&pk(101)).unwrap();
    assert_eq!(new.get_coin(&btc()).amount, 95);
    assert_eq!(
        net.events
            .count(|e| matches!(e, CustodyEvent::MigrationScheduled { .. })),
        5
    );
}

#[test]
fn test_unobserved_migration_blocks_next_round_within_window() {
    let config = CustodyConfig {
        fund_migration_interval: 100,
        ..scenario_config()
    };
    let net = Network::new(config, StaticGasOracle::new().with_max_gas(Chain::Bitcoin, 1));
    for id in 1..=2 {
        net.add_node(id, NodeStatus::Active, 10_000);
    }
    net.service.genesis(1).unwrap();
    net.complete_keygen(2, 1, &[1, 2], pk(100), &CHAINS);
    let mut old = net.store.get_vault(&pk(100)).unwrap();
    old.add_funds(&[Coin::new(btc(), 100)]);
    net.store.set_vault(old).unwrap();
    net.service.trigger_keygen(10, vec![pk(1)]).unwrap();
    net.complete_keygen(11, 10, &[1], pk(101), &CHAINS);

    net.service.end_block(11);
    assert_eq!(net.queued_at(11).len(), 1);

    // round two is due but the first transfer is still unsigned
    net.service.end_block(111);
    assert!(net.queued_at(111).is_empty());

    let first = net.queued_at(11).remove(0);
    net.observe(112, 11, &first, 1, 1);
    net.service.end_block(211);
    assert_eq!(net.queued_at(211).len(), 1);
}
