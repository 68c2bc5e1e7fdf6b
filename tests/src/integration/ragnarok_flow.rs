//! Pool and chain retirement driven by end-of-block processing.

use qc_18_vault_custody::adapters::StaticGasOracle;
use qc_18_vault_custody::{
    CustodyApi, CustodyConfig, CustodyEvent, CustodyStore, LiquidityProvider, Memo, NodeStatus,
    PolicyKey, PolicyStore, Pool, PoolStatus, Vault, VaultStatus, VaultType,
};
use shared_types::{Asset, Chain, Coin};

use super::fixtures::{btc, eth, pk, scenario_config, Network};

fn seed_pool(net: &Network, asset: Asset, providers: u8) {
    let mut pool = Pool::new(asset.clone());
    pool.balance_rune = 1_000;
    pool.balance_asset = 100;
    pool.lp_units = u128::from(providers) * 10;
    net.store.set_pool(pool).unwrap();
    for i in 0..providers {
        let mut lp = LiquidityProvider::new(
            asset.clone(),
            Some(format!("thor1lp{i}")),
            Some(format!("ext1lp{i}")),
        );
        lp.units = 10;
        net.store.add_liquidity_provider(lp);
    }
}

#[test]
fn test_pool_ragnarok_withdraws_in_batches() {
    let config = CustodyConfig {
        ragnarok_positions_per_block: 2,
        ..scenario_config()
    };
    let net = Network::new(config, StaticGasOracle::new());
    net.add_node(1, NodeStatus::Active, 10_000);
    net.service.genesis(1).unwrap();
    seed_pool(&net, btc(), 5);
    net.policy.set(PolicyKey::RagnarokPool(btc()), 1).unwrap();

    let mut progress = Vec::new();
    for height in [360u64, 720, 1_080, 1_440] {
        net.service.end_block(height);
        let pool = net.store.get_pool(&btc()).unwrap();
        progress.push((pool.status, net.store.liquidity_provider_count(&btc())));
    }
    assert_eq!(
        progress,
        vec![
            (PoolStatus::Staged, 5),
            (PoolStatus::Staged, 3),
            (PoolStatus::Staged, 1),
            (PoolStatus::Suspended, 0),
        ]
    );

    // each position paid out on both sides
    let payouts: Vec<_> = net
        .queue
        .all_items()
        .into_iter()
        .filter(|i| matches!(i.memo, Memo::Ragnarok { .. }))
        .collect();
    assert_eq!(payouts.len(), 10);
    let pool = net.store.get_pool(&btc()).unwrap();
    assert_eq!(pool.lp_units, 0);
    assert_eq!(pool.balance_asset, 0);
    assert_eq!(pool.status_since, 1_440);

    // a suspended pool is left alone
    net.service.end_block(1_800);
    assert_eq!(net.store.get_pool(&btc()).unwrap(), pool);
}

#[test]
fn test_retired_chain_recalls_then_withdraws() {
    let net = Network::new(scenario_config(), StaticGasOracle::new());
    net.add_node(1, NodeStatus::Active, 10_000);

    let active = Vault::new(
        0,
        VaultStatus::Active,
        VaultType::Asgard,
        pk(50),
        vec![Chain::Thor, Chain::Bitcoin],
        vec![],
    )
    .with_membership(vec![pk(1)]);
    net.store.set_vault(active).unwrap();
    let mut retiring = Vault::new(
        5,
        VaultStatus::Retiring,
        VaultType::Asgard,
        pk(60),
        vec![Chain::Thor, Chain::Bitcoin, Chain::Ethereum],
        vec![],
    )
    .with_membership(vec![pk(1)]);
    retiring.add_funds(&[Coin::new(eth(), 10)]);
    net.store.set_vault(retiring).unwrap();
    let mut ygg = Vault::new(
        0,
        VaultStatus::Active,
        VaultType::Yggdrasil,
        pk(1),
        vec![Chain::Ethereum],
        vec![],
    );
    ygg.add_funds(&[Coin::new(eth(), 7)]);
    net.store.set_vault(ygg).unwrap();
    seed_pool(&net, eth(), 1);

    // round one: yggdrasil funds are called back
    net.service.end_block(10);
    let recalls = net.queued_at(10);
    assert_eq!(recalls.len(), 1);
    assert_eq!(recalls[0].vault_pub_key, pk(1));
    assert_eq!(recalls[0].memo, Memo::YggdrasilReturn { height: 10 });
    assert_eq!(recalls[0].to_address, pk(50).address_for(Chain::Ethereum));

    // round two: liquidity is forced out and the gas pool suspended
    net.service.end_block(365);
    let payouts = net
        .queued_at(365)
        .into_iter()
        .filter(|i| matches!(i.memo, Memo::Ragnarok { .. }))
        .count();
    assert_eq!(payouts, 2);
    assert_eq!(
        net.store.get_pool(&eth()).unwrap().status,
        PoolStatus::Suspended
    );
    assert_eq!(net.store.liquidity_provider_count(&eth()), 0);
    assert_eq!(
        net.events.count(|e| matches!(e, CustodyEvent::RecallScheduled { .. })),
        1
    );
}
