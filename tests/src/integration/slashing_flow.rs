//! Penalties across evidence, keysign failures, overspends and stalled
//! outbounds.

use qc_18_vault_custody::adapters::StaticGasOracle;
use qc_18_vault_custody::{
    Blame, ByzantineEvidence, CustodyApi, CustodyEvent, CustodyStore, EvidenceKind,
    KeysignFailureMsg, Ledger, Memo, ModuleAccount, NodeStatus, ObservedOutbound, OutboundQueue,
    PolicyKey, PolicyStore, Pool, TxOutItem, Vault, VaultStatus, VaultType,
};
use qc_18_vault_custody::domain::{ObservedTx, ObservedTxVoter, KEYSIGN_ROUND_7};
use shared_types::{Asset, Chain, Coin, TxId};

use super::fixtures::{addr, btc, pk, scenario_config, Network};

const CHAINS: [Chain; 3] = [Chain::Thor, Chain::Bitcoin, Chain::Ethereum];

fn btc_pool(net: &Network) {
    let mut pool = Pool::new(btc());
    pool.balance_rune = 1_000;
    pool.balance_asset = 100;
    net.store.set_pool(pool).unwrap();
}

/// Active asgard vault `id` signed by `members`, holding `amount` BTC.
fn funded_vault(net: &Network, id: u8, members: &[u8], amount: u128) {
    let mut vault = Vault::new(
        1,
        VaultStatus::Active,
        VaultType::Asgard,
        pk(id),
        CHAINS.to_vec(),
        vec![],
    )
    .with_membership(members.iter().map(|m| pk(*m)).collect());
    vault.add_funds(&[Coin::new(btc(), amount)]);
    net.store.set_vault(vault).unwrap();
}

/// Outbound of `amount` BTC to a user, paid from `vault` and backed by an
/// observed inbound signed by `observers`.
fn queue_outbound(net: &Network, height: u64, vault: u8, amount: u128, observers: &[u8]) -> TxId {
    let in_hash = TxId([42; 32]);
    let mut item = TxOutItem::new(
        Chain::Bitcoin,
        "bc1user".into(),
        Coin::new(btc(), amount),
        Memo::Outbound { in_hash },
    );
    item.vault_pub_key = pk(vault);
    item.in_hash = Some(in_hash);
    item.max_gas = vec![Coin::new(btc(), 1)];

    let mut voter = ObservedTxVoter::new(in_hash, height - 10);
    voter.finalised_height = height;
    voter.txs.push(ObservedTx {
        tx_id: in_hash,
        signers: observers.iter().map(|o| addr(*o)).collect(),
    });
    voter.actions.push(item.clone());
    net.store.set_observed_tx_voter(voter).unwrap();
    net.queue.unsafe_add_tx_out_item(height, item).unwrap();
    in_hash
}

#[test]
fn test_begin_block_applies_only_fresh_duplicate_votes() {
    let net = Network::new(scenario_config(), StaticGasOracle::new());
    net.add_node(1, NodeStatus::Active, 1_000_000);
    net.add_node(2, NodeStatus::Active, 1_000_000);
    net.ledger
        .mint(ModuleAccount::Bond, &Coin::new(Asset::rune(), 2_000_000))
        .unwrap();

    net.service.begin_block(
        100,
        &[
            ByzantineEvidence {
                validator: addr(1),
                height: 95,
                kind: EvidenceKind::DuplicateVote,
            },
            ByzantineEvidence {
                validator: addr(2),
                height: 10,
                kind: EvidenceKind::DuplicateVote,
            },
            ByzantineEvidence {
                validator: addr(2),
                height: 99,
                kind: EvidenceKind::LightClientAttack,
            },
            ByzantineEvidence {
                validator: addr(9),
                height: 99,
                kind: EvidenceKind::DuplicateVote,
            },
        ],
    );

    assert_eq!(net.store.get_node_account(&addr(1)).unwrap().bond, 999_950);
    assert_eq!(net.store.get_node_account(&addr(2)).unwrap().bond, 1_000_000);
    assert_eq!(
        net.ledger.balance_of(ModuleAccount::Reserve, &Asset::rune()),
        50
    );
}

#[test]
fn test_final_round_keysign_failure_freezes_and_jails() {
    let net = Network::new(scenario_config(), StaticGasOracle::new());
    for id in 1..=3 {
        net.add_node(id, NodeStatus::Active, 10_000);
    }
    net.service.genesis(1).unwrap();
    net.complete_keygen(2, 1, &[1, 2, 3], pk(100), &CHAINS);

    let report = |signer: u8| KeysignFailureMsg {
        height: 20,
        vault_pub_key: pk(100),
        memo: "OUT:2A".to_string(),
        coins: vec![Coin::new(btc(), 5)],
        blame: Blame::new("signing timeout", KEYSIGN_ROUND_7, vec![pk(3)]),
        signer: addr(signer),
    };
    assert!(!net.service.process_keysign_failure(30, report(1)).unwrap());
    assert!(net.service.process_keysign_failure(30, report(2)).unwrap());

    let vault = net.store.get_vault(&pk(100)).unwrap();
    assert!(vault.is_frozen(Chain::Bitcoin));
    assert!(!vault.is_frozen(Chain::Ethereum));
    assert_eq!(net.store.slash_points(&addr(3)), 2);
    assert!(net.store.get_node_account(&addr(3)).unwrap().is_jailed(50));
    assert_eq!(net.store.slash_points(&addr(1)), 0);
    assert_eq!(
        net.events
            .count(|e| matches!(e, CustodyEvent::VaultFrozen { .. })),
        1
    );
}

#[test]
fn test_observed_overspend_slashes_members_and_halts_chain() {
    let net = Network::new(scenario_config(), StaticGasOracle::new());
    net.add_node(1, NodeStatus::Active, 10_000);
    net.add_node(2, NodeStatus::Active, 10_000);
    net.ledger
        .mint(ModuleAccount::Bond, &Coin::new(Asset::rune(), 20_000))
        .unwrap();
    net.policy.set(PolicyKey::PauseOnSlashThreshold, 1_000).unwrap();
    btc_pool(&net);
    funded_vault(&net, 100, &[1, 2], 100);
    let in_hash = queue_outbound(&net, 50, 100, 10, &[1, 2]);

    net.service
        .record_outbound_observed(
            60,
            ObservedOutbound {
                tx_id: TxId([7; 32]),
                chain: Chain::Bitcoin,
                vault_pub_key: pk(100),
                to_address: "bc1user".into(),
                coins: vec![Coin::new(btc(), 60)],
                gas: vec![Coin::new(btc(), 1)],
                memo: Memo::Outbound { in_hash },
                scheduled_height: 50,
            },
        )
        .unwrap();

    let vault = net.store.get_vault(&pk(100)).unwrap();
    assert_eq!(vault.get_coin(&btc()).amount, 39);
    let voter = net.store.get_observed_tx_voter(&in_hash).unwrap().unwrap();
    assert_eq!(voter.out_txs, vec![TxId([7; 32])]);

    // 50 BTC over: worth 1_000 RUNE, slashed at 1.5x
    for id in 1..=2 {
        assert_eq!(net.store.get_node_account(&addr(id)).unwrap().bond, 9_250);
    }
    assert_eq!(
        net.ledger.balance_of(ModuleAccount::Asgard, &Asset::rune()),
        1_000
    );
    assert_eq!(
        net.ledger.balance_of(ModuleAccount::Reserve, &Asset::rune()),
        500
    );
    let pool = net.store.get_pool(&btc()).unwrap();
    assert_eq!((pool.balance_asset, pool.balance_rune), (50, 2_000));
    assert!(net.service.policy().is_chain_halted(Chain::Bitcoin, 60));
}

#[test]
fn test_stalled_outbound_moves_to_another_vault() {
    let net = Network::new(
        scenario_config(),
        StaticGasOracle::new().with_max_gas(Chain::Bitcoin, 1),
    );
    net.add_node(1, NodeStatus::Active, 10_000);
    net.add_node(2, NodeStatus::Active, 10_000);
    btc_pool(&net);
    funded_vault(&net, 50, &[1], 100);
    funded_vault(&net, 51, &[2], 100);
    let in_hash = queue_outbound(&net, 100, 50, 10, &[1]);

    net.service.end_block(400);

    // node 2 never attested the inbound
    assert_eq!(net.store.slash_points(&addr(2)), 2);
    assert_eq!(net.store.slash_points(&addr(1)), 0);

    let original = net.queued_at(100).remove(0);
    assert_eq!(original.out_hash, Some(TxId::BLANK));
    let moved = net.queued_at(400);
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].vault_pub_key, pk(51));
    let voter = net.store.get_observed_tx_voter(&in_hash).unwrap().unwrap();
    assert_eq!(voter.actions[0].vault_pub_key, pk(51));

    net.observe(401, 400, &moved[0], 1, 9);
    assert_eq!(
        net.store.get_vault(&pk(51)).unwrap().get_coin(&btc()).amount,
        89
    );

    // signed now, so nothing is moved again
    net.service.end_block(700);
    assert!(net.queued_at(700).is_empty());
}
