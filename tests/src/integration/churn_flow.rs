//! Genesis, keygen and rotation across several churns.

use qc_18_vault_custody::adapters::StaticGasOracle;
use qc_18_vault_custody::{
    CustodyApi, CustodyEvent, CustodyStore, KeygenProgress, NodeStatus, VaultStatus,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use shared_types::Chain;

use super::fixtures::{addr, pk, scenario_config, Network};

const CHAINS: [Chain; 3] = [Chain::Thor, Chain::Bitcoin, Chain::Ethereum];

fn network_with_nodes(ids: &[u8]) -> Network {
    let net = Network::new(scenario_config(), StaticGasOracle::new());
    for id in ids {
        net.add_node(*id, NodeStatus::Active, 10_000);
    }
    net
}

#[test]
fn test_genesis_then_churn_retires_old_vault() {
    let net = network_with_nodes(&[1, 2, 3, 4]);

    net.service.genesis(1).unwrap();
    let progress = net.complete_keygen(2, 1, &[1, 2, 3, 4], pk(100), &CHAINS);
    assert_eq!(progress, KeygenProgress::VaultCreated(pk(100)));
    let first = net.store.get_vault(&pk(100)).unwrap();
    assert_eq!(first.status, VaultStatus::Active);
    assert_eq!(first.chains, CHAINS.to_vec());

    // node 1 leaves, node 5 joins
    net.add_node(5, NodeStatus::Ready, 10_000);
    net.service
        .trigger_keygen(1_000, vec![pk(2), pk(3), pk(4), pk(5)])
        .unwrap();
    let progress = net.complete_keygen(1_001, 1_000, &[2, 3, 4, 5], pk(101), &CHAINS);
    assert_eq!(progress, KeygenProgress::VaultCreated(pk(101)));

    let old = net.store.get_vault(&pk(100)).unwrap();
    assert_eq!(old.status, VaultStatus::Retiring);
    assert_eq!(old.status_since, 1_001);
    assert_eq!(
        net.store.get_vault(&pk(101)).unwrap().status,
        VaultStatus::Active
    );
    let leaving = net.store.get_node_account(&addr(1)).unwrap();
    assert!(leaving.signer_membership.contains(&pk(100)));
    assert!(!leaving.signer_membership.contains(&pk(101)));
    let joining = net.store.get_node_account(&addr(5)).unwrap();
    assert_eq!(joining.signer_membership, vec![pk(101)]);

    // the old vault held nothing, so the next block retires it for good
    net.service.end_block(1_002);
    assert_eq!(
        net.store.get_vault(&pk(100)).unwrap().status,
        VaultStatus::Inactive
    );
    let indexed: Vec<_> = net
        .store
        .asgard_vaults()
        .unwrap()
        .into_iter()
        .map(|v| v.pub_key)
        .collect();
    assert_eq!(indexed, vec![pk(101)]);

    let inactive = net.events.count(|e| {
        matches!(
            e,
            CustodyEvent::VaultStatusChanged {
                status: VaultStatus::Inactive,
                ..
            }
        )
    });
    assert_eq!(inactive, 1);
}

#[test]
fn test_repeated_churn_request_is_rejected() {
    let net = network_with_nodes(&[1, 2, 3]);
    net.service.genesis(1).unwrap();
    net.complete_keygen(2, 1, &[1, 2, 3], pk(100), &CHAINS);

    let err = net
        .service
        .trigger_keygen(50, vec![pk(1), pk(2), pk(3)])
        .unwrap_err();
    assert!(err.to_string().contains("identical membership"));
    assert!(net.store.get_keygen_block(50).unwrap().is_none());
}

/// Snapshot of everything a keygen outcome decides.
fn keygen_outcome_snapshot(net: &Network) -> (VaultStatus, Vec<u64>, Vec<bool>) {
    let vault = net.store.get_vault(&pk(100)).unwrap();
    let points = (1..=4).map(|id| net.store.slash_points(&addr(id))).collect();
    let jailed = (1..=4)
        .map(|id| net.store.get_node_account(&addr(id)).unwrap().is_jailed(11))
        .collect();
    (vault.status, points, jailed)
}

#[test]
fn test_keygen_outcome_independent_of_report_order() {
    let mut expected = None;
    for seed in 0..8u64 {
        let net = network_with_nodes(&[1, 2, 3, 4]);
        net.service
            .trigger_keygen(10, (1..=4).map(pk).collect())
            .unwrap();

        let mut order = vec![1u8, 2, 3, 4];
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        let mut progress = Vec::new();
        for id in &order {
            progress.push(net.report_keygen(11, 10, &[1, 2, 3, 4], *id, pk(100), &CHAINS));
        }
        assert_eq!(progress[2], KeygenProgress::AwaitingStragglers);
        assert_eq!(progress[3], KeygenProgress::VaultCreated(pk(100)));

        let snapshot = keygen_outcome_snapshot(&net);
        match &expected {
            None => expected = Some(snapshot),
            Some(first) => assert_eq!(&snapshot, first, "seed {seed}"),
        }
    }
    let (status, points, jailed) = expected.unwrap();
    assert_eq!(status, VaultStatus::Active);
    assert_eq!(points, vec![0; 4]);
    assert_eq!(jailed, vec![false; 4]);
}
