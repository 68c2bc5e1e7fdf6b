//! Churn orchestration: bootstrap, keygen requests and vault rotation.
//!
//! [`CustodyService::rotate`] is the only place a vault becomes `Active`.
//! It writes the retired vaults, the member index updates and the new vault
//! in one atomic batch.

use shared_types::PubKey;
use tracing::{error, info};

use super::CustodyService;
use crate::domain::{Keygen, KeygenBlock, KeygenType, Vault, VaultStatus, VaultType};
use crate::error::{CustodyError, CustodyResult};
use crate::events::CustodyEvent;
use crate::metrics;
use crate::ports::outbound::StateOperation;

impl CustodyService {
    pub(crate) fn bootstrap_genesis(&self, height: u64) -> CustodyResult<()> {
        self.config().validate()?;
        if !self.store.asgard_vaults()?.is_empty() {
            info!(height, "[qc-18] asgard vault already exists, skipping genesis");
            return Ok(());
        }

        let mut active = self.store.list_active_validators()?;
        match active.len() {
            0 => Err(CustodyError::CannotProceed {
                reason: "no active accounts, cannot proceed".to_string(),
            }),
            1 => {
                let mut node = active.remove(0);
                let chains = self.config().supported_chains.clone();
                let routers = self.chain_contracts(&chains);
                let vault = Vault::new(
                    height,
                    VaultStatus::Active,
                    VaultType::Asgard,
                    node.signer_pub_key,
                    chains,
                    routers,
                )
                .with_membership(vec![node.signer_pub_key]);
                node.try_add_signer_pub_key(vault.pub_key);

                let pub_key = vault.pub_key;
                self.store.atomic_batch_write(vec![
                    StateOperation::PutVault(vault),
                    StateOperation::PutNode(node),
                ])?;
                info!(vault = %pub_key, height, "[qc-18] genesis vault created");
                self.emit(CustodyEvent::VaultStatusChanged {
                    pub_key,
                    status: VaultStatus::Active,
                    height,
                });
                Ok(())
            }
            _ => {
                let members = active.iter().map(|n| n.signer_pub_key).collect();
                self.request_keygen(height, members)
            }
        }
    }

    /// Record a keygen request for `members` at `height`.
    ///
    /// An active vault with identical membership is rejected without any
    /// write. Unfunded `Init` vaults from abandoned ceremonies are retired.
    pub(crate) fn request_keygen(&self, height: u64, members: Vec<PubKey>) -> CustodyResult<()> {
        if self.policy.is_churn_halted(height) {
            info!(height, "[qc-18] churn event skipped due to halted churning");
            return Ok(());
        }

        let keygen = Keygen::new(height, members, KeygenType::Asgard);
        let active = self.store.asgard_vaults_by_status(VaultStatus::Active)?;
        if let Some(existing) = active.iter().find(|v| v.membership_equals(&keygen.members)) {
            info!(vault = %existing.pub_key, "[qc-18] skip keygen due to vault already existing");
            return Err(CustodyError::DuplicateMembership {
                pubkey: existing.pub_key,
            });
        }

        let mut block = self
            .store
            .get_keygen_block(height)?
            .unwrap_or_else(|| KeygenBlock::new(height));
        if !block.contains(&keygen) {
            self.emit(CustodyEvent::KeygenRequested {
                height,
                members: keygen.members.clone(),
            });
            block.keygens.push(keygen);
        }
        self.store.set_keygen_block(block)?;

        let init = match self.store.asgard_vaults_by_status(VaultStatus::Init) {
            Ok(init) => init,
            Err(e) => {
                error!(error = %e, "[qc-18] fail to get init vaults");
                return Ok(());
            }
        };
        for mut vault in init.into_iter().filter(|v| !v.has_funds()) {
            vault.update_status(VaultStatus::Inactive, height);
            let pub_key = vault.pub_key;
            match self.store.set_vault(vault) {
                Ok(()) => self.emit(CustodyEvent::VaultStatusChanged {
                    pub_key,
                    status: VaultStatus::Inactive,
                    height,
                }),
                Err(e) => error!(vault = %pub_key, error = %e, "[qc-18] fail to save vault"),
            }
        }
        Ok(())
    }

    /// Promote `vault` to `Active`, retiring every active vault that shares a
    /// member with it.
    pub(crate) fn rotate(&self, height: u64, mut vault: Vault) -> CustodyResult<()> {
        if vault.status != VaultStatus::Init {
            return Err(CustodyError::InvalidTransition {
                pubkey: vault.pub_key,
                reason: format!("cannot rotate a vault in status {}", vault.status),
            });
        }
        if vault.membership().is_empty() {
            return Err(CustodyError::InvalidTransition {
                pubkey: vault.pub_key,
                reason: "vault has no members".to_string(),
            });
        }

        let mut ops = Vec::new();
        let mut retired = Vec::new();
        for mut asgard in self.store.asgard_vaults_by_status(VaultStatus::Active)? {
            if asgard.pub_key != vault.pub_key && asgard.shares_member_with(&vault) {
                asgard.update_status(VaultStatus::Retiring, height);
                retired.push(asgard.pub_key);
                ops.push(StateOperation::PutVault(asgard));
            }
        }

        for member in vault.membership() {
            let mut node = self.store.get_node_account_by_pub_key(member)?;
            node.try_add_signer_pub_key(vault.pub_key);
            ops.push(StateOperation::PutNode(node));
        }

        vault.update_status(VaultStatus::Active, height);
        let pub_key = vault.pub_key;
        ops.push(StateOperation::PutVault(vault));
        self.store.atomic_batch_write(ops)?;

        for retired in retired {
            info!(vault = %retired, height, "[qc-18] asgard vault retiring");
            self.emit(CustodyEvent::VaultStatusChanged {
                pub_key: retired,
                status: VaultStatus::Retiring,
                height,
            });
        }
        info!(vault = %pub_key, height, "[qc-18] asgard vault active");
        self.emit(CustodyEvent::VaultStatusChanged {
            pub_key,
            status: VaultStatus::Active,
            height,
        });
        metrics::record_vault_rotated();

        if let Err(e) = self.cleanup_asgard_index() {
            error!(error = %e, "[qc-18] fail to clean up asgard index");
        }
        Ok(())
    }
}
