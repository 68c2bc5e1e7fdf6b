//! # Core Domain Entities
//!
//! Chains, assets, coins and the key types that identify vaults, nodes and
//! transactions.
//!
//! ## Clusters
//!
//! - **Ledger**: `Chain`, `Asset`, `Coin`
//! - **Identity**: `PubKey`, `NodeAddress`
//! - **Transactions**: `TxId`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha2::{Digest, Sha256};

use crate::errors::ParseError;

// =============================================================================
// CLUSTER A: THE LEDGER
// =============================================================================

/// One base unit scaled to eight decimals.
pub const ONE: u128 = 100_000_000;

/// Decimal precision every internal amount is expressed in.
pub const NATIVE_DECIMALS: u8 = 8;

/// External chains the network custodies funds on, plus the native chain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Chain {
    /// The native chain; its gas asset is RUNE.
    Thor,
    Bitcoin,
    Ethereum,
    Binance,
    Litecoin,
    BitcoinCash,
    Dogecoin,
    Avalanche,
    Gaia,
}

impl Chain {
    /// Every supported chain in canonical order.
    pub const ALL: [Chain; 9] = [
        Chain::Thor,
        Chain::Bitcoin,
        Chain::Ethereum,
        Chain::Binance,
        Chain::Litecoin,
        Chain::BitcoinCash,
        Chain::Dogecoin,
        Chain::Avalanche,
        Chain::Gaia,
    ];

    /// Ticker used in asset strings and policy keys.
    pub fn ticker(&self) -> &'static str {
        match self {
            Chain::Thor => "THOR",
            Chain::Bitcoin => "BTC",
            Chain::Ethereum => "ETH",
            Chain::Binance => "BNB",
            Chain::Litecoin => "LTC",
            Chain::BitcoinCash => "BCH",
            Chain::Dogecoin => "DOGE",
            Chain::Avalanche => "AVAX",
            Chain::Gaia => "GAIA",
        }
    }

    /// The asset used to pay transaction fees on this chain.
    pub fn gas_asset(&self) -> Asset {
        let symbol = match self {
            Chain::Thor => "RUNE",
            Chain::Gaia => "ATOM",
            other => other.ticker(),
        };
        Asset::new(*self, symbol)
    }

    /// True for the chain this network itself runs on.
    pub fn is_native(&self) -> bool {
        matches!(self, Chain::Thor)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ticker())
    }
}

impl FromStr for Chain {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        Chain::ALL
            .iter()
            .copied()
            .find(|c| c.ticker() == upper)
            .ok_or_else(|| ParseError::UnknownChain(s.to_string()))
    }
}

/// An asset identified by its home chain and symbol.
///
/// Synthetic assets live on the native chain but mirror an external asset;
/// they render with a `/` separator (`BTC/BTC`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Asset {
    pub chain: Chain,
    pub symbol: String,
    pub synth: bool,
}

impl Asset {
    pub fn new(chain: Chain, symbol: &str) -> Self {
        Self {
            chain,
            symbol: symbol.to_ascii_uppercase(),
            synth: false,
        }
    }

    /// The native settlement asset.
    pub fn rune() -> Self {
        Chain::Thor.gas_asset()
    }

    pub fn is_rune(&self) -> bool {
        self.chain.is_native() && !self.synth && self.symbol == "RUNE"
    }

    /// Native-chain assets never leave the network, so vaults never migrate them.
    pub fn is_native(&self) -> bool {
        self.chain.is_native() || self.synth
    }

    pub fn is_gas_asset(&self) -> bool {
        !self.synth && *self == self.chain.gas_asset()
    }

    /// Synthetic counterpart of this asset.
    pub fn to_synth(&self) -> Self {
        Self {
            synth: true,
            ..self.clone()
        }
    }

    /// Layer-one asset this one mirrors (itself when not synthetic).
    pub fn to_layer1(&self) -> Self {
        Self {
            synth: false,
            ..self.clone()
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.synth { '/' } else { '.' };
        write!(f, "{}{}{}", self.chain, sep, self.symbol)
    }
}

impl FromStr for Asset {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chain, symbol, synth) = if let Some((c, sym)) = s.split_once('/') {
            (c, sym, true)
        } else if let Some((c, sym)) = s.split_once('.') {
            (c, sym, false)
        } else {
            return Err(ParseError::InvalidAsset(s.to_string()));
        };
        if symbol.is_empty() {
            return Err(ParseError::InvalidAsset(s.to_string()));
        }
        let mut asset = Asset::new(chain.parse()?, symbol);
        asset.synth = synth;
        Ok(asset)
    }
}

/// An amount of a single asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub asset: Asset,
    pub amount: u128,
    /// Precision on the external chain; 0 means the default of eight.
    pub decimals: u8,
}

impl Coin {
    pub fn new(asset: Asset, amount: u128) -> Self {
        Self {
            asset,
            amount,
            decimals: 0,
        }
    }

    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.asset)
    }
}

// =============================================================================
// CLUSTER B: IDENTITY
// =============================================================================

/// A 33-byte compressed secp256k1 public key.
///
/// Identifies both threshold vaults and node signing keys.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PubKey(#[serde_as(as = "Bytes")] pub [u8; 33]);

impl PubKey {
    pub const EMPTY: PubKey = PubKey([0u8; 33]);

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Deterministic per-chain address controlled by this key.
    pub fn address_for(&self, chain: Chain) -> String {
        let mut hasher = Sha256::new();
        hasher.update(chain.ticker().as_bytes());
        hasher.update(self.0);
        let digest = hasher.finalize();
        format!(
            "{}{}",
            chain.ticker().to_ascii_lowercase(),
            hex::encode(&digest[..20])
        )
    }
}

impl fmt::Display for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for PubKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 33];
        hex::decode_to_slice(s, &mut out).map_err(|_| ParseError::InvalidHex {
            kind: "pubkey",
            value: s.to_string(),
        })?;
        Ok(PubKey(out))
    }
}

/// A 20-byte node operator address on the native chain.
#[serde_as]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct NodeAddress(#[serde_as(as = "Bytes")] pub [u8; 20]);

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thor{}", hex::encode(self.0))
    }
}

// =============================================================================
// CLUSTER C: TRANSACTIONS
// =============================================================================

/// A 32-byte transaction hash on any chain.
#[serde_as]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TxId(#[serde_as(as = "Bytes")] pub [u8; 32]);

impl TxId {
    /// Placeholder hash marking an outbound item as handled elsewhere.
    pub const BLANK: TxId = TxId([0u8; 32]);

    pub fn is_blank(&self) -> bool {
        *self == Self::BLANK
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}
