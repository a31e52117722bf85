//! Offer table: tier × aggressiveness with a fixed commission and TPV per client.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "10k")]
    T1,
    #[serde(rename = "30k")]
    T2,
    #[serde(rename = "50k")]
    T3,
    #[serde(rename = "100k")]
    T4,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::T1, Tier::T2, Tier::T3, Tier::T4];

    pub fn label(self) -> &'static str {
        match self {
            Tier::T1 => "10k",
            Tier::T2 => "30k",
            Tier::T3 => "50k",
            Tier::T4 => "100k",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Tier::T1 => 0,
            Tier::T2 => 1,
            Tier::T3 => 2,
            Tier::T4 => 3,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.label().eq_ignore_ascii_case(label.trim()))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggressiveness {
    /// More aggressive offer: higher commission per client.
    High,
    /// Less aggressive offer.
    Low,
}

impl Aggressiveness {
    pub fn label(self) -> &'static str {
        match self {
            Aggressiveness::High => "more aggressive",
            Aggressiveness::Low => "less aggressive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OfferKey {
    pub tier: Tier,
    pub aggressiveness: Aggressiveness,
}

impl OfferKey {
    pub fn new(tier: Tier, aggressiveness: Aggressiveness) -> Self {
        Self {
            tier,
            aggressiveness,
        }
    }
}

impl fmt::Display for OfferKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.tier, self.aggressiveness.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub tier: Tier,
    pub aggressiveness: Aggressiveness,
    pub commission_per_client: f64,
    pub tpv_per_client: f64,
}

impl Offer {
    pub const fn new(
        tier: Tier,
        aggressiveness: Aggressiveness,
        commission_per_client: f64,
        tpv_per_client: f64,
    ) -> Self {
        Self {
            tier,
            aggressiveness,
            commission_per_client,
            tpv_per_client,
        }
    }

    pub fn key(&self) -> OfferKey {
        OfferKey::new(self.tier, self.aggressiveness)
    }
}

/// Offers shipped with the simulator (commission and TPV per client, in currency units).
pub const REFERENCE_OFFERS: [Offer; 8] = [
    Offer::new(Tier::T1, Aggressiveness::High, 90.0, 10_000.0),
    Offer::new(Tier::T1, Aggressiveness::Low, 50.0, 10_000.0),
    Offer::new(Tier::T2, Aggressiveness::High, 130.0, 30_000.0),
    Offer::new(Tier::T2, Aggressiveness::Low, 100.0, 30_000.0),
    Offer::new(Tier::T3, Aggressiveness::High, 260.0, 50_000.0),
    Offer::new(Tier::T3, Aggressiveness::Low, 180.0, 50_000.0),
    Offer::new(Tier::T4, Aggressiveness::High, 340.0, 100_000.0),
    Offer::new(Tier::T4, Aggressiveness::Low, 250.0, 100_000.0),
];

#[derive(Debug, Error)]
pub enum OfferTableError {
    #[error("duplicate offer {0}")]
    Duplicate(OfferKey),
    #[error("offer {key} has invalid {field}: {value}")]
    InvalidValue {
        key: OfferKey,
        field: &'static str,
        value: f64,
    },
    #[error("failed to read offer table '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse offer table '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Immutable, duplicate-free list of offers. Built once and passed into the search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OfferTable {
    offers: Vec<Offer>,
}

impl OfferTable {
    pub fn reference() -> Self {
        Self {
            offers: REFERENCE_OFFERS.to_vec(),
        }
    }

    pub fn from_offers(offers: Vec<Offer>) -> Result<Self, OfferTableError> {
        let mut seen = HashSet::with_capacity(offers.len());
        for offer in &offers {
            let key = offer.key();
            if !seen.insert(key) {
                return Err(OfferTableError::Duplicate(key));
            }
            for (field, value) in [
                ("commission_per_client", offer.commission_per_client),
                ("tpv_per_client", offer.tpv_per_client),
            ] {
                if !value.is_finite() || value < 0.0 {
                    return Err(OfferTableError::InvalidValue { key, field, value });
                }
            }
        }
        Ok(Self { offers })
    }

    pub fn offers(&self) -> &[Offer] {
        &self.offers
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    pub fn get(&self, key: OfferKey) -> Option<&Offer> {
        self.offers.iter().find(|offer| offer.key() == key)
    }

    /// Table positions of the offers in `tier`, in table order.
    pub fn positions_in(&self, tier: Tier) -> Vec<usize> {
        self.offers
            .iter()
            .enumerate()
            .filter(|(_, offer)| offer.tier == tier)
            .map(|(position, _)| position)
            .collect()
    }
}

impl Default for OfferTable {
    fn default() -> Self {
        Self::reference()
    }
}

/// Load an offer table from a JSON array of offers.
pub fn load_offer_table(path: impl AsRef<Path>) -> Result<OfferTable, OfferTableError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| OfferTableError::Io {
        path: display.clone(),
        source,
    })?;
    let offers: Vec<Offer> = serde_json::from_str(&raw).map_err(|source| OfferTableError::Parse {
        path: display,
        source,
    })?;
    OfferTable::from_offers(offers)
}
