//! Delivery policy: abstract tiers mapped onto transport send modes.
//!
//! Callers pick a [`DeliveryTier`] by what the data needs, never by what a
//! particular transport calls its modes. The mapping is 1:1:
//!
//! | Tier                  | Transport mode                  |
//! |-----------------------|---------------------------------|
//! | `OrderedReliable`     | reliable, ordered               |
//! | `UnorderedReliable`   | reliable, no ordering           |
//! | `SequencedUnreliable` | unreliable, newest wins         |

use gamelink_transport::SendMode;
use serde::{Deserialize, Serialize};

/// The delivery guarantee requested for an outgoing message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "PascalCase")]
pub enum DeliveryTier {
    /// Must arrive, in order. Chat, commands, anything stateful.
    #[default]
    OrderedReliable,

    /// Must arrive, order doesn't matter.
    UnorderedReliable,

    /// May be lost; only the newest one matters. Positions, inputs.
    SequencedUnreliable,
}

impl DeliveryTier {
    /// Decodes a raw tier byte.
    ///
    /// Out-of-range values fall back to [`DeliveryTier::OrderedReliable`]:
    /// a misused tier costs throughput, never correctness.
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::OrderedReliable,
            1 => Self::UnorderedReliable,
            2 => Self::SequencedUnreliable,
            _ => Self::OrderedReliable,
        }
    }

    /// The raw byte for this tier.
    pub fn as_raw(self) -> u8 {
        match self {
            Self::OrderedReliable => 0,
            Self::UnorderedReliable => 1,
            Self::SequencedUnreliable => 2,
        }
    }

    /// The transport send mode this tier maps to.
    pub fn send_mode(self) -> SendMode {
        match self {
            Self::OrderedReliable => SendMode::ReliableOrdered,
            Self::UnorderedReliable => SendMode::ReliableUnordered,
            Self::SequencedUnreliable => SendMode::UnreliableSequenced,
        }
    }
}

impl From<u8> for DeliveryTier {
    fn from(raw: u8) -> Self {
        Self::from_raw(raw)
    }
}
