//! Source adapters.

pub mod action_network;
pub mod bicycle_coalition;
pub mod ics_feed;

pub use action_network::{ACTION_NETWORK_IMPORTER, ActionNetworkImporter};
pub use bicycle_coalition::{BICYCLE_COALITION_IMPORTER, BicycleCoalitionImporter};
pub use ics_feed::{ICS_IMPORTER, IcsFeedImporter};

use serde::{Deserialize, Deserializer};

/// Reads an explicit JSON `null` as the type's default, the same as a
/// missing key. Pair with `#[serde(default)]`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
