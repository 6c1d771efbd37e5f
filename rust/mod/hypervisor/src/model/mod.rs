mod privilege;
mod role;
mod group;
mod user;
mod grant;
mod dictionary;
mod message;
mod log;

pub use privilege::*;
pub use role::*;
pub use group::*;
pub use user::*;
pub use grant::*;
pub use dictionary::*;
pub use message::*;
pub use log::*;

use serde::{Deserialize, Deserializer};

/// Distinguish an absent field from an explicit `null` in modify inputs.
///
/// Absent stays `None`; `null` becomes `Some(None)` and clears the value.
pub(crate) fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

pub(crate) fn default_true() -> bool {
    true
}
