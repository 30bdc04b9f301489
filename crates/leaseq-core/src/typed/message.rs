//! Message trait - ties a payload type to its item type.
//!
//! # Trait Bounds
//! - `Serialize` / `DeserializeOwned`: the payload is stored as the item's `message`
//! - `Send + Sync + 'static`: decoded inside worker tasks

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::ItemType;

/// A typed queue payload.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct SendEmail {
///     to: String,
/// }
///
/// impl Message for SendEmail {
///     const TYPE: &'static str = "email.send";
/// }
/// ```
pub trait Message: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;

    fn item_type() -> ItemType {
        ItemType::new(Self::TYPE)
    }
}
