//! Typed collection client.
//!
//! Application features instantiate one [`CollectionClient`] per collection
//! (normally through a [`ClientRegistry`]) and layer their own shaping on top.

mod call;
mod collection;
mod error;
mod notify;
mod registry;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use call::{Call, CallState};
pub use collection::{CollectionClient, Updated};
pub use error::{describe_code, CollectionError, Operation};
pub use notify::{Notice, NoticeVariant, Notifier, SilentNotifier, TracingNotifier};
pub use registry::ClientRegistry;

/// A record type stored in a named collection.
pub trait Collection: Serialize + DeserializeOwned {
  /// Collection name in the document store
  const NAME: &'static str;
}
