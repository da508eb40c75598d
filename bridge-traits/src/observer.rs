//! Content Change Notifications
//!
//! The host pushes payload-free "something changed" notifications for a
//! class of media content. Delivery happens on a host-owned thread.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Class of content a registration listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentClass {
    All,
    Audio,
    Video,
}

impl ContentClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentClass::All => "all",
            ContentClass::Audio => "audio",
            ContentClass::Video => "video",
        }
    }
}

/// Callback invoked by the host on every change notification.
pub type ChangeCallback = Box<dyn Fn() + Send + Sync>;

/// Token identifying one host registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(pub u64);

/// Host-side content observer.
///
/// `register` must return promptly; the callback may be invoked from any
/// thread, any number of times, until `unregister` returns.
pub trait ContentObserver: Send + Sync {
    fn register(&self, class: ContentClass, callback: ChangeCallback) -> Result<RegistrationId>;

    fn unregister(&self, id: RegistrationId);
}
