pub mod api;
pub mod client;
pub mod inbox;
pub mod mime;
pub mod oauth;
pub mod reply;
pub mod session;

pub use client::GmailClient;
pub use inbox::MessageListItem;
pub use oauth::{BrowserLauncher, LoopbackIdentityProvider};
pub use reply::{ReplyRequest, SentMessage};
pub use session::{ConsentRequest, IdentityProvider, ProviderMetadata, TokenSession};
