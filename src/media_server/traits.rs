use super::types::{CatalogItem, ClientEndpoint, ClientHandle, ServerIdentity, SessionSnapshot};
use crate::error::PlexError;
use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Live sessions on the media server.
pub trait SessionDirectory: Send + Sync {
    /// Fresh snapshot of every active playback session.
    fn list_active_sessions(&self) -> BoxFuture<'_, Result<Vec<SessionSnapshot>, PlexError>>;

    /// Stop a session through its own handle. Fails when the snapshot does
    /// not carry enough identity to address the session.
    fn stop_session<'a>(
        &'a self,
        session: &'a SessionSnapshot,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<(), PlexError>>;
}

/// The media catalog.
pub trait Catalog: Send + Sync {
    fn fetch_item<'a>(&'a self, rating_key: &'a str)
    -> BoxFuture<'a, Result<CatalogItem, PlexError>>;
}

/// Player remote control.
pub trait ClientControl: Send + Sync {
    /// Players the server currently advertises as controllable.
    fn enumerate_clients(&self) -> BoxFuture<'_, Result<Vec<ClientEndpoint>, PlexError>>;

    /// Open a direct connection to a player and read back its identity.
    fn connect_direct<'a>(
        &'a self,
        address: &'a str,
        port: u16,
    ) -> BoxFuture<'a, Result<ClientEndpoint, PlexError>>;

    fn play_media<'a>(
        &'a self,
        client: &'a ClientHandle,
        item: &'a CatalogItem,
        media_index: usize,
        offset_ms: u64,
    ) -> BoxFuture<'a, Result<(), PlexError>>;

    fn seek_to<'a>(
        &'a self,
        client: &'a ClientHandle,
        offset_ms: u64,
    ) -> BoxFuture<'a, Result<(), PlexError>>;
}

/// Token-authenticated termination keyed by session id, independent of any
/// resolved session handle.
pub trait DirectTermination: Send + Sync {
    fn terminate_session<'a>(
        &'a self,
        session_id: &'a str,
        reason: &'a str,
        token: &'a str,
    ) -> BoxFuture<'a, Result<(), PlexError>>;
}

/// Everything the enforcement pipeline needs from a connected media server.
pub trait MediaServer: SessionDirectory + Catalog + ClientControl {
    fn identity(&self) -> &ServerIdentity;
}

/// Opens (and verifies) the media-server connection.
pub trait ServerConnector: Send + Sync {
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn MediaServer>, PlexError>>;
}
