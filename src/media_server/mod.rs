//! Media-server collaborators: live sessions, catalog, player control and
//! direct termination, plus the Plex HTTP implementation of each.

pub mod http_client;
pub mod plex;
pub mod probe;
pub mod traits;
pub mod types;

pub use plex::{PlexConnector, PlexDirectTerminator, PlexServer};
pub use traits::{
    BoxFuture, Catalog, ClientControl, DirectTermination, MediaServer, ServerConnector,
    SessionDirectory,
};
pub use types::{
    CatalogItem, ClientEndpoint, ClientHandle, ClientRoute, MediaVersion, ServerIdentity,
    SessionSnapshot,
};
