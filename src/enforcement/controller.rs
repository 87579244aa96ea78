//! Client control: find a controllable player for the session and drive the
//! rendition switch.

use super::resolver::SessionContext;
use crate::error::PlexError;
use crate::media_server::{CatalogItem, ClientControl, ClientEndpoint, ClientHandle, ClientRoute};
use std::time::Duration;

const DEFAULT_PLAYER_PORT: u16 = 32500;

/// Ways of reaching the player, tried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LocateStrategy {
    IdentifierMatch,
    TitleMatch,
    ServerRelay,
    DirectConnection,
}

impl LocateStrategy {
    pub const ORDER: [Self; 4] = [
        Self::IdentifierMatch,
        Self::TitleMatch,
        Self::ServerRelay,
        Self::DirectConnection,
    ];
}

pub struct ClientController<'a> {
    control: &'a dyn ClientControl,
    seek_attempts: u32,
    seek_settle: Duration,
}

impl<'a> ClientController<'a> {
    pub fn new(control: &'a dyn ClientControl, seek_attempts: u32, seek_settle: Duration) -> Self {
        Self {
            control,
            seek_attempts,
            seek_settle,
        }
    }

    /// First strategy that yields a usable handle. Each failure is logged and
    /// falls through; `None` only when all of them fail.
    pub async fn locate_client(
        &self,
        session: &SessionContext,
        fallback_machine_id: Option<&str>,
    ) -> Option<ClientHandle> {
        let machine_id = session.machine_id.as_deref().or(fallback_machine_id);
        let advertised = match self.control.enumerate_clients().await {
            Ok(clients) => clients,
            Err(e) => {
                tracing::warn!("Could not enumerate controllable clients: {e}");
                Vec::new()
            }
        };

        for strategy in LocateStrategy::ORDER {
            let attempt = match strategy {
                LocateStrategy::IdentifierMatch => by_identifier(&advertised, machine_id),
                LocateStrategy::TitleMatch => {
                    by_title(&advertised, session.player_title.as_deref(), machine_id)
                }
                LocateStrategy::ServerRelay => relay(machine_id, session.player_title.as_deref()),
                LocateStrategy::DirectConnection => self.direct(session, machine_id).await,
            };
            match attempt {
                Ok(handle) => {
                    tracing::info!(
                        %strategy,
                        client = handle.machine_identifier.as_str(),
                        title = handle.title.as_deref().unwrap_or("-"),
                        "Client located"
                    );
                    return Some(handle);
                }
                Err(reason) => tracing::debug!(%strategy, "Client strategy failed: {reason}"),
            }
        }
        None
    }

    async fn direct(
        &self,
        session: &SessionContext,
        machine_id: Option<&str>,
    ) -> Result<ClientHandle, String> {
        let address = session
            .player_address
            .as_deref()
            .ok_or("player advertised no address")?;
        let port = session.player_port.unwrap_or(DEFAULT_PLAYER_PORT);
        let endpoint = self
            .control
            .connect_direct(address, port)
            .await
            .map_err(|e| e.to_string())?;
        let machine_identifier = endpoint
            .machine_identifier
            .clone()
            .or_else(|| machine_id.map(str::to_string))
            .ok_or("direct endpoint did not identify itself")?;
        Ok(ClientHandle {
            machine_identifier,
            title: endpoint.name.clone().or_else(|| session.player_title.clone()),
            route: ClientRoute::Direct {
                base_url: endpoint
                    .base_url()
                    .unwrap_or_else(|| format!("http://{address}:{port}")),
            },
        })
    }

    /// Play the chosen rendition at the buffered offset, then re-seek:
    /// some players ignore the offset on `playMedia`. Only the play command
    /// can fail the switch.
    pub async fn switch(
        &self,
        client: &ClientHandle,
        item: &CatalogItem,
        media_index: usize,
        offset_ms: u64,
    ) -> Result<(), PlexError> {
        self.control
            .play_media(client, item, media_index, offset_ms)
            .await?;
        tracing::info!(
            media_index,
            offset_ms,
            client = client.machine_identifier.as_str(),
            "Switch sent"
        );

        if offset_ms == 0 {
            return Ok(());
        }
        for attempt in 1..=self.seek_attempts {
            tokio::time::sleep(self.seek_settle).await;
            match self.control.seek_to(client, offset_ms).await {
                Ok(()) => {
                    tracing::debug!(attempt, offset_ms, "Resume position restored");
                    return Ok(());
                }
                Err(e) => tracing::warn!(attempt, "Seek after switch failed: {e}"),
            }
        }
        tracing::warn!(offset_ms, "Playback switched but resume position was not restored");
        Ok(())
    }
}

fn handle_for(endpoint: &ClientEndpoint, machine_identifier: String) -> ClientHandle {
    ClientHandle {
        machine_identifier,
        title: endpoint.name.clone(),
        route: endpoint
            .base_url()
            .map_or(ClientRoute::ServerRelay, |base_url| ClientRoute::Direct { base_url }),
    }
}

fn by_identifier(
    advertised: &[ClientEndpoint],
    machine_id: Option<&str>,
) -> Result<ClientHandle, String> {
    let wanted = machine_id.ok_or("no machine identifier known")?;
    advertised
        .iter()
        .find(|c| c.machine_identifier.as_deref() == Some(wanted))
        .map(|c| handle_for(c, wanted.to_string()))
        .ok_or_else(|| format!("'{wanted}' is not among {} advertised client(s)", advertised.len()))
}

fn by_title(
    advertised: &[ClientEndpoint],
    title: Option<&str>,
    machine_id: Option<&str>,
) -> Result<ClientHandle, String> {
    let wanted = title.ok_or("player has no title")?;
    let endpoint = advertised
        .iter()
        .find(|c| c.name.as_deref() == Some(wanted))
        .ok_or_else(|| format!("no advertised client named '{wanted}'"))?;
    let machine_identifier = endpoint
        .machine_identifier
        .clone()
        .or_else(|| machine_id.map(str::to_string))
        .ok_or("matching client has no identifier")?;
    Ok(handle_for(endpoint, machine_identifier))
}

fn relay(machine_id: Option<&str>, title: Option<&str>) -> Result<ClientHandle, String> {
    let machine_identifier = machine_id.ok_or("no machine identifier to relay to")?;
    Ok(ClientHandle {
        machine_identifier: machine_identifier.to_string(),
        title: title.map(str::to_string),
        route: ClientRoute::ServerRelay,
    })
}
