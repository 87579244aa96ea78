use clap::{Args, Parser};

/// `Downshiftarr` - keeps 4K/HDR transcodes off devices that cannot take them.
#[derive(Parser, Debug)]
#[command(name = "downshiftarr")]
#[command(version)]
#[command(
    about = "Downshift or terminate high-quality Plex transcodes.",
    long_about = "Invoked once per playback event (typically by a Tautulli script \
                  notification). Accepts flags or the legacy positional order: \
                  rating_key machine_id username session_id user_id source_resolution \
                  video_decision [dynamic_range] [session_key] [stream_resolution]. \
                  Flags go before positional values."
)]
pub struct Cli {
    #[command(flatten)]
    pub event: EventArgs,

    /// Config file (default: $DOWNSHIFTARR_CONFIG, then ~/.downshiftarr/config.toml)
    #[arg(long)]
    pub config: Option<String>,

    /// Decide and log without switching, terminating or notifying
    #[arg(long)]
    pub dry_run: bool,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Legacy positional trigger arguments. Values may start with `-`
    /// (a user id of `-1`, a username like `-bob`).
    #[arg(value_name = "LEGACY", allow_hyphen_values = true)]
    pub positional: Vec<String>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct EventArgs {
    /// Catalog id of the item being played
    #[arg(long)]
    pub rating_key: Option<String>,

    /// Player machine identifier
    #[arg(long)]
    pub machine_id: Option<String>,

    #[arg(long)]
    pub username: Option<String>,

    #[arg(long)]
    pub session_id: Option<String>,

    #[arg(long)]
    pub session_key: Option<String>,

    #[arg(long)]
    pub user_id: Option<String>,

    /// e.g. `transcode`, `direct play`, `copy`
    #[arg(long)]
    pub video_decision: Option<String>,

    /// Source resolution hint (advisory)
    #[arg(long)]
    pub source_resolution: Option<String>,

    /// Stream resolution hint (advisory)
    #[arg(long)]
    pub stream_resolution: Option<String>,

    /// Dynamic-range hint (advisory)
    #[arg(long)]
    pub dynamic_range: Option<String>,
}
