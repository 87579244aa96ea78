//! Command-line surface: flag and legacy positional argument forms.

pub mod commands;

pub use commands::{Cli, EventArgs};

use crate::event::{InputEvent, normalize_field};
use clap::error::ErrorKind;
use clap::{CommandFactory, FromArgMatches, Parser};
use std::ffi::OsString;

/// Parse a trigger invocation.
///
/// Help and version requests come back as `Err`, as does an argument list
/// that cannot be read at all. Any other problem (an unknown flag, a missing
/// option value) yields a best-effort `Cli` together with the error, so the
/// stream still gets a policy decision.
pub fn parse_args<I, T>(args: I) -> Result<(Cli, Option<clap::Error>), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let strict = match Cli::try_parse_from(&args) {
        Ok(cli) => return Ok((cli, None)),
        Err(e) => e,
    };
    if matches!(
        strict.kind(),
        ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
    ) {
        return Err(strict);
    }
    let lenient = Cli::command()
        .ignore_errors(true)
        .try_get_matches_from(&args)
        .and_then(|matches| Cli::from_arg_matches(&matches));
    match lenient {
        Ok(cli) => Ok((cli, Some(strict))),
        Err(_) => Err(strict),
    }
}

/// A positional token that is really a long flag clap did not recognise.
fn is_stray_flag(value: &str) -> bool {
    value
        .strip_prefix("--")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_alphabetic())
}

/// Legacy positional slots, in trigger order.
#[derive(Debug, Clone, Copy)]
enum Slot {
    RatingKey,
    MachineId,
    Username,
    SessionId,
    UserId,
    SourceResolution,
    VideoDecision,
    DynamicRange,
    SessionKey,
    StreamResolution,
}

const LEGACY_ORDER: [Slot; 10] = [
    Slot::RatingKey,
    Slot::MachineId,
    Slot::Username,
    Slot::SessionId,
    Slot::UserId,
    Slot::SourceResolution,
    Slot::VideoDecision,
    Slot::DynamicRange,
    Slot::SessionKey,
    Slot::StreamResolution,
];

impl InputEvent {
    /// Build the event from parsed arguments. A flag wins over the
    /// positional value for the same field; every value is normalized.
    pub fn from_cli(cli: &Cli) -> Self {
        let mut legacy = EventArgs::default();
        let positional = cli.positional.iter().filter(|v| !is_stray_flag(v));
        for (slot, value) in LEGACY_ORDER.iter().zip(positional) {
            let target = match slot {
                Slot::RatingKey => &mut legacy.rating_key,
                Slot::MachineId => &mut legacy.machine_id,
                Slot::Username => &mut legacy.username,
                Slot::SessionId => &mut legacy.session_id,
                Slot::UserId => &mut legacy.user_id,
                Slot::SourceResolution => &mut legacy.source_resolution,
                Slot::VideoDecision => &mut legacy.video_decision,
                Slot::DynamicRange => &mut legacy.dynamic_range,
                Slot::SessionKey => &mut legacy.session_key,
                Slot::StreamResolution => &mut legacy.stream_resolution,
            };
            *target = Some(value.clone());
        }

        let flags = &cli.event;
        let pick = |flag: &Option<String>, positional: Option<String>| {
            normalize_field(flag.clone()).or_else(|| normalize_field(positional))
        };
        Self {
            rating_key: pick(&flags.rating_key, legacy.rating_key),
            machine_id: pick(&flags.machine_id, legacy.machine_id),
            username: pick(&flags.username, legacy.username),
            session_id: pick(&flags.session_id, legacy.session_id),
            session_key: pick(&flags.session_key, legacy.session_key),
            user_id: pick(&flags.user_id, legacy.user_id),
            video_decision: pick(&flags.video_decision, legacy.video_decision),
            source_resolution: pick(&flags.source_resolution, legacy.source_resolution),
            stream_resolution: pick(&flags.stream_resolution, legacy.stream_resolution),
            dynamic_range: pick(&flags.dynamic_range, legacy.dynamic_range),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("downshiftarr").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flag_form_accepts_both_spellings() {
        let cli = parse(&[
            "--rating-key=5512",
            "--machine-id",
            "roku-abc",
            "--video-decision=transcode",
            "--dry-run",
        ]);
        let event = InputEvent::from_cli(&cli);
        assert_eq!(event.rating_key.as_deref(), Some("5512"));
        assert_eq!(event.machine_id.as_deref(), Some("roku-abc"));
        assert_eq!(event.video_decision.as_deref(), Some("transcode"));
        assert!(cli.dry_run);
    }

    #[test]
    fn legacy_positional_order_is_honoured() {
        let cli = parse(&[
            "5512", "roku-abc", "alice", "sess-xyz", "7", "4k", "transcode", "HDR10", "37",
            "1080",
        ]);
        let event = InputEvent::from_cli(&cli);
        assert_eq!(event.rating_key.as_deref(), Some("5512"));
        assert_eq!(event.username.as_deref(), Some("alice"));
        assert_eq!(event.user_id.as_deref(), Some("7"));
        assert_eq!(event.source_resolution.as_deref(), Some("4k"));
        assert_eq!(event.video_decision.as_deref(), Some("transcode"));
        assert_eq!(event.dynamic_range.as_deref(), Some("HDR10"));
        assert_eq!(event.session_key.as_deref(), Some("37"));
        assert_eq!(event.stream_resolution.as_deref(), Some("1080"));
    }

    #[test]
    fn short_legacy_form_leaves_optional_tail_absent() {
        let cli = parse(&["5512", "roku-abc", "alice", "sess-xyz", "7", "4k", "copy"]);
        let event = InputEvent::from_cli(&cli);
        assert!(event.is_direct());
        assert_eq!(event.session_key, None);
        assert_eq!(event.dynamic_range, None);
    }

    #[test]
    fn flags_win_and_placeholders_read_as_absent() {
        let cli = parse(&[
            "--username=bob",
            "5512",
            "roku-abc",
            "alice",
            "{session_id}",
            "",
            "4k",
            "transcode",
        ]);
        let event = InputEvent::from_cli(&cli);
        assert_eq!(event.username.as_deref(), Some("bob"));
        assert_eq!(event.session_id, None);
        assert_eq!(event.user_id, None);
    }

    #[test]
    fn blank_flag_falls_back_to_positional() {
        let cli = parse(&["--rating-key=", "5512"]);
        assert_eq!(InputEvent::from_cli(&cli).rating_key.as_deref(), Some("5512"));
    }

    #[test]
    fn hyphen_leading_legacy_values_are_positional() {
        let cli = parse(&[
            "5512", "roku-abc", "-bob", "sess-xyz", "-1", "4k", "transcode",
        ]);
        let event = InputEvent::from_cli(&cli);
        assert_eq!(event.username.as_deref(), Some("-bob"));
        assert_eq!(event.user_id.as_deref(), Some("-1"));
        assert_eq!(event.video_decision.as_deref(), Some("transcode"));
    }

    #[test]
    fn unknown_flag_does_not_fail_or_shift_legacy_slots() {
        let (cli, _) = parse_args([
            "downshiftarr",
            "--rating-key=5512",
            "--player=foo",
            "--video-decision=transcode",
        ])
        .unwrap();
        let event = InputEvent::from_cli(&cli);
        assert_eq!(event.rating_key.as_deref(), Some("5512"));
        assert_eq!(event.machine_id, None);

        let (cli, _) = parse_args(["downshiftarr", "5512", "roku-abc", "--player=foo"]).unwrap();
        let event = InputEvent::from_cli(&cli);
        assert_eq!(event.rating_key.as_deref(), Some("5512"));
        assert_eq!(event.machine_id.as_deref(), Some("roku-abc"));
        assert_eq!(event.username, None);
    }

    #[test]
    fn malformed_option_still_yields_an_event() {
        let (cli, error) = parse_args(["downshiftarr", "--rating-key=5512", "--config"]).unwrap();
        assert!(error.is_some());
        assert_eq!(InputEvent::from_cli(&cli).rating_key.as_deref(), Some("5512"));
    }

    #[test]
    fn help_and_version_are_passed_through() {
        let err = parse_args(["downshiftarr", "--help"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        let err = parse_args(["downshiftarr", "--version"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }
}
