use serde::Serialize;

use super::{CallSnapshot, LocalMediaState, RemoteMediaState};

/// How a participant's tile should be laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TileLayout {
    /// Full-bleed surface behind the call controls.
    FullScreen,
    /// Fixed-size picture-in-picture corner tile.
    PictureInPicture,
}

/// Render-ready description of one participant. Pure function of call state;
/// the shell maps it straight to views with no lifecycle logic of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantTile {
    pub participant_id: u32,
    pub display_name: String,
    /// False renders the avatar placeholder instead of the media surface.
    pub show_video: bool,
    /// True renders the mute glyph next to the name label.
    pub show_mute_glyph: bool,
    pub layout: TileLayout,
}

impl ParticipantTile {
    pub fn local(
        participant_id: u32,
        display_name: &str,
        state: LocalMediaState,
        full_screen: bool,
    ) -> Self {
        Self {
            participant_id,
            display_name: display_name.to_string(),
            show_video: !state.camera_off,
            show_mute_glyph: state.mic_muted,
            layout: layout(full_screen),
        }
    }

    /// Remote tile, or `None` while the peer is absent (the shell shows the
    /// "waiting for the other participant" placeholder instead).
    pub fn remote(
        participant_id: Option<u32>,
        display_name: &str,
        state: RemoteMediaState,
        full_screen: bool,
    ) -> Option<Self> {
        let participant_id = participant_id?;
        if !state.present {
            return None;
        }
        Some(Self {
            participant_id,
            display_name: display_name.to_string(),
            show_video: !state.video_off,
            show_mute_glyph: state.audio_muted,
            layout: layout(full_screen),
        })
    }

    /// Standard 1:1 arrangement: remote full-bleed when present, local in the
    /// corner; local goes full-bleed while alone.
    pub fn for_snapshot(snapshot: &CallSnapshot) -> (Self, Option<Self>) {
        let remote = Self::remote(
            snapshot.remote_participant_id,
            &snapshot.remote_display_name,
            snapshot.remote,
            true,
        );
        let local = Self::local(
            snapshot.local_participant_id,
            &snapshot.local_display_name,
            snapshot.local,
            remote.is_none(),
        );
        (local, remote)
    }
}

fn layout(full_screen: bool) -> TileLayout {
    if full_screen {
        TileLayout::FullScreen
    } else {
        TileLayout::PictureInPicture
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_off_hides_video_and_keeps_label() {
        let tile = ParticipantTile::local(
            7,
            "Sam",
            LocalMediaState { mic_muted: false, camera_off: true },
            false,
        );
        assert!(!tile.show_video);
        assert!(!tile.show_mute_glyph);
        assert_eq!(tile.display_name, "Sam");
        assert_eq!(tile.layout, TileLayout::PictureInPicture);
    }

    #[test]
    fn muted_remote_shows_glyph() {
        let tile = ParticipantTile::remote(
            Some(42),
            "Ms. Rivera",
            RemoteMediaState { audio_muted: true, video_off: false, present: true },
            true,
        )
        .unwrap();
        assert!(tile.show_video);
        assert!(tile.show_mute_glyph);
        assert_eq!(tile.layout, TileLayout::FullScreen);
    }

    #[test]
    fn absent_remote_renders_nothing() {
        assert!(ParticipantTile::remote(None, "x", RemoteMediaState::default(), true).is_none());
        assert!(ParticipantTile::remote(
            Some(42),
            "x",
            RemoteMediaState { present: false, ..Default::default() },
            true
        )
        .is_none());
    }

    #[test]
    fn local_goes_full_bleed_while_alone() {
        let snapshot = CallSnapshot {
            local_participant_id: 7,
            local_display_name: "Sam".into(),
            ..Default::default()
        };
        let (local, remote) = ParticipantTile::for_snapshot(&snapshot);
        assert!(remote.is_none());
        assert_eq!(local.layout, TileLayout::FullScreen);
    }
}
