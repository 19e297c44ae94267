//! Playlist ownership and the playback state machine.
//!
//! The controller owns the playlist, the current-track index, and the
//! transport handle; every transport side effect of a track change (bind
//! with the origin's CORS policy, volume reapply, resume, classification
//! kick-off) happens here and nowhere else.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, info, warn};

use crate::art::{self, CoverArt};
use crate::theme::{Theme, ThemeResolver};
use crate::transport::{AudioTransport, CrossOrigin, SampleTap};

static NEXT_TRACK_ID: AtomicU64 = AtomicU64::new(1);

/// Stable, immutable handle for a track; survives playlist reordering and
/// is what in-flight classification results are keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(u64);

impl TrackId {
    fn next() -> Self {
        Self(NEXT_TRACK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOrigin {
    LocalFile,
    RemoteUrl,
}

/// Media resource reference; origin and handle are one and the same, so
/// a local-file track can never carry a URL or vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceHandle {
    File(PathBuf),
    Url(String),
}

impl ResourceHandle {
    pub fn origin(&self) -> TrackOrigin {
        match self {
            Self::File(_) => TrackOrigin::LocalFile,
            Self::Url(_) => TrackOrigin::RemoteUrl,
        }
    }

    /// Cross-origin policy this resource must be bound with.
    pub fn cross_origin(&self) -> CrossOrigin {
        match self.origin() {
            TrackOrigin::LocalFile => CrossOrigin::None,
            TrackOrigin::RemoteUrl => CrossOrigin::Anonymous,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub handle: ResourceHandle,
    pub cover_art: Option<CoverArt>,
    /// Attached once classification completes; replaced, never mutated.
    pub theme: Option<Theme>,
}

impl Track {
    pub fn new_local(path: PathBuf) -> Self {
        let (title, artist) = title_artist_from_path(&path);
        Self {
            id: TrackId::next(),
            title,
            artist,
            handle: ResourceHandle::File(path),
            cover_art: None,
            theme: None,
        }
    }

    pub fn new_url(url: String) -> Self {
        Self {
            id: TrackId::next(),
            title: "Stream URL".to_string(),
            artist: "Online Source".to_string(),
            handle: ResourceHandle::Url(url),
            cover_art: None,
            theme: None,
        }
    }

    pub fn with_cover_art(mut self, cover_art: Option<CoverArt>) -> Self {
        self.cover_art = cover_art;
        self
    }

    pub fn origin(&self) -> TrackOrigin {
        self.handle.origin()
    }
}

/// `Artist - Title` file-stem convention, falling back to the stem as the
/// title when there is no separator.
fn title_artist_from_path(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Unknown");
    match stem.split_once('-') {
        Some((artist, title)) if !title.trim().is_empty() && !artist.trim().is_empty() => {
            (title.trim().to_string(), artist.trim().to_string())
        }
        _ => (stem.trim().to_string(), "Unknown Artist".to_string()),
    }
}

/// Best-effort cover-art read: scan the head of the file, degrade to no
/// art on any I/O or parse failure.
fn read_cover_art(path: &Path) -> Option<CoverArt> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!("cannot open {} for art scan: {e}", path.display());
            return None;
        }
    };
    let mut head = Vec::new();
    if let Err(e) = file.take(art::ART_SCAN_LIMIT as u64).read_to_end(&mut head) {
        warn!("cannot read {} for art scan: {e}", path.display());
        return None;
    }
    art::extract_cover_art(&head)
}

/// Queryable playback state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSnapshot {
    pub index: Option<usize>,
    pub playing: bool,
    pub volume: f32,
    pub position: Duration,
    pub duration: Option<Duration>,
}

pub struct PlaybackController {
    playlist: Vec<Track>,
    current: Option<usize>,
    playing: bool,
    volume: f32,
    transport: Box<dyn AudioTransport>,
}

impl PlaybackController {
    pub fn new(transport: Box<dyn AudioTransport>, volume: f32) -> Self {
        Self {
            playlist: Vec::new(),
            current: None,
            playing: false,
            volume: volume.clamp(0.0, 1.0),
            transport,
        }
    }

    /// Load local files as tracks. Never fails: unreadable files simply
    /// arrive without art, and decode problems surface later at bind time.
    /// An empty playlist auto-selects the first new track and starts
    /// playing.
    pub fn load_tracks(&mut self, paths: &[PathBuf], resolver: &mut ThemeResolver) -> Vec<TrackId> {
        paths
            .iter()
            .map(|path| {
                let track = Track::new_local(path.clone()).with_cover_art(read_cover_art(path));
                info!("loaded {:?} - {:?} from {}", track.artist, track.title, path.display());
                self.push_track(track, resolver)
            })
            .collect()
    }

    /// Queue a remote-URL track; same auto-select behavior as file loads.
    pub fn add_url_track(&mut self, url: String, resolver: &mut ThemeResolver) -> TrackId {
        self.push_track(Track::new_url(url), resolver)
    }

    fn push_track(&mut self, track: Track, resolver: &mut ThemeResolver) -> TrackId {
        let id = track.id;
        let was_empty = self.playlist.is_empty();
        self.playlist.push(track);
        if was_empty {
            self.playing = true;
            self.activate(Some(0), resolver);
        }
        id
    }

    /// Remove a track by id.
    ///
    /// Removing the current track selects the track now sitting at the
    /// same index (wrapped), or stops and releases the transport when the
    /// playlist empties. Removing an earlier track shifts the current
    /// index down to keep pointing at the same logical track.
    pub fn remove_track(&mut self, id: TrackId, resolver: &mut ThemeResolver) {
        let Some(index) = self.playlist.iter().position(|t| t.id == id) else {
            return;
        };
        self.playlist.remove(index);

        match self.current {
            Some(cur) if cur == index => {
                if self.playlist.is_empty() {
                    self.activate(None, resolver);
                } else {
                    self.activate(Some(index % self.playlist.len()), resolver);
                }
            }
            Some(cur) if cur > index => {
                self.current = Some(cur - 1);
            }
            _ => {}
        }
    }

    /// Advance circularly; no-op on an empty playlist.
    pub fn next(&mut self, resolver: &mut ThemeResolver) {
        let n = self.playlist.len();
        if n == 0 {
            return;
        }
        let index = match self.current {
            Some(c) => (c + 1) % n,
            None => 0,
        };
        self.activate(Some(index), resolver);
    }

    /// Retreat circularly; no-op on an empty playlist.
    pub fn previous(&mut self, resolver: &mut ThemeResolver) {
        let n = self.playlist.len();
        if n == 0 {
            return;
        }
        let index = match self.current {
            Some(0) | None => n - 1,
            Some(c) => c - 1,
        };
        self.activate(Some(index), resolver);
    }

    /// Jump to an arbitrary index and begin playing. Out-of-range indices
    /// are benign races with the UI and ignored.
    pub fn select_track(&mut self, index: usize, resolver: &mut ThemeResolver) {
        if index >= self.playlist.len() {
            debug!("select_track({index}) out of range; ignoring");
            return;
        }
        self.playing = true;
        self.activate(Some(index), resolver);
    }

    /// Flip the playing state. Initializes the output device lazily, per
    /// host platform restrictions on when audio may start.
    pub fn toggle_play_pause(&mut self) {
        if let Err(e) = self.transport.ensure_ready() {
            warn!("audio transport unavailable: {e:#}");
            return;
        }
        if self.current.is_none() {
            debug!("toggle_play_pause with no current track; ignoring");
            return;
        }
        if self.playing {
            self.transport.pause();
            self.playing = false;
        } else {
            self.try_play();
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.transport.set_volume(self.volume);
    }

    pub fn seek(&mut self, position: Duration) {
        self.transport.seek(position);
    }

    /// Frame-loop hook: the transport's ended signal behaves exactly like
    /// pressing next.
    pub fn poll(&mut self, resolver: &mut ThemeResolver) {
        if self.transport.ended() {
            info!("track finished; advancing");
            self.next(resolver);
        }
    }

    /// Make `index` current: rebind the transport to the new resource
    /// (with the origin's CORS policy) before any resume, then kick off
    /// theme classification for the track.
    fn activate(&mut self, index: Option<usize>, resolver: &mut ThemeResolver) {
        self.current = index;
        let Some(i) = index else {
            self.playing = false;
            self.transport.stop();
            return;
        };

        let cors = self.playlist[i].handle.cross_origin();
        if let Err(e) = self.transport.bind(&self.playlist[i].handle, cors) {
            warn!("failed to bind {:?}: {e:#}", self.playlist[i].id);
        }
        self.transport.set_volume(self.volume);

        resolver.request(&mut self.playlist[i]);

        if self.playing {
            self.try_play();
        }
    }

    fn try_play(&mut self) {
        match self.transport.play() {
            Ok(()) => self.playing = true,
            Err(e) => {
                // Recoverable-reported: stay paused until the next
                // user-initiated attempt.
                warn!("playback start rejected: {e}");
                self.playing = false;
            }
        }
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            index: self.current,
            playing: self.playing,
            volume: self.volume,
            position: self.transport.position(),
            duration: self.transport.duration(),
        }
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.and_then(|i| self.playlist.get(i))
    }

    pub fn current_track_id(&self) -> Option<TrackId> {
        self.current_track().map(|t| t.id)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.playlist
    }

    /// Mutable playlist access for the theme resolver's result drain.
    pub fn tracks_mut(&mut self) -> &mut [Track] {
        &mut self.playlist
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn sample_tap(&self) -> Option<SampleTap> {
        self.transport.sample_tap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::{NullClassifier, ThemeMode};
    use crate::transport::TransportError;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeState {
        binds: Vec<(ResourceHandle, CrossOrigin)>,
        play_calls: usize,
        pause_calls: usize,
        stop_calls: usize,
        reject_play: bool,
        ended: bool,
        volume: f32,
    }

    #[derive(Clone, Default)]
    struct FakeTransport {
        state: Arc<Mutex<FakeState>>,
    }

    impl AudioTransport for FakeTransport {
        fn ensure_ready(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        fn bind(&mut self, handle: &ResourceHandle, cors: CrossOrigin) -> anyhow::Result<()> {
            self.state.lock().unwrap().binds.push((handle.clone(), cors));
            Ok(())
        }

        fn play(&mut self) -> Result<(), TransportError> {
            let mut state = self.state.lock().unwrap();
            if state.reject_play {
                return Err(TransportError::Rejected("autoplay blocked".to_string()));
            }
            state.play_calls += 1;
            Ok(())
        }

        fn pause(&mut self) {
            self.state.lock().unwrap().pause_calls += 1;
        }

        fn stop(&mut self) {
            self.state.lock().unwrap().stop_calls += 1;
        }

        fn seek(&mut self, _position: Duration) {}

        fn set_volume(&mut self, volume: f32) {
            self.state.lock().unwrap().volume = volume;
        }

        fn position(&self) -> Duration {
            Duration::ZERO
        }

        fn duration(&self) -> Option<Duration> {
            None
        }

        fn ended(&mut self) -> bool {
            std::mem::take(&mut self.state.lock().unwrap().ended)
        }

        fn sample_tap(&self) -> Option<SampleTap> {
            None
        }
    }

    fn setup() -> (PlaybackController, Arc<Mutex<FakeState>>, ThemeResolver) {
        let fake = FakeTransport::default();
        let state = Arc::clone(&fake.state);
        let controller = PlaybackController::new(Box::new(fake), 0.8);
        let resolver = ThemeResolver::new(Arc::new(NullClassifier), ThemeMode::Dynamic);
        (controller, state, resolver)
    }

    fn load_n(controller: &mut PlaybackController, resolver: &mut ThemeResolver, n: usize) -> Vec<TrackId> {
        let paths: Vec<PathBuf> = (0..n)
            .map(|i| PathBuf::from(format!("Artist {i} - Song {i}.mp3")))
            .collect();
        controller.load_tracks(&paths, resolver)
    }

    #[test]
    fn test_load_auto_selects_and_plays_first_track() {
        let (mut controller, state, mut resolver) = setup();
        let ids = load_n(&mut controller, &mut resolver, 2);

        assert_eq!(ids.len(), 2);
        assert_eq!(controller.current_index(), Some(0));
        assert!(controller.is_playing());
        assert_eq!(state.lock().unwrap().play_calls, 1);
        assert_eq!(state.lock().unwrap().binds.len(), 1);
    }

    #[test]
    fn test_filename_parsing() {
        let track = Track::new_local(PathBuf::from("Boards of Canada - Roygbiv.mp3"));
        assert_eq!(track.artist, "Boards of Canada");
        assert_eq!(track.title, "Roygbiv");

        let plain = Track::new_local(PathBuf::from("untitled.flac"));
        assert_eq!(plain.artist, "Unknown Artist");
        assert_eq!(plain.title, "untitled");
    }

    #[test]
    fn test_next_then_previous_is_identity() {
        let (mut controller, _, mut resolver) = setup();
        load_n(&mut controller, &mut resolver, 4);

        for start in 0..4 {
            controller.select_track(start, &mut resolver);
            controller.next(&mut resolver);
            controller.previous(&mut resolver);
            assert_eq!(controller.current_index(), Some(start));
        }
    }

    #[test]
    fn test_next_wraps_circularly() {
        let (mut controller, _, mut resolver) = setup();
        load_n(&mut controller, &mut resolver, 3);

        controller.select_track(2, &mut resolver);
        controller.next(&mut resolver);
        assert_eq!(controller.current_index(), Some(0));

        controller.previous(&mut resolver);
        assert_eq!(controller.current_index(), Some(2));
    }

    #[test]
    fn test_next_previous_noop_on_empty_playlist() {
        let (mut controller, state, mut resolver) = setup();
        controller.next(&mut resolver);
        controller.previous(&mut resolver);
        assert_eq!(controller.current_index(), None);
        assert_eq!(state.lock().unwrap().binds.len(), 0);
    }

    #[test]
    fn test_remove_only_track_stops_playback() {
        let (mut controller, state, mut resolver) = setup();
        let ids = load_n(&mut controller, &mut resolver, 1);

        controller.remove_track(ids[0], &mut resolver);
        assert_eq!(controller.tracks().len(), 0);
        assert_eq!(controller.current_index(), None);
        assert!(!controller.is_playing());
        assert_eq!(state.lock().unwrap().stop_calls, 1);
    }

    #[test]
    fn test_remove_earlier_track_shifts_current_down() {
        let (mut controller, _, mut resolver) = setup();
        let ids = load_n(&mut controller, &mut resolver, 3);
        controller.select_track(2, &mut resolver);
        let current_id = controller.current_track_id();

        controller.remove_track(ids[0], &mut resolver);
        assert_eq!(controller.current_index(), Some(1));
        assert_eq!(controller.current_track_id(), current_id);
    }

    #[test]
    fn test_remove_later_track_leaves_current_untouched() {
        let (mut controller, state, mut resolver) = setup();
        let ids = load_n(&mut controller, &mut resolver, 3);
        let current_id = controller.current_track_id();
        let binds_before = state.lock().unwrap().binds.len();

        controller.remove_track(ids[2], &mut resolver);
        assert_eq!(controller.current_index(), Some(0));
        assert_eq!(controller.current_track_id(), current_id);
        assert_eq!(state.lock().unwrap().binds.len(), binds_before);
    }

    #[test]
    fn test_remove_current_selects_same_index_wrapped() {
        let (mut controller, _, mut resolver) = setup();
        let ids = load_n(&mut controller, &mut resolver, 3);

        // Removing the last track while it is current wraps to index 0.
        controller.select_track(2, &mut resolver);
        controller.remove_track(ids[2], &mut resolver);
        assert_eq!(controller.current_index(), Some(0));
        assert_eq!(controller.current_track_id(), Some(ids[0]));
    }

    #[test]
    fn test_url_track_added_while_playing_does_not_interrupt() {
        let (mut controller, state, mut resolver) = setup();
        load_n(&mut controller, &mut resolver, 1);
        let current_id = controller.current_track_id();

        let url_id =
            controller.add_url_track("https://example.com/radio.mp3".to_string(), &mut resolver);

        assert_eq!(controller.tracks().len(), 2);
        assert_eq!(controller.current_track_id(), current_id);
        assert_eq!(
            controller.tracks()[1].origin(),
            TrackOrigin::RemoteUrl
        );

        // When later selected, the remote binding requests anonymous
        // cross-origin access; the local binding did not.
        controller.select_track(1, &mut resolver);
        let state = state.lock().unwrap();
        let (local_handle, local_cors) = &state.binds[0];
        let (url_handle, url_cors) = state.binds.last().unwrap();
        assert!(matches!(local_handle, ResourceHandle::File(_)));
        assert_eq!(*local_cors, CrossOrigin::None);
        assert!(matches!(url_handle, ResourceHandle::Url(_)));
        assert_eq!(*url_cors, CrossOrigin::Anonymous);
        assert_eq!(controller.current_track_id(), Some(url_id));
    }

    #[test]
    fn test_select_out_of_range_is_noop() {
        let (mut controller, _, mut resolver) = setup();
        load_n(&mut controller, &mut resolver, 2);
        controller.select_track(7, &mut resolver);
        assert_eq!(controller.current_index(), Some(0));
    }

    #[test]
    fn test_rejected_play_leaves_paused_state() {
        let (mut controller, state, mut resolver) = setup();
        state.lock().unwrap().reject_play = true;
        load_n(&mut controller, &mut resolver, 1);

        assert!(!controller.is_playing());

        // Another user attempt succeeds once the policy allows it.
        state.lock().unwrap().reject_play = false;
        controller.toggle_play_pause();
        assert!(controller.is_playing());
    }

    #[test]
    fn test_track_end_behaves_like_next() {
        let (mut controller, state, mut resolver) = setup();
        load_n(&mut controller, &mut resolver, 2);

        state.lock().unwrap().ended = true;
        controller.poll(&mut resolver);
        assert_eq!(controller.current_index(), Some(1));
        assert!(controller.is_playing());

        // No ended signal, no movement.
        controller.poll(&mut resolver);
        assert_eq!(controller.current_index(), Some(1));
    }

    #[test]
    fn test_volume_clamped() {
        let (mut controller, state, mut resolver) = setup();
        load_n(&mut controller, &mut resolver, 1);

        controller.set_volume(1.7);
        assert_eq!(controller.volume(), 1.0);
        controller.set_volume(-0.2);
        assert_eq!(controller.volume(), 0.0);
        assert_eq!(state.lock().unwrap().volume, 0.0);
    }

    #[test]
    fn test_toggle_without_tracks_is_noop() {
        let (mut controller, state, _) = setup();
        controller.toggle_play_pause();
        assert!(!controller.is_playing());
        assert_eq!(state.lock().unwrap().play_calls, 0);
    }
}
