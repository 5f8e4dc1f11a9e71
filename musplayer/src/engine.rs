//! The playback engine: sole owner of the queue and the playback state
//!
//! Every mutation goes through a method of [`PlaybackEngine`]. Callers only
//! ever receive copies ([`PlaybackState`], [`PlayerSnapshot`]).
//!
//! Loads are tagged with a generation number. Starting a load cancels the
//! previous one and bumps the generation; whatever a superseded load or a
//! replaced sink source reports afterwards is discarded.

use crate::config_ext::{DEFAULT_PROGRESS_POLL, DEFAULT_VOLUME};
use crate::error::{PlayerError, Result};
use crate::fetcher::StreamFetcher;
use crate::library::Library;
use crate::queue::Queue;
use crate::sink::{MediaSink, MediaSource, SinkEvent};
use crate::state::{PlaybackState, PlaybackStatus, PlayerSnapshot, RepeatMode};
use crate::transitions::{EndedAction, next_index, on_ended, previous_index, shuffle_keeping_current};
use musmodel::Track;
use rand::{SeedableRng, rngs::StdRng};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

struct EngineCore {
    queue: Queue,
    state: PlaybackState,
    generation: u64,
    loading: Option<CancellationToken>,
    /// Generation whose `ended` signal was already applied
    ended_handled: Option<u64>,
    scrubbing: bool,
    muted_volume: Option<u8>,
    favorites: HashSet<String>,
    rng: StdRng,
}

impl EngineCore {
    /// Invalidates the running load and every event of the current source
    fn supersede(&mut self) -> u64 {
        self.generation += 1;
        if let Some(token) = self.loading.take() {
            token.cancel();
        }
        self.generation
    }

    fn go_idle(&mut self) {
        self.state.status = PlaybackStatus::Idle;
        self.state.progress_seconds = 0.0;
        self.scrubbing = false;
    }
}

enum Followup {
    Nothing,
    Restart,
    LoadCurrent,
}

/// Builder pattern
pub struct EngineBuilder {
    sink: Arc<dyn MediaSink>,
    fetcher: Arc<dyn StreamFetcher>,
    library: Option<Arc<dyn Library>>,
    volume: u8,
    seed: Option<u64>,
}

impl EngineBuilder {
    pub fn library(mut self, library: Arc<dyn Library>) -> Self {
        self.library = Some(library);
        self
    }

    /// Initial volume, clamped to 0..=100
    pub fn volume(mut self, volume: u8) -> Self {
        self.volume = volume.min(100);
        self
    }

    /// Fixed seed for shuffle decisions
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> PlaybackEngine {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let core = EngineCore {
            queue: Queue::new(),
            state: PlaybackState::new(self.volume),
            generation: 0,
            loading: None,
            ended_handled: None,
            scrubbing: false,
            muted_volume: None,
            favorites: HashSet::new(),
            rng,
        };
        PlaybackEngine {
            core: Arc::new(Mutex::new(core)),
            sink: self.sink,
            fetcher: self.fetcher,
            library: self.library,
        }
    }
}

/// Queue sequencing under shuffle/repeat, driven by sink events
///
/// Cheap to clone; clones share the same player.
#[derive(Clone)]
pub struct PlaybackEngine {
    core: Arc<Mutex<EngineCore>>,
    sink: Arc<dyn MediaSink>,
    fetcher: Arc<dyn StreamFetcher>,
    library: Option<Arc<dyn Library>>,
}

impl PlaybackEngine {
    pub fn builder(sink: Arc<dyn MediaSink>, fetcher: Arc<dyn StreamFetcher>) -> EngineBuilder {
        EngineBuilder {
            sink,
            fetcher,
            library: None,
            volume: DEFAULT_VOLUME,
            seed: None,
        }
    }

    pub fn new(sink: Arc<dyn MediaSink>, fetcher: Arc<dyn StreamFetcher>) -> Self {
        Self::builder(sink, fetcher).build()
    }

    fn core(&self) -> MutexGuard<'_, EngineCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Lecture de l'état
    // ------------------------------------------------------------------

    pub fn state(&self) -> PlaybackState {
        self.core().state.clone()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.core().state.status
    }

    pub fn queue(&self) -> Vec<Track> {
        self.core().queue.tracks().to_vec()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.core().queue.current_index()
    }

    pub fn current_track(&self) -> Option<Track> {
        self.core().queue.current().cloned()
    }

    /// Generation of the source currently attached (or being loaded)
    pub fn generation(&self) -> u64 {
        self.core().generation
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.core().favorites.contains(id)
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let core = self.core();
        let track = core.queue.current();
        let favorite = track.is_some_and(|t| core.favorites.contains(&t.id));
        PlayerSnapshot::build(
            &core.state,
            track,
            core.queue.current_index(),
            core.queue.len(),
            core.muted_volume.is_some(),
            favorite,
        )
    }

    // ------------------------------------------------------------------
    // Chargement
    // ------------------------------------------------------------------

    /// Loads `track`, queueing it first if needed
    ///
    /// Cancels any load in flight. On success the engine is `Playing` and the
    /// play is recorded in the library; on failure it is `Idle` and the error
    /// is returned for information only.
    pub async fn load_track(&self, track: Track) -> Result<()> {
        {
            let mut core = self.core();
            let index = match core.queue.position(&track.id) {
                Some(index) => index,
                None => core.queue.push(track).unwrap_or_default(),
            };
            core.queue.select(index);
        }
        self.load_current().await
    }

    /// Loads the track at `index`; out of range is a no-op
    pub async fn play_index(&self, index: usize) -> Result<()> {
        if !self.core().queue.select(index) {
            debug!(index, "No track at this index");
            return Ok(());
        }
        self.load_current().await
    }

    async fn load_current(&self) -> Result<()> {
        let (generation, token, track) = {
            let mut core = self.core();
            let Some(track) = core.queue.current().cloned() else {
                return Ok(());
            };
            let generation = core.supersede();
            let token = CancellationToken::new();
            core.loading = Some(token.clone());
            core.ended_handled = None;
            core.scrubbing = false;
            core.state.status = PlaybackStatus::Loading;
            core.state.progress_seconds = 0.0;
            core.state.duration_seconds = track.duration_seconds;
            (generation, token, track)
        };
        info!(generation, track = %track.id, title = %track.title, "Loading track");

        let fetched = tokio::select! {
            _ = token.cancelled() => {
                debug!(generation, track = %track.id, "Load cancelled");
                return Err(PlayerError::Superseded(track.id));
            }
            fetched = self.fetcher.fetch(&track) => fetched,
        };

        let stream = match fetched {
            Ok(stream) => stream,
            Err(e) => return self.fail_load(generation, &track, e.into()),
        };

        if !self.is_current(generation) {
            return Err(PlayerError::Superseded(track.id));
        }
        let source = MediaSource {
            track: track.clone(),
            stream,
        };
        let attached = tokio::select! {
            _ = token.cancelled() => return Err(PlayerError::Superseded(track.id)),
            attached = self.sink.attach(generation, source) => attached,
        };
        if let Err(e) = attached {
            return self.fail_load(generation, &track, e.into());
        }

        // A newer load may have attached while ours was in flight
        if !self.is_current(generation) {
            return Err(PlayerError::Superseded(track.id));
        }
        let played = tokio::select! {
            _ = token.cancelled() => return Err(PlayerError::Superseded(track.id)),
            played = self.sink.play() => played,
        };
        if let Err(e) = played {
            return self.fail_load(generation, &track, e.into());
        }

        {
            let mut core = self.core();
            if core.generation != generation {
                return Err(PlayerError::Superseded(track.id));
            }
            core.loading = None;
            core.state.status = PlaybackStatus::Playing;
        }
        info!(generation, track = %track.id, "Playing");

        if let Some(library) = self.library.clone() {
            tokio::spawn(async move {
                if let Err(e) = library.record_play(&track).await {
                    warn!(track = %track.id, "Cannot record play in history: {}", e);
                }
            });
        }
        Ok(())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.core().generation == generation
    }

    fn fail_load(&self, generation: u64, track: &Track, error: PlayerError) -> Result<()> {
        let mut core = self.core();
        if core.generation != generation {
            return Err(PlayerError::Superseded(track.id.clone()));
        }
        warn!(generation, track = %track.id, "Load failed: {}", error);
        core.loading = None;
        core.go_idle();
        Err(error)
    }

    // ------------------------------------------------------------------
    // Contrôles
    // ------------------------------------------------------------------

    /// Resumes a paused track, or loads the current one when idle
    ///
    /// No effect on an empty queue, or while playing or loading.
    pub async fn play(&self) -> Result<()> {
        let (status, generation) = {
            let mut core = self.core();
            if core.queue.is_empty() {
                return Ok(());
            }
            if core.queue.current_index().is_none() {
                core.queue.select(0);
            }
            (core.state.status, core.generation)
        };

        match status {
            PlaybackStatus::Paused => {
                self.sink.play().await?;
                let mut core = self.core();
                if core.generation == generation && core.state.status == PlaybackStatus::Paused {
                    core.state.status = PlaybackStatus::Playing;
                }
                Ok(())
            }
            PlaybackStatus::Idle => self.load_current().await,
            PlaybackStatus::Playing | PlaybackStatus::Loading => Ok(()),
        }
    }

    /// Pauses a playing track; calling it again changes nothing
    pub async fn pause(&self) -> Result<()> {
        let generation = {
            let core = self.core();
            if core.state.status != PlaybackStatus::Playing {
                return Ok(());
            }
            core.generation
        };

        self.sink.pause().await?;
        let mut core = self.core();
        if core.generation == generation && core.state.status == PlaybackStatus::Playing {
            core.state.status = PlaybackStatus::Paused;
        }
        Ok(())
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        if self.status() == PlaybackStatus::Playing {
            self.pause().await
        } else {
            self.play().await
        }
    }

    /// Stops playback and cancels any load; the queue is kept
    pub async fn stop(&self) {
        {
            let mut core = self.core();
            core.supersede();
            core.go_idle();
        }
        if let Err(e) = self.sink.pause().await {
            debug!("Sink pause on stop failed: {}", e);
        }
    }

    /// Skips to the next track; at the end of a non-repeating queue nothing happens
    pub async fn next(&self) -> Result<()> {
        let index = {
            let mut guard = self.core();
            let core = &mut *guard;
            next_index(
                core.queue.len(),
                core.queue.current_index(),
                core.state.shuffle,
                core.state.repeat,
                &mut core.rng,
            )
        };
        match index {
            Some(index) => self.play_index(index).await,
            None => Ok(()),
        }
    }

    pub async fn previous(&self) -> Result<()> {
        let index = {
            let core = self.core();
            previous_index(core.queue.len(), core.queue.current_index(), core.state.repeat)
        };
        match index {
            Some(index) => self.play_index(index).await,
            None => Ok(()),
        }
    }

    /// Flips shuffle; enabling it reorders every track but the current one
    pub fn toggle_shuffle(&self) -> bool {
        let mut guard = self.core();
        let core = &mut *guard;
        core.state.shuffle = !core.state.shuffle;
        if core.state.shuffle {
            let keep = core.queue.current_index();
            shuffle_keeping_current(core.queue.tracks_mut(), keep, &mut core.rng);
        }
        info!(shuffle = core.state.shuffle, "Shuffle toggled");
        core.state.shuffle
    }

    /// `Off → All → One → Off`
    pub fn toggle_repeat(&self) -> RepeatMode {
        let mut core = self.core();
        core.state.repeat = core.state.repeat.cycle();
        info!(repeat = ?core.state.repeat, "Repeat mode changed");
        core.state.repeat
    }

    /// Sets the volume, clamped to 0..=100
    pub async fn set_volume(&self, volume: i32) -> Result<u8> {
        let volume = volume.clamp(0, 100) as u8;
        self.sink.set_volume(volume).await?;
        let mut core = self.core();
        core.state.volume = volume;
        if volume > 0 {
            core.muted_volume = None;
        }
        Ok(volume)
    }

    /// Mutes, or restores the volume in effect before muting
    pub async fn toggle_mute(&self) -> Result<u8> {
        let (target, muted_from) = {
            let core = self.core();
            match core.muted_volume {
                Some(previous) => (previous, None),
                None if core.state.volume == 0 => (DEFAULT_VOLUME, None),
                None => (0, Some(core.state.volume)),
            }
        };

        self.sink.set_volume(target).await?;
        let mut core = self.core();
        core.state.volume = target;
        core.muted_volume = muted_from;
        Ok(target)
    }

    /// Start of a seek gesture: the progress poll stops overwriting the position
    pub fn begin_seek(&self) {
        self.core().scrubbing = true;
    }

    /// End of a seek gesture: moves the sink to `position_seconds`
    pub async fn end_seek(&self, position_seconds: f64) -> Result<()> {
        let (position, loaded) = {
            let mut core = self.core();
            let mut position = if position_seconds.is_finite() {
                position_seconds.max(0.0)
            } else {
                0.0
            };
            if core.state.duration_seconds > 0 {
                position = position.min(core.state.duration_seconds as f64);
            }
            core.scrubbing = false;
            let loaded = matches!(
                core.state.status,
                PlaybackStatus::Playing | PlaybackStatus::Paused
            );
            if loaded {
                core.state.progress_seconds = position;
            }
            (position, loaded)
        };

        if loaded {
            self.sink.seek(position).await?;
        }
        Ok(())
    }

    pub async fn seek(&self, position_seconds: f64) -> Result<()> {
        self.begin_seek();
        self.end_seek(position_seconds).await
    }

    // ------------------------------------------------------------------
    // File d'attente
    // ------------------------------------------------------------------

    /// Replaces the queue with `tracks` and starts at `start`
    ///
    /// With shuffle on, the other tracks are shuffled around the start track.
    pub async fn play_collection(&self, tracks: Vec<Track>, start: usize) -> Result<()> {
        {
            let mut guard = self.core();
            let core = &mut *guard;
            core.queue = Queue::from_tracks(tracks);
            if core.queue.is_empty() {
                core.supersede();
                core.go_idle();
                return Ok(());
            }
            let start = start.min(core.queue.len() - 1);
            core.queue.select(start);
            if core.state.shuffle {
                shuffle_keeping_current(core.queue.tracks_mut(), Some(start), &mut core.rng);
            }
            info!(tracks = core.queue.len(), start, "New queue");
        }
        self.load_current().await
    }

    /// Appends a track; `false` if it is already queued
    pub fn enqueue(&self, track: Track) -> bool {
        self.core().queue.push(track).is_some()
    }

    /// Removes the track at `index`; removing the current track stops playback
    pub async fn remove(&self, index: usize) -> Option<Track> {
        let (removed, was_current) = {
            let mut core = self.core();
            let was_current = core.queue.current_index() == Some(index);
            let removed = core.queue.remove(index)?;
            if was_current {
                core.supersede();
                core.go_idle();
            }
            (removed, was_current)
        };

        if was_current {
            if let Err(e) = self.sink.pause().await {
                debug!("Sink pause after removal failed: {}", e);
            }
        }
        Some(removed)
    }

    // ------------------------------------------------------------------
    // Bibliothèque
    // ------------------------------------------------------------------

    /// Reloads the favourite ids from the library
    pub async fn refresh_favorites(&self) -> Result<usize> {
        let Some(library) = self.library.clone() else {
            return Ok(0);
        };
        let favorites = library.favorites().await?;
        let ids: HashSet<String> = favorites.into_iter().map(|t| t.id).collect();
        let count = ids.len();
        self.core().favorites = ids;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Événements du sink
    // ------------------------------------------------------------------

    /// Applies one sink event
    ///
    /// Events of an older generation are ignored, and `ended` is applied
    /// once per loaded source.
    pub async fn handle_sink_event(&self, event: SinkEvent) -> Result<()> {
        let generation = event.generation();
        let followup = {
            let mut guard = self.core();
            let core = &mut *guard;
            if generation != core.generation {
                trace!(generation, current = core.generation, "Stale sink event dropped");
                return Ok(());
            }

            match event {
                SinkEvent::LoadedMetadata { duration_seconds, .. } => {
                    if duration_seconds > 0 {
                        core.state.duration_seconds = duration_seconds;
                    }
                    Followup::Nothing
                }
                SinkEvent::TimeUpdate { position_seconds, .. } => {
                    if !core.scrubbing && position_seconds.is_finite() {
                        core.state.progress_seconds = position_seconds.max(0.0);
                    }
                    Followup::Nothing
                }
                SinkEvent::Ended { .. } => {
                    if core.ended_handled == Some(generation) {
                        return Ok(());
                    }
                    core.ended_handled = Some(generation);
                    match on_ended(
                        core.queue.len(),
                        core.queue.current_index(),
                        core.state.shuffle,
                        core.state.repeat,
                        &mut core.rng,
                    ) {
                        EndedAction::Restart => {
                            core.ended_handled = None;
                            core.state.progress_seconds = 0.0;
                            Followup::Restart
                        }
                        EndedAction::Advance(index) => {
                            core.queue.select(index);
                            Followup::LoadCurrent
                        }
                        EndedAction::Stop => {
                            info!(generation, "End of queue");
                            core.go_idle();
                            Followup::Nothing
                        }
                    }
                }
                SinkEvent::Error { message, .. } => {
                    warn!(generation, "Media sink cannot play the track: {}", message);
                    core.loading = None;
                    core.go_idle();
                    Followup::Nothing
                }
            }
        };

        match followup {
            Followup::Nothing => Ok(()),
            Followup::LoadCurrent => self.load_current().await,
            Followup::Restart => self.restart(generation).await,
        }
    }

    async fn restart(&self, generation: u64) -> Result<()> {
        let restarted = async {
            self.sink.seek(0.0).await?;
            self.sink.play().await
        }
        .await;

        let mut core = self.core();
        if core.generation != generation {
            return Ok(());
        }
        match restarted {
            Ok(()) => {
                core.state.status = PlaybackStatus::Playing;
                Ok(())
            }
            Err(e) => {
                warn!(generation, "Cannot restart track: {}", e);
                core.go_idle();
                Err(e.into())
            }
        }
    }

    /// Feeds sink events to the engine until every sender is dropped
    pub fn spawn_event_loop(&self, mut events: mpsc::Receiver<SinkEvent>) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(e) = engine.handle_sink_event(event).await {
                    debug!("Sink event not applied: {}", e);
                }
            }
            debug!("Sink event loop finished");
        })
    }

    /// Fallback progress poll
    ///
    /// While playing and not scrubbing, copies the sink position into the
    /// state every `period`. Ends once every engine handle is dropped.
    pub fn spawn_progress_poll(&self, period: Option<Duration>) -> JoinHandle<()> {
        let weak: Weak<Mutex<EngineCore>> = Arc::downgrade(&self.core);
        let sink = self.sink.clone();
        let period = period.unwrap_or(DEFAULT_PROGRESS_POLL);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(core) = weak.upgrade() else {
                    break;
                };
                let mut core = core.lock().unwrap_or_else(PoisonError::into_inner);
                if core.state.status == PlaybackStatus::Playing && !core.scrubbing {
                    if let Some(position) = sink.position() {
                        core.state.progress_seconds = position.max(0.0);
                    }
                }
            }
        })
    }
}
