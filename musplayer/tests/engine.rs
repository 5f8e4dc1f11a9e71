//! Playback engine scenarios with an in-memory sink and fetcher

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use musclient::ByteStream;
use musmodel::Track;
use musplayer::{
    FetchError, Library, MediaSink, MediaSource, PlaybackEngine, PlaybackStatus, PlayerError,
    RepeatMode, SinkError, SinkEvent, StreamFetcher,
};
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Attach(u64, String),
    Play,
    Pause,
    Seek(f64),
    Volume(u8),
}

#[derive(Default)]
struct FakeSink {
    calls: Mutex<Vec<Call>>,
    position: Mutex<Option<f64>>,
    fail_attach: Mutex<HashSet<String>>,
    slow_attach: Mutex<HashMap<String, Duration>>,
    last_generation: Mutex<u64>,
}

impl FakeSink {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn attached(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Attach(_, id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn set_position(&self, position: f64) {
        *self.position.lock().unwrap() = Some(position);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MediaSink for FakeSink {
    async fn attach(&self, generation: u64, source: MediaSource) -> Result<(), SinkError> {
        let delay = self.slow_attach.lock().unwrap().get(&source.track.id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_attach.lock().unwrap().contains(&source.track.id) {
            return Err(SinkError::new("cannot decode"));
        }
        {
            let mut last = self.last_generation.lock().unwrap();
            if generation < *last {
                return Err(SinkError::new("older source refused"));
            }
            *last = generation;
        }
        self.record(Call::Attach(generation, source.track.id));
        Ok(())
    }

    async fn play(&self) -> Result<(), SinkError> {
        self.record(Call::Play);
        Ok(())
    }

    async fn pause(&self) -> Result<(), SinkError> {
        self.record(Call::Pause);
        Ok(())
    }

    async fn seek(&self, position_seconds: f64) -> Result<(), SinkError> {
        self.record(Call::Seek(position_seconds));
        Ok(())
    }

    async fn set_volume(&self, volume: u8) -> Result<(), SinkError> {
        self.record(Call::Volume(volume));
        Ok(())
    }

    fn position(&self) -> Option<f64> {
        *self.position.lock().unwrap()
    }
}

/// Answers after `delay`; tracks whose id starts with `bad` fail
#[derive(Default)]
struct FakeFetcher {
    delay: Duration,
    started: AtomicUsize,
    completed: AtomicUsize,
}

impl FakeFetcher {
    fn delayed(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }
}

#[async_trait]
impl StreamFetcher for FakeFetcher {
    async fn fetch(&self, track: &Track) -> Result<ByteStream, FetchError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        if track.id.starts_with("bad") {
            return Err(FetchError::MissingLocator(track.id.clone()));
        }
        Ok(futures::stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(b"ID3"))]).boxed())
    }
}

#[derive(Default)]
struct FakeLibrary {
    plays: Mutex<Vec<String>>,
}

#[async_trait]
impl Library for FakeLibrary {
    async fn record_play(&self, track: &Track) -> Result<(), FetchError> {
        self.plays.lock().unwrap().push(track.id.clone());
        Ok(())
    }

    async fn favorites(&self) -> Result<Vec<Track>, FetchError> {
        Ok(vec![track("t2")])
    }
}

fn track(id: &str) -> Track {
    Track::new(id, format!("Song {id}"), "Artist", 180, format!("http://media.test/{id}.mp3"))
}

fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| track(id)).collect()
}

fn engine_with(sink: Arc<FakeSink>, fetcher: Arc<FakeFetcher>) -> PlaybackEngine {
    PlaybackEngine::builder(sink, fetcher).seed(42).build()
}

fn engine() -> (PlaybackEngine, Arc<FakeSink>) {
    let sink = Arc::new(FakeSink::default());
    (engine_with(sink.clone(), Arc::new(FakeFetcher::default())), sink)
}

async fn ended(engine: &PlaybackEngine) {
    let generation = engine.generation();
    engine
        .handle_sink_event(SinkEvent::Ended { generation })
        .await
        .unwrap();
}

fn current_id(engine: &PlaybackEngine) -> Option<String> {
    engine.current_track().map(|t| t.id)
}

#[tokio::test]
async fn test_sequential_queue_runs_to_idle() {
    let (engine, sink) = engine();
    engine.play_collection(tracks(&["t1", "t2", "t3"]), 0).await.unwrap();
    assert_eq!(engine.status(), PlaybackStatus::Playing);

    let mut visited = vec![current_id(&engine).unwrap()];
    for _ in 0..3 {
        ended(&engine).await;
        if engine.status() == PlaybackStatus::Playing {
            visited.push(current_id(&engine).unwrap());
        }
    }

    assert_eq!(visited, vec!["t1", "t2", "t3"]);
    assert_eq!(engine.status(), PlaybackStatus::Idle);
    assert_eq!(engine.state().progress_seconds, 0.0);
    assert_eq!(engine.current_index(), Some(2));
    assert_eq!(sink.attached(), vec!["t1", "t2", "t3"]);
}

#[tokio::test]
async fn test_repeat_one_restarts_indefinitely() {
    let (engine, sink) = engine();
    engine.play_collection(tracks(&["t1", "t2"]), 1).await.unwrap();
    engine.toggle_repeat();
    assert_eq!(engine.toggle_repeat(), RepeatMode::One);

    for _ in 0..5 {
        ended(&engine).await;
        assert_eq!(engine.status(), PlaybackStatus::Playing);
        assert_eq!(current_id(&engine).as_deref(), Some("t2"));
    }
    assert_eq!(sink.count(&Call::Seek(0.0)), 5);
    assert_eq!(sink.attached(), vec!["t2"]);
}

#[tokio::test]
async fn test_repeat_all_wraps_to_first_track() {
    let (engine, _) = engine();
    engine.play_collection(tracks(&["t1", "t2", "t3"]), 2).await.unwrap();
    assert_eq!(engine.toggle_repeat(), RepeatMode::All);

    ended(&engine).await;
    assert_eq!(engine.current_index(), Some(0));
    assert_eq!(engine.status(), PlaybackStatus::Playing);

    engine.previous().await.unwrap();
    assert_eq!(engine.current_index(), Some(2));
}

#[tokio::test]
async fn test_manual_next_and_previous_at_edges() {
    let (engine, sink) = engine();
    engine.play_collection(tracks(&["t1", "t2"]), 0).await.unwrap();

    engine.previous().await.unwrap();
    assert_eq!(engine.current_index(), Some(0));

    engine.next().await.unwrap();
    assert_eq!(engine.current_index(), Some(1));

    engine.next().await.unwrap();
    assert_eq!(engine.current_index(), Some(1));
    assert_eq!(engine.status(), PlaybackStatus::Playing);
    assert_eq!(sink.attached(), vec!["t1", "t2"]);
}

#[tokio::test]
async fn test_empty_queue_controls_are_noops() {
    let (engine, sink) = engine();
    engine.play().await.unwrap();
    engine.pause().await.unwrap();
    engine.next().await.unwrap();
    engine.previous().await.unwrap();
    ended(&engine).await;

    assert_eq!(engine.status(), PlaybackStatus::Idle);
    assert!(sink.calls().is_empty());
}

#[tokio::test]
async fn test_pause_is_idempotent() {
    let (engine, sink) = engine();
    engine.play_collection(tracks(&["t1"]), 0).await.unwrap();

    engine.pause().await.unwrap();
    let after_one = (engine.state(), sink.count(&Call::Pause));
    engine.pause().await.unwrap();
    let after_two = (engine.state(), sink.count(&Call::Pause));

    assert_eq!(after_one, after_two);
    assert_eq!(engine.status(), PlaybackStatus::Paused);

    engine.play().await.unwrap();
    assert_eq!(engine.status(), PlaybackStatus::Playing);
    assert_eq!(sink.attached(), vec!["t1"]);
}

#[tokio::test]
async fn test_shuffle_keeps_current_track_in_place() {
    let (engine, _) = engine();
    let ids = ["a", "b", "c", "d", "e", "f", "g", "h"];
    engine.play_collection(tracks(&ids), 3).await.unwrap();

    assert!(engine.toggle_shuffle());
    let queue: Vec<String> = engine.queue().into_iter().map(|t| t.id).collect();

    assert_eq!(engine.current_index(), Some(3));
    assert_eq!(queue[3], "d");
    let mut sorted = queue.clone();
    sorted.sort();
    assert_eq!(sorted, ids);

    for _ in 0..20 {
        let before = engine.current_index();
        engine.next().await.unwrap();
        assert_ne!(engine.current_index(), before);
    }
}

#[tokio::test]
async fn test_failed_fetch_returns_to_idle() {
    let (engine, sink) = engine();
    let result = engine.play_collection(tracks(&["bad1", "t2"]), 0).await;

    assert!(matches!(result, Err(PlayerError::Fetch(_))));
    assert_eq!(engine.status(), PlaybackStatus::Idle);
    assert_eq!(engine.queue().len(), 2);
    assert!(sink.attached().is_empty());

    engine.play_index(1).await.unwrap();
    assert_eq!(engine.status(), PlaybackStatus::Playing);
}

#[tokio::test]
async fn test_decode_failure_returns_to_idle() {
    let (engine, sink) = engine();
    sink.fail_attach.lock().unwrap().insert("t1".to_string());

    let result = engine.load_track(track("t1")).await;
    assert!(matches!(result, Err(PlayerError::Sink(_))));
    assert_eq!(engine.status(), PlaybackStatus::Idle);

    engine.load_track(track("t2")).await.unwrap();
    let generation = engine.generation();
    engine
        .handle_sink_event(SinkEvent::Error {
            generation,
            message: "corrupt frame".into(),
        })
        .await
        .unwrap();
    assert_eq!(engine.status(), PlaybackStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_second_load_supersedes_first() {
    let sink = Arc::new(FakeSink::default());
    let fetcher = Arc::new(FakeFetcher::delayed(Duration::from_millis(50)));
    let engine = engine_with(sink.clone(), fetcher.clone());
    let t = track("t1");

    let (first, second) = tokio::join!(engine.load_track(t.clone()), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.load_track(t.clone()).await
    });

    assert!(matches!(first, Err(PlayerError::Superseded(_))));
    assert!(second.is_ok());
    assert_eq!(fetcher.started.load(Ordering::SeqCst), 2);
    assert_eq!(fetcher.completed.load(Ordering::SeqCst), 1);
    assert_eq!(sink.attached(), vec!["t1"]);
    assert_eq!(engine.queue().len(), 1);
    assert_eq!(engine.status(), PlaybackStatus::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_stale_load_never_overwrites_newer_track() {
    let sink = Arc::new(FakeSink::default());
    let fetcher = Arc::new(FakeFetcher::delayed(Duration::from_millis(50)));
    let engine = engine_with(sink.clone(), fetcher);

    let (slow, fast) = tokio::join!(engine.load_track(track("old")), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.load_track(track("new")).await
    });

    assert!(slow.is_err());
    assert!(fast.is_ok());
    assert_eq!(current_id(&engine).as_deref(), Some("new"));
    assert_eq!(sink.attached(), vec!["new"]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_attach_of_older_track_never_replaces_newer_one() {
    let sink = Arc::new(FakeSink::default());
    sink.slow_attach
        .lock()
        .unwrap()
        .insert("old".to_string(), Duration::from_millis(100));
    let engine = engine_with(sink.clone(), Arc::new(FakeFetcher::default()));

    let (slow, fast) = tokio::join!(engine.load_track(track("old")), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.load_track(track("new")).await
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(matches!(slow, Err(PlayerError::Superseded(id)) if id == "old"));
    assert!(fast.is_ok());
    assert_eq!(current_id(&engine).as_deref(), Some("new"));
    assert_eq!(engine.status(), PlaybackStatus::Playing);
    assert_eq!(sink.attached(), vec!["new"]);
    assert_eq!(sink.calls().last(), Some(&Call::Play));
    assert_eq!(sink.count(&Call::Play), 1);
}

#[tokio::test]
async fn test_events_of_replaced_source_are_ignored() {
    let (engine, _) = engine();
    engine.play_collection(tracks(&["t1", "t2", "t3"]), 0).await.unwrap();
    let old = engine.generation();
    engine.next().await.unwrap();

    engine
        .handle_sink_event(SinkEvent::Ended { generation: old })
        .await
        .unwrap();
    engine
        .handle_sink_event(SinkEvent::TimeUpdate {
            generation: old,
            position_seconds: 99.0,
        })
        .await
        .unwrap();

    assert_eq!(engine.current_index(), Some(1));
    assert_eq!(engine.state().progress_seconds, 0.0);
}

#[tokio::test]
async fn test_ended_is_applied_once_per_track() {
    let (engine, _) = engine();
    engine.play_collection(tracks(&["t1", "t2", "t3"]), 0).await.unwrap();
    let generation = engine.generation();

    let (tx, rx) = mpsc::channel(8);
    let events = engine.spawn_event_loop(rx);
    tx.send(SinkEvent::LoadedMetadata {
        generation,
        duration_seconds: 240,
    })
    .await
    .unwrap();
    tx.send(SinkEvent::Ended { generation }).await.unwrap();
    tx.send(SinkEvent::Ended { generation }).await.unwrap();
    drop(tx);
    events.await.unwrap();

    assert_eq!(engine.current_index(), Some(1));
}

#[tokio::test]
async fn test_progress_updates_and_seek_gesture() {
    let (engine, sink) = engine();
    engine.play_collection(tracks(&["t1"]), 0).await.unwrap();
    let generation = engine.generation();

    engine
        .handle_sink_event(SinkEvent::LoadedMetadata {
            generation,
            duration_seconds: 200,
        })
        .await
        .unwrap();
    engine
        .handle_sink_event(SinkEvent::TimeUpdate {
            generation,
            position_seconds: 50.0,
        })
        .await
        .unwrap();
    assert_eq!(engine.snapshot().progress_percent, 25.0);

    engine.begin_seek();
    engine
        .handle_sink_event(SinkEvent::TimeUpdate {
            generation,
            position_seconds: 60.0,
        })
        .await
        .unwrap();
    assert_eq!(engine.state().progress_seconds, 50.0);

    engine.end_seek(500.0).await.unwrap();
    assert_eq!(engine.state().progress_seconds, 200.0);
    assert_eq!(sink.count(&Call::Seek(200.0)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_progress_poll_skips_while_scrubbing() {
    let (engine, sink) = engine();
    engine.play_collection(tracks(&["t1"]), 0).await.unwrap();
    let poll = engine.spawn_progress_poll(Some(Duration::from_secs(1)));

    sink.set_position(12.0);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(engine.state().progress_seconds, 12.0);

    engine.begin_seek();
    sink.set_position(30.0);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(engine.state().progress_seconds, 12.0);

    engine.pause().await.unwrap();
    engine.end_seek(20.0).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(engine.state().progress_seconds, 20.0);

    poll.abort();
}

#[tokio::test]
async fn test_volume_and_mute() {
    let (engine, sink) = engine();
    assert_eq!(engine.set_volume(150).await.unwrap(), 100);
    assert_eq!(engine.set_volume(-3).await.unwrap(), 0);
    engine.set_volume(70).await.unwrap();

    assert_eq!(engine.toggle_mute().await.unwrap(), 0);
    assert!(engine.snapshot().muted);
    assert_eq!(engine.toggle_mute().await.unwrap(), 70);
    assert!(!engine.snapshot().muted);
    assert_eq!(sink.calls().last(), Some(&Call::Volume(70)));
}

#[tokio::test]
async fn test_queue_editing() {
    let (engine, sink) = engine();
    engine.play_collection(tracks(&["t1", "t2"]), 1).await.unwrap();

    assert!(engine.enqueue(track("t3")));
    assert!(!engine.enqueue(track("t1")));

    assert_eq!(engine.remove(0).await.map(|t| t.id).as_deref(), Some("t1"));
    assert_eq!(current_id(&engine).as_deref(), Some("t2"));
    assert_eq!(engine.status(), PlaybackStatus::Playing);

    engine.remove(0).await;
    assert_eq!(engine.status(), PlaybackStatus::Idle);
    assert_eq!(engine.current_index(), None);
    assert_eq!(sink.calls().last(), Some(&Call::Pause));

    engine.play().await.unwrap();
    assert_eq!(current_id(&engine).as_deref(), Some("t3"));
}

#[tokio::test]
async fn test_library_records_plays_and_favourites() {
    let sink = Arc::new(FakeSink::default());
    let library = Arc::new(FakeLibrary::default());
    let engine = PlaybackEngine::builder(sink, Arc::new(FakeFetcher::default()))
        .library(library.clone())
        .seed(1)
        .build();

    assert_eq!(engine.refresh_favorites().await.unwrap(), 1);
    engine.play_collection(tracks(&["t1", "t2"]), 1).await.unwrap();
    tokio::task::yield_now().await;

    assert_eq!(*library.plays.lock().unwrap(), vec!["t2"]);
    let snapshot = engine.snapshot();
    assert!(snapshot.favorite);
    assert_eq!(snapshot.total, "3:00");
    assert!(engine.is_favorite("t2"));
    assert!(!engine.is_favorite("t1"));
}
