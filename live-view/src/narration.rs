//! Sequential speech output: at most one utterance is in flight.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tokio::task::AbortHandle;
use tracing::{debug, info};

pub const DEFAULT_RATE: f32 = 1.03;
pub const DEFAULT_PITCH: f32 = 1.0;
pub const DEFAULT_VOLUME: f32 = 1.0;
const TRANSCRIPT_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrationSegment {
    pub text: String,
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,
}

impl NarrationSegment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rate: None,
            pitch: None,
            volume: None,
        }
    }

    pub fn rate(&self) -> f32 {
        self.rate.unwrap_or(DEFAULT_RATE)
    }

    pub fn pitch(&self) -> f32 {
        self.pitch.unwrap_or(DEFAULT_PITCH)
    }

    pub fn volume(&self) -> f32 {
        self.volume.unwrap_or(DEFAULT_VOLUME)
    }
}

impl From<&str> for NarrationSegment {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for NarrationSegment {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("speech engine failed: {0}")]
    Engine(String),
}

pub trait SpeechPort: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    /// Resolves when the utterance has finished. Dropping the future must
    /// stop the utterance where the engine supports it.
    fn speak(&self, segment: NarrationSegment) -> BoxFuture<'static, Result<(), SpeechError>>;

    fn cancel(&self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogSpeech;

impl SpeechPort for LogSpeech {
    fn is_available(&self) -> bool {
        false
    }

    fn speak(&self, segment: NarrationSegment) -> BoxFuture<'static, Result<(), SpeechError>> {
        log_segment(&segment);
        futures::future::ready(Ok(())).boxed()
    }
}

// espeak-compatible: `-s` words per minute, `-p` pitch 0-99, `-a` amplitude 0-200.
#[derive(Debug, Clone)]
pub struct ProcessSpeech {
    program: String,
}

impl ProcessSpeech {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl SpeechPort for ProcessSpeech {
    fn speak(&self, segment: NarrationSegment) -> BoxFuture<'static, Result<(), SpeechError>> {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .arg("-s")
            .arg(((175.0 * segment.rate()).round() as u32).to_string())
            .arg("-p")
            .arg(((50.0 * segment.pitch()).round().clamp(0.0, 99.0) as u32).to_string())
            .arg("-a")
            .arg(((100.0 * segment.volume()).round().clamp(0.0, 200.0) as u32).to_string())
            .arg("--")
            .arg(segment.text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        async move {
            let status = command
                .status()
                .await
                .map_err(|err| SpeechError::Engine(err.to_string()))?;
            if status.success() {
                Ok(())
            } else {
                Err(SpeechError::Engine(format!("exited with {status}")))
            }
        }
        .boxed()
    }
}

fn log_segment(segment: &NarrationSegment) {
    info!(target: "narration", "[White Elephant Host] {}", segment.text);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationStatus {
    pub enabled: bool,
    pub degraded: bool,
    pub speaking: Option<String>,
    pub queued: Vec<String>,
    pub recent: Vec<String>,
}

struct InFlight {
    generation: u64,
    text: String,
    task: AbortHandle,
}

#[derive(Default)]
struct QueueState {
    enabled: bool,
    closed: bool,
    queue: VecDeque<NarrationSegment>,
    in_flight: Option<InFlight>,
    generation: u64,
    transcript: VecDeque<String>,
}

impl QueueState {
    fn record(&mut self, text: &str) {
        if self.transcript.len() == TRANSCRIPT_LEN {
            self.transcript.pop_front();
        }
        self.transcript.push_back(text.to_string());
    }
}

struct Shared {
    speech: Arc<dyn SpeechPort>,
    state: Mutex<QueueState>,
}

#[derive(Clone)]
pub struct NarrationScheduler {
    shared: Arc<Shared>,
}

impl NarrationScheduler {
    pub fn new(speech: Arc<dyn SpeechPort>, enabled: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                speech,
                state: Mutex::new(QueueState {
                    enabled,
                    ..QueueState::default()
                }),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_enabled(&self) -> bool {
        let state = self.state();
        state.enabled && !state.closed
    }

    /// Appends segments. With `interrupt` the queue and any in-flight
    /// utterance are dropped first, so only these segments remain.
    pub fn enqueue<I>(&self, segments: I, interrupt: bool)
    where
        I: IntoIterator<Item = NarrationSegment>,
    {
        let segments: Vec<NarrationSegment> = segments
            .into_iter()
            .filter(|segment| !segment.text.trim().is_empty())
            .collect();
        if segments.is_empty() {
            return;
        }

        let mut state = self.state();
        if !state.enabled || state.closed {
            return;
        }

        if !self.shared.speech.is_available() {
            for segment in &segments {
                log_segment(segment);
                state.record(&segment.text);
            }
            return;
        }

        if interrupt {
            self.halt(&mut state);
        }
        state.queue.extend(segments);
        self.start_next(&mut state);
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.state();
        state.enabled = enabled;
        if !enabled {
            self.halt(&mut state);
        }
    }

    pub fn cancel_all(&self) {
        let mut state = self.state();
        self.halt(&mut state);
    }

    pub fn shutdown(&self) {
        let mut state = self.state();
        state.closed = true;
        self.halt(&mut state);
    }

    pub fn status(&self) -> NarrationStatus {
        let state = self.state();
        NarrationStatus {
            enabled: state.enabled && !state.closed,
            degraded: !self.shared.speech.is_available(),
            speaking: state.in_flight.as_ref().map(|f| f.text.clone()),
            queued: state.queue.iter().map(|s| s.text.clone()).collect(),
            recent: state.transcript.iter().cloned().collect(),
        }
    }

    fn halt(&self, state: &mut QueueState) {
        state.queue.clear();
        if let Some(in_flight) = state.in_flight.take() {
            in_flight.task.abort();
            self.shared.speech.cancel();
            debug!(target: "narration", text = %in_flight.text, "utterance cancelled");
        }
    }

    fn start_next(&self, state: &mut QueueState) {
        if state.in_flight.is_some() {
            return;
        }
        let Some(segment) = state.queue.pop_front() else {
            return;
        };

        state.generation += 1;
        let generation = state.generation;
        let text = segment.text.clone();
        state.record(&text);

        let utterance = self.shared.speech.speak(segment);
        let scheduler = self.clone();
        let task = tokio::spawn(async move {
            if let Err(err) = utterance.await {
                debug!(target: "narration", %err, "utterance failed, continuing");
            }
            scheduler.finished(generation);
        });

        state.in_flight = Some(InFlight {
            generation,
            text,
            task: task.abort_handle(),
        });
    }

    fn finished(&self, generation: u64) {
        let mut state = self.state();
        let current = state.in_flight.as_ref().map(|f| f.generation);
        if current != Some(generation) {
            return;
        }
        state.in_flight = None;
        self.start_next(&mut state);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Each utterance takes `duration`; tracks overlap.
    #[derive(Default)]
    pub(crate) struct TimedSpeech {
        duration: Duration,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
        started: Mutex<Vec<String>>,
        fail: bool,
    }

    struct ActiveGuard(Arc<AtomicUsize>);

    impl Drop for ActiveGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl TimedSpeech {
        fn new(duration: Duration) -> Self {
            Self {
                duration,
                ..Self::default()
            }
        }

        fn started(&self) -> Vec<String> {
            self.started.lock().unwrap().clone()
        }
    }

    impl SpeechPort for TimedSpeech {
        fn speak(&self, segment: NarrationSegment) -> BoxFuture<'static, Result<(), SpeechError>> {
            self.started.lock().unwrap().push(segment.text);
            let active = self.active.clone();
            let max_active = self.max_active.clone();
            let duration = self.duration;
            let fail = self.fail;
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                let _guard = ActiveGuard(active);
                tokio::time::sleep(duration).await;
                if fail {
                    Err(SpeechError::Engine("boom".into()))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }
    }

    /// Never finishes speaking, so the queue stays observable.
    #[derive(Default)]
    pub(crate) struct StuckSpeech;

    impl SpeechPort for StuckSpeech {
        fn speak(&self, _segment: NarrationSegment) -> BoxFuture<'static, Result<(), SpeechError>> {
            futures::future::pending().boxed()
        }
    }

    struct MissingSpeech {
        calls: AtomicUsize,
    }

    impl SpeechPort for MissingSpeech {
        fn is_available(&self) -> bool {
            false
        }

        fn speak(&self, _segment: NarrationSegment) -> BoxFuture<'static, Result<(), SpeechError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(())).boxed()
        }
    }

    fn lines(texts: &[&str]) -> Vec<NarrationSegment> {
        texts.iter().map(|t| NarrationSegment::from(*t)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn speaks_in_order_one_at_a_time() {
        let speech = Arc::new(TimedSpeech::new(Duration::from_millis(100)));
        let scheduler = NarrationScheduler::new(speech.clone(), true);

        scheduler.enqueue(lines(&["one", "two"]), false);
        scheduler.enqueue(lines(&["three"]), false);
        let status = scheduler.status();
        assert_eq!(status.speaking.as_deref(), Some("one"));
        assert_eq!(status.queued, vec!["two", "three"]);

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(speech.started(), vec!["one", "two", "three"]);
        assert_eq!(speech.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.status().speaking, None);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_leaves_only_new_segments() {
        let speech = Arc::new(TimedSpeech::new(Duration::from_millis(100)));
        let scheduler = NarrationScheduler::new(speech.clone(), true);
        scheduler.enqueue(lines(&["stale 1", "stale 2", "stale 3"]), false);

        scheduler.enqueue(lines(&["shuffle!", "first up"]), true);
        let status = scheduler.status();
        assert_eq!(status.speaking.as_deref(), Some("shuffle!"));
        assert_eq!(status.queued, vec!["first up"]);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(speech.started(), vec!["stale 1", "shuffle!", "first up"]);
    }

    #[tokio::test(start_paused = true)]
    async fn engine_errors_count_as_completion() {
        let speech = Arc::new(TimedSpeech {
            fail: true,
            ..TimedSpeech::new(Duration::from_millis(10))
        });
        let scheduler = NarrationScheduler::new(speech.clone(), true);
        scheduler.enqueue(lines(&["a", "b"]), false);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(speech.started(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn muting_clears_everything_and_drops_new_segments() {
        let scheduler = NarrationScheduler::new(Arc::new(StuckSpeech), true);
        scheduler.enqueue(lines(&["a", "b"]), false);

        scheduler.set_enabled(false);
        let status = scheduler.status();
        assert!(!status.enabled);
        assert_eq!(status.speaking, None);
        assert!(status.queued.is_empty());

        scheduler.enqueue(lines(&["c"]), false);
        assert_eq!(scheduler.status().speaking, None);

        scheduler.set_enabled(true);
        scheduler.enqueue(lines(&["d"]), false);
        assert_eq!(scheduler.status().speaking.as_deref(), Some("d"));
    }

    #[tokio::test]
    async fn missing_engine_degrades_to_log_in_order() {
        let speech = Arc::new(MissingSpeech {
            calls: AtomicUsize::new(0),
        });
        let scheduler = NarrationScheduler::new(speech.clone(), true);
        scheduler.enqueue(lines(&["first", "", "second"]), false);
        scheduler.enqueue(lines(&["third"]), true);

        let status = scheduler.status();
        assert!(status.degraded);
        assert_eq!(status.recent, vec!["first", "second", "third"]);
        assert_eq!(status.speaking, None);
        assert_eq!(speech.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn shutdown_is_final() {
        let scheduler = NarrationScheduler::new(Arc::new(StuckSpeech), true);
        scheduler.enqueue(lines(&["a"]), false);
        scheduler.shutdown();
        scheduler.set_enabled(true);
        scheduler.enqueue(lines(&["b"]), false);
        assert_eq!(scheduler.status().speaking, None);
        assert!(!scheduler.is_enabled());
    }

    async fn wait_until_idle(scheduler: &NarrationScheduler) {
        for _ in 0..100 {
            let status = scheduler.status();
            if status.speaking.is_none() && status.queued.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("narration never went idle");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_engine_moves_on_to_the_next_line() {
        let scheduler = NarrationScheduler::new(Arc::new(ProcessSpeech::new("false")), true);
        scheduler.enqueue(lines(&["first", "second"]), false);

        wait_until_idle(&scheduler).await;
        assert_eq!(scheduler.status().recent, vec!["first", "second"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn interrupt_kills_running_engine_and_text_is_never_a_flag() {
        use std::os::unix::fs::PermissionsExt;

        let script = std::env::temp_dir().join(format!("narration_{}.sh", uuid::Uuid::new_v4()));
        let spoken = script.with_extension("out");
        // $8 is the text: -s N -p N -a N -- text
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nsleep 1\nprintf '%s\\n' \"$8\" >> '{}'\n",
                spoken.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let engine = ProcessSpeech::new(script.display().to_string());
        let scheduler = NarrationScheduler::new(Arc::new(engine), true);
        scheduler.enqueue(lines(&["stale"]), false);
        tokio::time::sleep(Duration::from_millis(300)).await;
        scheduler.enqueue(lines(&["-Jo, step up to the gift mountain!"]), true);

        wait_until_idle(&scheduler).await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        let written = std::fs::read_to_string(&spoken).unwrap();
        assert_eq!(written, "-Jo, step up to the gift mountain!\n");

        let _ = std::fs::remove_file(&script);
        let _ = std::fs::remove_file(&spoken);
    }
}
