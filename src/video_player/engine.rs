// SPDX-License-Identifier: MPL-2.0
//! The playback engine: transport API on the host side and the decode loop
//! on a dedicated thread.
//!
//! # Threads
//!
//! Exactly one decode thread exists per playback session. It creates its
//! [`FrameSource`] through the factory given to the engine, owns it for the
//! whole session and closes it before the thread exits; the host never
//! touches the source. The host talks to the loop only through the flags
//! of the shared state and reads the latest committed state from there.
//!
//! # Loop
//!
//! Each iteration, in order:
//! 1. exit if the session's stop flag is raised;
//! 2. apply a pending seek (`seek_to`, index reset to
//!    `frame_rate_hz * target`, audio cleared);
//! 3. while paused, sleep [`PAUSE_POLL_QUANTUM`] and start over;
//! 4. decode one frame, commit it, emit `FrameReady` (and `SecondElapsed`
//!    on whole multiples of the frame rate), then pace.
//!
//! End of stream and decode errors both end the session; a decode error is
//! logged and reported through [`EndReason::DecodeError`], never returned
//! to the host.
//!
//! `stop()` and `play()` called from a notification callback run on the
//! decode thread itself. They cannot wait for that thread, so they only
//! raise flags: the loop winds down after the callback returns, and a
//! requested restart opens a fresh source on the same thread once the old
//! one is closed.

use crate::application::port::{AudioSink, DecodeOutcome, FrameSource};
use crate::config::defaults::{DEFAULT_CONSISTENT_FRAME_RATE, PAUSE_POLL_QUANTUM, SHUTDOWN_GRACE};
use crate::config::PlayerConfig;
use crate::domain::error::VideoError;
use crate::domain::media::PixelBuffer;
use crate::domain::video::{FrameSnapshot, Metadata, PlaybackState, VideoInfo};
use crate::error::{Error, Result};
use crate::video_player::export::{save_frame, ExportFormat};
use crate::video_player::notification::{EndReason, Notification, SubscriptionId};
use crate::video_player::pacing::{PacingGovernor, PacingStats};
use crate::video_player::render::{RenderSettings, ResampleFilter};
use crate::video_player::shared::Shared;
use crate::video_player::time_units::frame_index_at;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;

/// Creates a fresh frame source for each session.
pub type SourceFactory = Arc<dyn Fn() -> Box<dyn FrameSource> + Send + Sync>;

/// Opens an audio output for a session whose stream carries audio.
pub type AudioSinkFactory = Arc<dyn Fn() -> Result<Box<dyn AudioSink>> + Send + Sync>;

/// Embeddable video player.
///
/// All methods take `&self` and may be called from any thread. Transport
/// operations other than `play` never block on decoding.
///
/// Notification callbacks run on the decode thread. Transport calls made
/// from them are deferred until the callback returns; use
/// [`notifications`](Self::notifications) to handle events elsewhere.
pub struct PlaybackEngine {
    factory: SourceFactory,
    audio_output: Option<AudioSinkFactory>,
    audio_enabled: AtomicBool,
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
    path: Mutex<Option<PathBuf>>,
    render: Mutex<RenderSettings>,
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("state", &self.state())
            .field("path", &self.path())
            .field("frame_index", &self.current_frame_number())
            .finish_non_exhaustive()
    }
}

/// Stop and restart requests for one decode thread.
#[derive(Debug, Default)]
struct SessionControl {
    stop: AtomicBool,
    restart: Mutex<Option<PathBuf>>,
}

impl SessionControl {
    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Raises the stop flag and drops any pending restart.
    fn request_stop(&self) {
        let mut restart = lock(&self.restart);
        *restart = None;
        self.stop.store(true, Ordering::Release);
    }

    fn request_restart(&self, path: PathBuf) {
        *lock(&self.restart) = Some(path);
    }

    /// Takes a pending restart and lowers the stop flag under the same
    /// lock, so a concurrent `request_stop` is never lost.
    fn take_restart(&self) -> Option<PathBuf> {
        let mut restart = lock(&self.restart);
        let path = restart.take()?;
        self.stop.store(false, Ordering::Release);
        Some(path)
    }
}

struct Session {
    handle: JoinHandle<()>,
    control: Arc<SessionControl>,
}

impl Session {
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Whether the caller is this session's decode thread (a notification
    /// callback).
    fn is_current_thread(&self) -> bool {
        self.handle.thread().id() == thread::current().id()
    }

    fn request_stop(&self) {
        self.control.request_stop();
    }

    /// Waits for the decode thread. On the decode thread itself the handle
    /// is detached: the stop flag is raised and the thread exits after the
    /// current callback.
    fn join(self) {
        if self.is_current_thread() {
            return;
        }
        if self.handle.join().is_err() {
            log::warn!("decode thread panicked");
        }
    }

    /// Like [`join`](Self::join) but gives up after `SHUTDOWN_GRACE`.
    fn join_with_grace(self) {
        if self.is_current_thread() {
            log::debug!("engine dropped on its decode thread, detaching");
            return;
        }
        let started = Instant::now();
        while self.is_running() && started.elapsed() < SHUTDOWN_GRACE {
            thread::sleep(PAUSE_POLL_QUANTUM);
        }
        if self.is_running() {
            log::warn!("decode thread still running after {SHUTDOWN_GRACE:?}, detaching");
            return;
        }
        self.join();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PlaybackEngine {
    /// Creates an engine pulling frames from sources built by `factory`.
    ///
    /// The factory is called on the decode thread at the start of every
    /// session, so the sources it returns need not be `Send`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn FrameSource> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            audio_output: None,
            audio_enabled: AtomicBool::new(true),
            shared: Arc::new(Shared::new(DEFAULT_CONSISTENT_FRAME_RATE)),
            session: Mutex::new(None),
            path: Mutex::new(None),
            render: Mutex::new(RenderSettings::default()),
        }
    }

    /// Adds an audio output, opened on the decode thread for streams with
    /// audio. Audio starts with the video and follows pause and seek; there
    /// is no finer synchronisation.
    #[must_use]
    pub fn with_audio_output<A>(mut self, factory: A) -> Self
    where
        A: Fn() -> Result<Box<dyn AudioSink>> + Send + Sync + 'static,
    {
        self.audio_output = Some(Arc::new(factory));
        self
    }

    /// Applies `config` and returns the engine.
    #[must_use]
    pub fn with_config(self, config: &PlayerConfig) -> Self {
        self.apply_config(config);
        self
    }

    /// Applies every toggle of `config`. Audio changes take effect at the
    /// next session.
    pub fn apply_config(&self, config: &PlayerConfig) {
        self.shared
            .set_consistent_frame_rate(config.consistent_frame_rate);
        self.audio_enabled
            .store(config.audio_enabled, Ordering::Relaxed);
        let mut render = lock(&self.render);
        render.scaled = config.scaled;
        render.keep_aspect = config.keep_aspect;
        render.explicit_size = config.target_size();
        render.filter = config.resampling;
    }

    // ======================================================================
    // Transport
    // ======================================================================

    /// Records `path` as the media to play, stopping any running session
    /// first. Playback does not start and pending seeks are discarded.
    pub fn load(&self, path: impl AsRef<Path>) {
        self.stop();
        let path = path.as_ref().to_path_buf();
        log::debug!("loaded {}", path.display());
        *lock(&self.path) = Some(path);
        self.shared.take_pending_seek();
        self.shared.clear_stream();
        self.shared.set_state(PlaybackState::Idle);
    }

    /// Starts playback, or resumes it when a session is already running.
    ///
    /// Starting waits for the previous decode thread to exit, then opens
    /// the source on a new thread and waits for the result, so open
    /// failures are returned here. At most one decode thread exists at any
    /// time.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::NothingLoaded`] without a path, and the
    /// source's open error (typically [`VideoError::UnsupportedMedia`])
    /// when the media cannot be played. The state is then `Stopped`.
    /// Called from a notification callback, open errors are only logged.
    pub fn play(&self) -> std::result::Result<(), VideoError> {
        let mut slot = lock(&self.session);

        if let Some(session) = slot.as_ref() {
            if session.is_current_thread() {
                return self.play_on_decode_thread(session);
            }
            if session.is_running()
                && !session.control.stop_requested()
                && self.shared.raw_state().has_session()
            {
                self.shared.set_paused(false);
                return Ok(());
            }
        }
        if let Some(previous) = slot.take() {
            previous.request_stop();
            previous.join();
        }

        let path = lock(&self.path).clone().ok_or(VideoError::NothingLoaded)?;

        self.shared.set_paused(false);
        self.shared.set_state(PlaybackState::Loading);

        let control = Arc::new(SessionControl::default());
        let (opened_tx, opened_rx) = mpsc::channel();
        let context = SessionContext {
            factory: Arc::clone(&self.factory),
            audio_output: self
                .audio_output
                .clone()
                .filter(|_| self.audio_enabled.load(Ordering::Relaxed)),
            shared: Arc::clone(&self.shared),
            control: Arc::clone(&control),
        };
        let handle = thread::Builder::new()
            .name("framepace-decode".to_string())
            .spawn(move || context.run(path, &opened_tx))
            .map_err(|err| {
                self.shared.set_state(PlaybackState::Stopped);
                VideoError::Io(format!("cannot spawn decode thread: {err}"))
            })?;
        let session = Session { handle, control };

        let opened = match opened_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(VideoError::DecodeFailed(
                "decode thread exited before opening".to_string(),
            )),
        };

        match opened {
            Ok(()) => {
                *slot = Some(session);
                Ok(())
            }
            Err(err) => {
                session.join();
                self.shared.set_state(PlaybackState::Stopped);
                log::debug!("play failed: {err}");
                Err(err)
            }
        }
    }

    /// `play()` from a notification callback: resumes the live session, or
    /// asks the decode thread to start a new one once the current one has
    /// wound down.
    fn play_on_decode_thread(&self, session: &Session) -> std::result::Result<(), VideoError> {
        let path = lock(&self.path).clone().ok_or(VideoError::NothingLoaded)?;
        self.shared.set_paused(false);
        if session.control.stop_requested() || !self.shared.raw_state().has_session() {
            session.control.request_restart(path);
        }
        Ok(())
    }

    /// Suspends frame delivery. The session keeps its source open.
    pub fn pause(&self) {
        self.shared.set_paused(true);
    }

    /// Ends the session and waits for the decode thread to release its
    /// source. The thread notices the request within one pacing slice.
    ///
    /// From a notification callback the request is only recorded; the
    /// session ends once the callback returns.
    pub fn stop(&self) {
        self.shared.set_paused(true);
        let mut slot = lock(&self.session);
        if let Some(current) = slot.as_ref().filter(|s| s.is_current_thread()) {
            current.request_stop();
            return;
        }
        let session = slot.take();
        drop(slot);
        if let Some(session) = session {
            session.request_stop();
            session.join();
        }
    }

    /// Requests a seek to `target_secs`; returns immediately.
    ///
    /// Negative and non-finite targets clamp to 0. Only the latest request
    /// is kept. A request made while nothing is running is applied when the
    /// next session starts.
    pub fn seek(&self, target_secs: f64) {
        let target = if target_secs.is_finite() {
            target_secs.max(0.0)
        } else {
            0.0
        };
        self.shared.request_seek(target);
    }

    // ======================================================================
    // Reads
    // ======================================================================

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    /// Whether frames are not being delivered: true before the first
    /// `play()`, after `pause()` and `stop()`, and once a session ended.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.shared.is_paused() || !self.shared.raw_state().has_session()
    }

    /// Description of the current stream; zeroed before a session opened.
    #[must_use]
    pub fn video_info(&self) -> VideoInfo {
        self.shared.info()
    }

    /// Container tags of the current stream.
    #[must_use]
    pub fn metadata(&self) -> Metadata {
        self.shared.metadata()
    }

    /// Index of the latest delivered frame (0 before the first one and
    /// after a session ends).
    #[must_use]
    pub fn current_frame_number(&self) -> u64 {
        self.shared.frame_index()
    }

    /// Presentation timestamp of the latest delivered frame, in seconds.
    #[must_use]
    pub fn current_timestamp(&self) -> f64 {
        self.shared.timestamp()
    }

    /// The latest delivered frame, kept after the session ends.
    #[must_use]
    pub fn current_frame(&self) -> Option<FrameSnapshot> {
        self.shared.latest()
    }

    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        lock(&self.path).clone()
    }

    /// Seek target not yet picked up by the decode loop.
    #[must_use]
    pub fn pending_seek(&self) -> Option<f64> {
        self.shared.pending_seek()
    }

    /// Sleeps performed by the pacing governor in the current (or last)
    /// session.
    #[must_use]
    pub fn pacing_stats(&self) -> PacingStats {
        self.shared.pacing.snapshot()
    }

    // ======================================================================
    // Pacing
    // ======================================================================

    /// When disabled, frames are delivered as fast as they decode.
    pub fn set_consistent_frame_rate(&self, enabled: bool) {
        self.shared.set_consistent_frame_rate(enabled);
    }

    #[must_use]
    pub fn consistent_frame_rate(&self) -> bool {
        self.shared.consistent_frame_rate()
    }

    // ======================================================================
    // Notifications
    // ======================================================================

    /// Registers a callback run on the decode thread for every
    /// notification.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Notification) + Send + 'static,
    {
        self.shared.notifications.subscribe(callback)
    }

    /// Returns a queue receiving every notification from now on.
    pub fn notifications(&self) -> (SubscriptionId, UnboundedReceiver<Notification>) {
        self.shared.notifications.channel()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.notifications.unsubscribe(id)
    }

    // ======================================================================
    // Rendering
    // ======================================================================

    /// Follow the host widget size (`true`) or the explicit size.
    pub fn set_scaled(&self, scaled: bool) {
        lock(&self.render).scaled = scaled;
    }

    pub fn set_keep_aspect(&self, keep_aspect: bool) {
        lock(&self.render).keep_aspect = keep_aspect;
    }

    /// Size used while not scaled.
    pub fn set_target_size(&self, size: Option<(u32, u32)>) {
        lock(&self.render).explicit_size = size;
    }

    /// Renders at a fixed `size`, turning scaling off.
    pub fn set_size(&self, size: (u32, u32), keep_aspect: bool) {
        let mut render = lock(&self.render);
        render.explicit_size = Some(size);
        render.keep_aspect = keep_aspect;
        render.scaled = false;
    }

    pub fn set_resampling(&self, filter: ResampleFilter) {
        lock(&self.render).filter = filter;
    }

    #[must_use]
    pub fn render_settings(&self) -> RenderSettings {
        *lock(&self.render)
    }

    /// Reports a new host widget size.
    ///
    /// While paused and scaled there are no new frames to pick up the
    /// size, so the current frame is re-rendered and returned.
    pub fn resize(&self, width: u32, height: u32) -> Option<PixelBuffer> {
        let settings = {
            let mut render = lock(&self.render);
            render.widget_size = Some((width, height));
            *render
        };
        if !settings.scaled || self.state() != PlaybackState::Paused {
            return None;
        }
        self.current_frame()
            .map(|snapshot| settings.render(&snapshot.image))
    }

    /// The current frame rendered with the current settings.
    #[must_use]
    pub fn rendered_frame(&self) -> Option<PixelBuffer> {
        let settings = self.render_settings();
        self.current_frame()
            .map(|snapshot| settings.render(&snapshot.image))
    }

    // ======================================================================
    // Export
    // ======================================================================

    /// Saves the current frame (at native size) to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::NotOpened`] when no frame has been delivered,
    /// and encoding or I/O errors from the export.
    pub fn export_current_frame(&self, path: impl AsRef<Path>) -> Result<ExportFormat> {
        let path = path.as_ref();
        let snapshot = self
            .current_frame()
            .ok_or(Error::Video(VideoError::NotOpened))?;
        let format = ExportFormat::from_path(path).unwrap_or_default();
        save_frame(&snapshot.image, path, Some(format))?;
        Ok(format)
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        let session = lock(&self.session).take();
        if let Some(session) = session {
            session.request_stop();
            session.join_with_grace();
        }
    }
}

// ==========================================================================
// Decode thread
// ==========================================================================

struct SessionContext {
    factory: SourceFactory,
    audio_output: Option<AudioSinkFactory>,
    shared: Arc<Shared>,
    control: Arc<SessionControl>,
}

impl SessionContext {
    fn stop_requested(&self) -> bool {
        self.control.stop_requested()
    }

    fn emit(&self, notification: &Notification) {
        self.shared.notifications.emit(notification);
    }

    /// Runs the first session, then any restart requested from a
    /// callback, one after the other.
    fn run(self, path: PathBuf, opened: &mpsc::Sender<std::result::Result<(), VideoError>>) {
        let mut path = path;
        let mut opened = Some(opened);
        loop {
            self.run_session(&path, opened.take());
            match self.control.take_restart() {
                Some(next) => {
                    log::debug!("restarting session: {}", next.display());
                    self.shared.set_state(PlaybackState::Loading);
                    path = next;
                }
                None => return,
            }
        }
    }

    /// One session: open, loop, close. Open errors go back through
    /// `opened` when `play()` is waiting for them.
    fn run_session(
        &self,
        path: &Path,
        opened: Option<&mpsc::Sender<std::result::Result<(), VideoError>>>,
    ) {
        let mut source = (self.factory)();

        let info = match open_source(&mut source, path) {
            Ok(info) => info,
            Err(err) => {
                source.close();
                match opened {
                    Some(opened) => {
                        let _ = opened.send(Err(err));
                    }
                    None => {
                        log::warn!("restart of {} failed: {err}", path.display());
                        self.shared.set_state(PlaybackState::Stopped);
                    }
                }
                return;
            }
        };

        self.shared.begin_session(&info, source.metadata());
        let mut audio = if info.has_audio {
            self.open_audio(&mut source)
        } else {
            None
        };
        if let Some(opened) = opened {
            let _ = opened.send(Ok(()));
        }

        log::debug!(
            "session started: {} ({}x{} @ {} fps)",
            path.display(),
            info.frame_width,
            info.frame_height,
            info.frame_rate_hz
        );
        if let Some(duration) = info.duration_secs {
            self.emit(&Notification::DurationKnown(duration));
        }
        self.emit(&Notification::Loaded(info.clone()));

        let reason = self.decode_loop(&mut source, &mut audio, &info);

        source.close();
        drop(audio);
        self.shared.end_session(if reason == EndReason::Stopped {
            PlaybackState::Stopped
        } else {
            PlaybackState::Ended
        });
        log::debug!("session ended: {reason:?}");
        self.emit(&Notification::Ended(reason));
    }

    fn open_audio(&self, source: &mut Box<dyn FrameSource>) -> Option<Box<dyn AudioSink>> {
        let factory = self.audio_output.as_ref()?;
        let sink = match factory() {
            Ok(sink) => sink,
            Err(err) => {
                log::warn!("audio output unavailable, playing without sound: {err}");
                return None;
            }
        };
        source.enable_audio(sink.format()).then_some(sink)
    }

    fn decode_loop(
        &self,
        source: &mut Box<dyn FrameSource>,
        audio: &mut Option<Box<dyn AudioSink>>,
        info: &VideoInfo,
    ) -> EndReason {
        let shared = &*self.shared;
        let frame_rate_hz = info.frame_rate_hz;
        let mut pacer = PacingGovernor::for_stream(info, Arc::clone(&shared.pacing));
        let mut audio_paused = false;

        loop {
            if self.stop_requested() {
                return EndReason::Stopped;
            }

            if let Some(target) = shared.take_pending_seek() {
                shared.set_state(PlaybackState::Seeking);
                log::debug!("seeking to {target:.3}s");
                if let Err(err) = source.seek_to(target) {
                    log::warn!("seek to {target:.3}s failed: {err}");
                }
                shared.set_frame_index(frame_index_at(target, frame_rate_hz));
                if let Some(sink) = audio.as_deref_mut() {
                    sink.clear();
                }
                pacer.reset();
                shared.set_state(PlaybackState::Playing);
                continue;
            }

            if shared.is_paused() {
                if !audio_paused {
                    if let Some(sink) = audio.as_deref_mut() {
                        sink.set_paused(true);
                    }
                    audio_paused = true;
                }
                thread::sleep(PAUSE_POLL_QUANTUM);
                continue;
            }
            if audio_paused {
                if let Some(sink) = audio.as_deref_mut() {
                    sink.set_paused(false);
                }
                audio_paused = false;
                pacer.reset();
            }

            let frame = match source.decode_next() {
                Ok(DecodeOutcome::Frame(frame)) => frame,
                Ok(DecodeOutcome::EndOfStream) => return EndReason::EndOfStream,
                Err(err) => {
                    log::warn!("decoding failed, ending session: {err}");
                    return EndReason::DecodeError(err.to_string());
                }
            };

            let frame_index = shared.frame_index() + 1;
            let snapshot = FrameSnapshot {
                image: frame.image,
                pts_secs: frame.pts_secs,
                frame_index,
            };
            shared.commit(&snapshot);

            while let Some(chunk) = source.take_audio() {
                if let Some(sink) = audio.as_deref_mut() {
                    sink.queue(chunk);
                }
            }

            self.emit(&Notification::FrameReady(snapshot));
            if frame_index % u64::from(frame_rate_hz) == 0 {
                self.emit(&Notification::SecondElapsed {
                    second: frame_index / u64::from(frame_rate_hz),
                    frame_index,
                });
            }

            pacer.pace(shared.consistent_frame_rate(), || {
                self.stop_requested() || shared.is_paused() || shared.has_pending_seek()
            });
        }
    }
}

/// Opens `source` and checks the stream can be paced.
fn open_source(
    source: &mut Box<dyn FrameSource>,
    path: &Path,
) -> std::result::Result<VideoInfo, VideoError> {
    let info = source.open(path)?;
    if info.frame_rate_hz == 0 {
        return Err(VideoError::UnsupportedMedia(
            "frame rate could not be determined".to_string(),
        ));
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::synthetic::{SyntheticFrameSource, SyntheticScript};
    use crate::test_utils::wait_until;
    use std::sync::atomic::AtomicU64;
    use std::sync::Weak;
    use std::time::Duration;

    fn engine(script: SyntheticScript) -> PlaybackEngine {
        let engine = PlaybackEngine::new(move || Box::new(SyntheticFrameSource::new(script.clone())));
        engine.load("clip.mp4");
        engine
    }

    #[test]
    fn zero_frame_rate_is_rejected_at_open() {
        let mut source: Box<dyn FrameSource> =
            Box::new(SyntheticFrameSource::new(SyntheticScript::new(0, 1)));
        let err = open_source(&mut source, Path::new("x")).unwrap_err();
        assert!(err.is_unsupported_media());
    }

    #[test]
    fn stop_from_a_callback_does_not_deadlock() {
        let script = SyntheticScript::new(100, 1000);
        let probe = script.probe();
        let engine = Arc::new(engine(script));
        let weak: Weak<PlaybackEngine> = Arc::downgrade(&engine);
        engine.subscribe(move |notification| {
            if let Notification::FrameReady(snapshot) = notification {
                if snapshot.frame_index == 3 {
                    if let Some(engine) = weak.upgrade() {
                        engine.stop();
                    }
                }
            }
        });

        engine.play().unwrap();

        assert!(wait_until(Duration::from_secs(5), || {
            engine.state() == PlaybackState::Stopped
        }));
        assert!(wait_until(Duration::from_secs(5), || probe.open_now() == 0));
    }

    #[test]
    fn stop_then_play_from_a_callback_restarts_on_the_same_thread() {
        let script = SyntheticScript::new(100, 1000);
        let probe = script.probe();
        let engine = Arc::new(engine(script));
        let weak: Weak<PlaybackEngine> = Arc::downgrade(&engine);
        let restarted = Arc::new(AtomicBool::new(false));
        let once = Arc::clone(&restarted);
        engine.subscribe(move |notification| {
            if let Notification::FrameReady(snapshot) = notification {
                if snapshot.frame_index == 3 && !once.swap(true, Ordering::SeqCst) {
                    if let Some(engine) = weak.upgrade() {
                        engine.stop();
                        assert!(engine.play().is_ok());
                    }
                }
            }
        });

        engine.play().unwrap();

        assert!(wait_until(Duration::from_secs(5), || probe.opens() == 2));
        assert!(wait_until(Duration::from_secs(5), || {
            engine.current_frame_number() >= 10
        }));
        assert_eq!(probe.max_concurrently_open(), 1);
        assert_eq!(probe.open_now(), 1);
        assert_eq!(engine.state(), PlaybackState::Playing);

        engine.stop();
        assert_eq!(probe.open_now(), 0);
        assert_eq!(engine.state(), PlaybackState::Stopped);
    }

    #[test]
    fn play_from_the_ended_callback_loops_playback() {
        let script = SyntheticScript::new(100, 5);
        let probe = script.probe();
        let engine = Arc::new(engine(script));
        let weak: Weak<PlaybackEngine> = Arc::downgrade(&engine);
        let loops = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&loops);
        engine.subscribe(move |notification| {
            if let Notification::Ended(EndReason::EndOfStream) = notification {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    if let Some(engine) = weak.upgrade() {
                        assert!(engine.play().is_ok());
                    }
                }
            }
        });

        engine.play().unwrap();

        assert!(wait_until(Duration::from_secs(5), || {
            loops.load(Ordering::SeqCst) == 3 && engine.state() == PlaybackState::Ended
        }));
        assert_eq!(probe.opens(), 3);
        assert_eq!(probe.max_concurrently_open(), 1);
        assert_eq!(probe.open_now(), 0);
    }

    #[test]
    fn dropping_the_engine_on_its_decode_thread_detaches_at_once() {
        let script = SyntheticScript::new(100, 1000);
        let probe = script.probe();
        let engine = Arc::new(engine(script));
        let holder = Arc::new(Mutex::new(Some(Arc::clone(&engine))));
        let drop_time = Arc::new(Mutex::new(None));
        let (slot, timing) = (Arc::clone(&holder), Arc::clone(&drop_time));
        engine.subscribe(move |notification| {
            if !matches!(notification, Notification::FrameReady(_)) {
                return;
            }
            let mut slot = lock(&slot);
            if slot.as_ref().is_some_and(|last| Arc::strong_count(last) == 1) {
                let last = slot.take();
                let started = Instant::now();
                drop(last);
                *lock(&timing) = Some(started.elapsed());
            }
        });

        engine.play().unwrap();
        drop(engine);

        assert!(wait_until(Duration::from_secs(5), || lock(&drop_time).is_some()));
        let elapsed = (*lock(&drop_time)).unwrap_or_default();
        assert!(elapsed < SHUTDOWN_GRACE / 2, "drop took {elapsed:?}");
        assert!(wait_until(Duration::from_secs(5), || probe.open_now() == 0));
    }

    #[test]
    fn debug_output_names_state() {
        let engine = engine(SyntheticScript::new(10, 10));
        let text = format!("{engine:?}");
        assert!(text.contains("Idle"));
        assert!(text.contains("clip.mp4"));
    }
}
