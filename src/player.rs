use std::time::{Duration, Instant};

use log::{debug, info, warn};
use poll_promise::Promise;

use crate::config::{PlayerConfig, Source};
use crate::decompress::decompress_frames;
use crate::frame::{DisposalType, FrameStore};
use crate::gif::{parse_gif, validate_and_fix};
use crate::surface::{Canvas, ImageData, Rect, Surface};
use crate::timing::RequestTimeout;
use crate::Error;

/// Passed to the frame-changed listener after each composite.
#[derive(Debug)]
pub struct FrameChange<'a> {
    pub current_index: usize,
    pub data: &'a ImageData,
    pub total_frames: usize,
}

type FrameChangeListener = Box<dyn FnMut(FrameChange<'_>)>;
type LoopCompleteListener = Box<dyn FnMut(u32, usize)>;
type LoadCallback = Box<dyn FnOnce()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Nothing loaded.
    Idle,
    /// Frames loaded, not started.
    Ready,
    Running,
    /// Running, but ticks do not advance.
    Paused,
    /// A `run_once` session that completed its loop.
    Finished,
    /// Surfaces and frames released.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Ready,
    Running,
    Finished,
    Stopped,
}

struct PendingLoad {
    source: Source,
    promise: Promise<Result<Vec<u8>, Error>>,
    callback: LoadCallback,
}

/// Plays one GIF at a time onto a persistent composite surface.
///
/// Nothing here runs on its own: the host calls [`GifPlayer::tick`] once per
/// display refresh, and every state change happens inside that call or one of
/// the control methods.
pub struct GifPlayer<S: Surface = Canvas> {
    config: PlayerConfig,
    frames: FrameStore,
    cursor: usize,
    iteration_count: u32,
    phase: Phase,
    playing: bool,

    composite: Option<S>,
    scratch: Option<S>,
    last_patch_size: Option<(u16, u16)>,
    image: Option<ImageData>,

    pending_step: Option<RequestTimeout>,
    pending_load: Option<PendingLoad>,

    on_frame_change: Option<FrameChangeListener>,
    on_loop_complete: Option<LoopCompleteListener>,
}

impl<S: Surface> GifPlayer<S> {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            frames: FrameStore::default(),
            cursor: 0,
            iteration_count: 0,
            phase: Phase::Idle,
            playing: true,
            composite: None,
            scratch: None,
            last_patch_size: None,
            image: None,
            pending_step: None,
            pending_load: None,
            on_frame_change: None,
            on_loop_complete: None,
        }
    }

    pub fn on_frame_change(&mut self, listener: impl FnMut(FrameChange<'_>) + 'static) {
        self.on_frame_change = Some(Box::new(listener));
    }

    /// Called with `(iteration_count, total_frames)` after each full pass.
    pub fn on_loop_complete(&mut self, listener: impl FnMut(u32, usize) + 'static) {
        self.on_loop_complete = Some(Box::new(listener));
    }

    /// Fetch the configured source in the background. The result is applied
    /// by a later [`GifPlayer::tick`], which then calls `callback` whether or
    /// not the fetch succeeded. A load that is superseded by another `load`
    /// or dropped by [`GifPlayer::stop_parsing_gif`] calls its callback at
    /// that point, without installing anything.
    pub fn load(&mut self, callback: impl FnOnce() + 'static) {
        let Some(source) = self.config.source.clone() else {
            warn!("load called without a gif source");
            callback();
            return;
        };

        if let Some(previous) = self.pending_load.take() {
            debug!("superseding in-flight load of {}", previous.source);
            (previous.callback)();
        }
        info!("loading gif from {source}");
        self.pending_load = Some(PendingLoad {
            promise: fetch_source(&source),
            source,
            callback: Box::new(callback),
        });
    }

    /// Decode `bytes` and install the frames as a new session, replacing any
    /// current one. Starts playback when `render_gif` is set.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        self.load_bytes_at(bytes, Instant::now())
    }

    /// [`GifPlayer::load_bytes`], with an autostart timed from `now`.
    pub fn load_bytes_at(&mut self, bytes: &[u8], now: Instant) -> Result<usize, Error> {
        let mut gif = parse_gif(bytes)?;
        validate_and_fix(&mut gif);
        let frames = decompress_frames(&gif, true)?;
        debug!(
            "decoded {} frames, screen {}x{}",
            frames.len(),
            gif.width(),
            gif.height()
        );

        self.release();
        self.frames = FrameStore::new(frames, gif.width(), gif.height());
        self.cursor = 0;
        self.iteration_count = 0;
        self.phase = if self.frames.is_empty() {
            Phase::Idle
        } else {
            Phase::Ready
        };

        if self.config.render_gif {
            self.start_at(now);
        }
        Ok(self.frames.len())
    }

    pub fn start(&mut self) {
        self.start_at(Instant::now())
    }

    /// Allocate surfaces and show the current frame right away. Later frames
    /// follow from [`GifPlayer::tick`].
    pub fn start_at(&mut self, now: Instant) {
        if self.frames.is_empty() {
            debug!("start ignored, no frames loaded");
            return;
        }

        let (width, height) = self.canvas_size();
        self.composite = Some(S::allocate(width, height));
        self.scratch = Some(S::allocate(width, height));
        self.last_patch_size = None;
        self.cancel_pending_step();
        self.phase = Phase::Running;
        self.advance(now);
    }

    /// Show the current frame and move the cursor on. Does nothing unless
    /// the session is running.
    pub fn step(&mut self, now: Instant) {
        if self.phase != Phase::Running {
            return;
        }
        self.advance(now);
    }

    fn advance(&mut self, now: Instant) {
        if self.frames.is_empty() {
            return;
        }

        let shown = self.cursor;
        self.composite_current_frame();
        self.cursor += 1;

        if self.cursor >= self.frames.len() {
            self.cursor = 0;
            self.complete_loop();
        }

        if self.phase == Phase::Running && self.playing {
            let delay = self.delay_after(shown);
            self.pending_step = Some(RequestTimeout::new(now, delay));
        }
    }

    fn complete_loop(&mut self) {
        self.iteration_count += 1;
        debug!("completed loop {}", self.iteration_count);
        if let Some(listener) = self.on_loop_complete.as_mut() {
            listener(self.iteration_count, self.frames.len());
        }
        if self.config.run_once {
            self.phase = Phase::Finished;
        }
    }

    fn delay_after(&self, index: usize) -> Duration {
        match self.frames.get(index) {
            Some(frame) if self.config.use_frame_delays && !frame.delay.is_zero() => frame.delay,
            _ => self.config.delay,
        }
    }

    /// Draw the frame under the cursor onto the composite surface and return
    /// the whole surface. Restore-to-previous frames are skipped.
    pub fn composite_current_frame(&mut self) -> Option<&ImageData> {
        let total = self.frames.len();
        if total == 0 {
            return None;
        }
        if self.cursor >= total {
            self.cursor = 0;
        }

        let frames = self.frames.clone();
        let frame = frames.get(self.cursor)?;
        if frame.disposal == DisposalType::RestoreToPrevious {
            debug!("skipping frame {}, restore to previous is unsupported", self.cursor);
            return None;
        }

        let previous = match self.cursor {
            0 if self.iteration_count > 0 => frames.get(total - 1),
            0 => None,
            i => frames.get(i - 1),
        };

        let (Some(composite), Some(scratch)) = (self.composite.as_mut(), self.scratch.as_mut())
        else {
            return None;
        };

        if let Some(previous) = previous {
            if previous.disposal == DisposalType::RestoreBackground {
                composite.clear_rect(previous.dims.rect());
            }
        }

        let size = (frame.dims.width, frame.dims.height);
        if self.last_patch_size != Some(size) {
            scratch.resize(size.0 as u32, size.1 as u32);
            self.last_patch_size = Some(size);
        }
        scratch.put_pixels(&frame.patch);
        composite.draw_surface(scratch, frame.dims.left as u32, frame.dims.top as u32);

        let (width, height) = composite.size();
        let image: &ImageData = self
            .image
            .insert(composite.read_pixels(Rect::new(0, 0, width, height)));

        if let Some(listener) = self.on_frame_change.as_mut() {
            listener(FrameChange {
                current_index: self.cursor,
                data: image,
                total_frames: total,
            });
        }
        Some(image)
    }

    /// Drive the player from the host's refresh loop: apply a finished load,
    /// then take the next step if its delay has passed.
    pub fn tick(&mut self, now: Instant) {
        self.poll_load(now);

        let Some(timeout) = self.pending_step.as_mut() else {
            return;
        };
        if !timeout.poll(now) {
            return;
        }
        self.pending_step = None;

        if self.phase != Phase::Running {
            return;
        }
        if !self.playing {
            debug!("tick while paused, holding frame {}", self.cursor);
            return;
        }
        self.advance(now);
    }

    fn poll_load(&mut self, now: Instant) {
        let Some(pending) = self.pending_load.take() else {
            return;
        };
        let PendingLoad {
            source,
            promise,
            callback,
        } = pending;

        match promise.try_take() {
            Ok(Ok(bytes)) => match self.load_bytes_at(&bytes, now) {
                Ok(count) => info!("loaded {count} frames from {source}"),
                Err(err) => warn!("Error decoding gif from {source}: {err}"),
            },
            Ok(Err(err)) => warn!("Error on gif call to {source}: {err}"),
            Err(promise) => {
                self.pending_load = Some(PendingLoad {
                    source,
                    promise,
                    callback,
                });
                return;
            }
        }
        callback();
    }

    pub fn play(&mut self) {
        self.play_at(Instant::now())
    }

    /// Resume from the held frame. The next step comes one delay after `now`.
    pub fn play_at(&mut self, now: Instant) {
        self.playing = true;
        if self.phase == Phase::Running && self.pending_step.is_none() {
            let delay = self.delay_after(self.cursor);
            self.pending_step = Some(RequestTimeout::new(now, delay));
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Stop playback and release frames and surfaces. Any pending step is
    /// dropped; a pending load is abandoned and its callback called.
    pub fn stop_parsing_gif(&mut self) {
        self.release();
        if let Some(pending) = self.pending_load.take() {
            debug!("abandoning load of {}", pending.source);
            (pending.callback)();
        }
        self.frames = FrameStore::default();
        self.phase = Phase::Stopped;
    }

    fn release(&mut self) {
        self.cancel_pending_step();
        self.composite = None;
        self.scratch = None;
        self.last_patch_size = None;
        self.image = None;
    }

    fn cancel_pending_step(&mut self) {
        if let Some(mut timeout) = self.pending_step.take() {
            timeout.cancel();
        }
    }

    fn canvas_size(&self) -> (u32, u32) {
        self.config.canvas_size.unwrap_or_else(|| {
            let (width, height) = self.frames.screen_size();
            (width as u32, height as u32)
        })
    }

    /// Number of loaded frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.cursor
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn is_loading(&self) -> bool {
        self.pending_load.is_some()
    }

    /// The most recent composite, if a frame has been shown this session.
    pub fn image(&self) -> Option<&ImageData> {
        self.image.as_ref()
    }

    pub fn state(&self) -> PlayerState {
        match self.phase {
            Phase::Idle => PlayerState::Idle,
            Phase::Ready => PlayerState::Ready,
            Phase::Running if !self.playing => PlayerState::Paused,
            Phase::Running => PlayerState::Running,
            Phase::Finished => PlayerState::Finished,
            Phase::Stopped => PlayerState::Stopped,
        }
    }
}

fn fetch_source(source: &Source) -> Promise<Result<Vec<u8>, Error>> {
    let (sender, promise) = Promise::new();
    match source {
        Source::Url(url) => {
            let request = ehttp::Request::get(url);
            ehttp::fetch(request, move |response| sender.send(response_bytes(response)));
        }
        Source::Path(path) => sender.send(std::fs::read(path).map_err(Error::from)),
    }
    promise
}

/// The body of a successful response; transport errors and non-2xx statuses
/// become errors.
fn response_bytes(response: ehttp::Result<ehttp::Response>) -> Result<Vec<u8>, Error> {
    let resp = response.map_err(Error::Fetch)?;
    if !resp.ok {
        return Err(Error::Http {
            status: resp.status,
            status_text: resp.status_text,
        });
    }
    Ok(resp.bytes)
}
