use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use image::RgbImage;

use super::{AnnotationBuffer, FrameSink, Overlay};
use crate::emulator::Emulator;
use crate::error::BotResult;

pub const RECORDING_FPS: u32 = 20;

/// Where recorded frames come from.
pub trait FrameSource: Send {
    fn grab(&mut self) -> BotResult<RgbImage>;
}

impl FrameSource for Arc<Mutex<Emulator>> {
    fn grab(&mut self) -> BotResult<RgbImage> {
        let mut emulator = self.lock().unwrap_or_else(|e| e.into_inner());
        emulator.capture()
    }
}

/// Background thread writing annotated frames to a sink.
pub struct Recorder {
    paused: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<u64>>>,
}

impl Recorder {
    pub fn start(
        mut source: Box<dyn FrameSource>,
        mut sink: Box<dyn FrameSink>,
        annotations: Arc<AnnotationBuffer>,
        overlay: Overlay,
    ) -> Self {
        let paused = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));
        let thread_paused = paused.clone();
        let thread_stop = stop.clone();

        let handle = thread::spawn(move || {
            let interval = Duration::from_millis(1000 / RECORDING_FPS as u64);
            let mut frames = 0u64;
            log::info!("Recording started");

            while !thread_stop.load(Ordering::SeqCst) {
                let tick = Instant::now();
                if !thread_paused.load(Ordering::SeqCst) {
                    match source.grab() {
                        Ok(mut frame) => {
                            overlay.draw(&mut frame, &annotations.live());
                            if let Err(e) = sink.write(&frame) {
                                log::error!("Failed to write video frame: {}", e);
                                break;
                            }
                            frames += 1;
                        }
                        Err(e) if e.is_fatal() => {
                            log::warn!("Recording stopped: {}", e);
                            break;
                        }
                        Err(e) => log::debug!("Dropped video frame: {}", e),
                    }
                }
                if let Some(rest) = interval.checked_sub(tick.elapsed()) {
                    thread::sleep(rest);
                }
            }

            sink.finish()?;
            log::info!("Recording finished, {} frame(s)", frames);
            Ok(frames)
        });

        Self {
            paused,
            stop,
            handle: Some(handle),
        }
    }

    /// Frames are dropped until [`Recorder::resume`]; the output stays open.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Finishes the file and returns the number of frames written.
    pub fn stop(mut self) -> Result<u64> {
        self.stop.store(true, Ordering::SeqCst);
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("Recorder thread panicked"))?,
            None => Ok(0),
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use crate::perception::ElementOnScreen;

    struct SolidFrames;

    impl FrameSource for SolidFrames {
        fn grab(&mut self) -> BotResult<RgbImage> {
            Ok(RgbImage::new(40, 30))
        }
    }

    struct DeadWindow;

    impl FrameSource for DeadWindow {
        fn grab(&mut self) -> BotResult<RgbImage> {
            Err(BotError::WindowGone { handle: 1 })
        }
    }

    #[derive(Clone, Default)]
    struct CountingSink {
        frames: Arc<Mutex<Vec<RgbImage>>>,
        finished: Arc<AtomicBool>,
    }

    impl FrameSink for CountingSink {
        fn write(&mut self, frame: &RgbImage) -> Result<()> {
            self.frames.lock().unwrap().push(frame.clone());
            Ok(())
        }

        fn finish(self: Box<Self>) -> Result<()> {
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn count(sink: &CountingSink) -> usize {
        sink.frames.lock().unwrap().len()
    }

    #[test]
    fn test_pause_drops_frames_without_closing() {
        let sink = CountingSink::default();
        let annotations = Arc::new(AnnotationBuffer::new());
        annotations.push(ElementOnScreen::point(None, (1, 1)));
        let recorder = Recorder::start(
            Box::new(SolidFrames),
            Box::new(sink.clone()),
            annotations,
            Overlay::without_text(),
        );

        thread::sleep(Duration::from_millis(200));
        recorder.pause();
        assert!(recorder.is_paused());
        thread::sleep(Duration::from_millis(100));
        let at_pause = count(&sink);
        assert!(at_pause > 0);
        thread::sleep(Duration::from_millis(200));
        assert_eq!(count(&sink), at_pause);
        assert!(!sink.finished.load(Ordering::SeqCst));

        recorder.resume();
        thread::sleep(Duration::from_millis(200));
        let written = recorder.stop().unwrap();
        assert!(written as usize > at_pause);
        assert!(sink.finished.load(Ordering::SeqCst));
        assert_eq!(sink.frames.lock().unwrap()[0].get_pixel(1, 1).0, [255, 0, 0]);
    }

    #[test]
    fn test_gone_window_ends_recording() {
        let sink = CountingSink::default();
        let recorder = Recorder::start(
            Box::new(DeadWindow),
            Box::new(sink.clone()),
            Arc::new(AnnotationBuffer::new()),
            Overlay::without_text(),
        );
        thread::sleep(Duration::from_millis(100));
        assert_eq!(recorder.stop().unwrap(), 0);
        assert!(sink.finished.load(Ordering::SeqCst));
    }
}
