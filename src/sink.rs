use crate::{
    core::PixelBuffer,
    error::{InkError, InkResult},
    watermark::FrameHook,
};

/// Append-only consumer of finished frames.
///
/// Frames arrive in final temporal order; `close` is called once per rendered slide.
pub trait FrameSink: Send {
    fn write(&mut self, frame: &PixelBuffer) -> InkResult<()>;
    fn close(&mut self) -> InkResult<()>;
}

/// In-memory sink for tests and previews.
#[derive(Debug, Default)]
pub struct InMemorySink {
    frames: Vec<PixelBuffer>,
    closed: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[PixelBuffer] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<PixelBuffer> {
        self.frames
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl FrameSink for InMemorySink {
    fn write(&mut self, frame: &PixelBuffer) -> InkResult<()> {
        if self.closed {
            return Err(InkError::sink("in-memory sink is already closed"));
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn close(&mut self) -> InkResult<()> {
        if self.closed {
            return Err(InkError::sink("in-memory sink closed twice"));
        }
        self.closed = true;
        Ok(())
    }
}

/// Counts and forwards frames, applying the post-processing hook on the way out.
pub struct FrameWriter<'a> {
    sink: &'a mut dyn FrameSink,
    hook: Option<&'a dyn FrameHook>,
    frames_written: u64,
    keep_last: bool,
    last: Option<PixelBuffer>,
}

impl<'a> FrameWriter<'a> {
    pub fn new(sink: &'a mut dyn FrameSink, hook: Option<&'a dyn FrameHook>) -> Self {
        Self {
            sink,
            hook,
            frames_written: 0,
            keep_last: false,
            last: None,
        }
    }

    /// Retain a copy of the most recent frame for [`last_frame`](Self::last_frame).
    pub fn keep_last_frame(mut self, keep: bool) -> Self {
        self.keep_last = keep;
        self
    }

    pub fn write(&mut self, frame: &PixelBuffer) -> InkResult<()> {
        match self.hook {
            Some(hook) => {
                let mut marked = frame.clone();
                hook.apply(&mut marked);
                self.sink.write(&marked)?;
            }
            None => self.sink.write(frame)?,
        }
        self.frames_written += 1;
        if self.keep_last {
            match &mut self.last {
                Some(last) if last.same_dimensions(frame) => {
                    last.data_mut().copy_from_slice(frame.data());
                }
                _ => self.last = Some(frame.clone()),
            }
        }
        Ok(())
    }

    /// Frames written since this writer was created.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Most recent frame, before the hook was applied. `None` unless retention was enabled.
    pub fn last_frame(&self) -> Option<&PixelBuffer> {
        self.last.as_ref()
    }

    pub fn close(&mut self) -> InkResult<()> {
        self.sink.close()
    }
}
