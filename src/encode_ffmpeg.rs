use std::{
    io::{Read as _, Write as _},
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
    thread::JoinHandle,
};

use anyhow::Context as _;

use crate::{
    core::{Fps, PixelBuffer},
    error::{InkError, InkResult},
    model::VideoCodec,
    sink::FrameSink,
};

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub codec: VideoCodec,
    pub out_path: PathBuf,
    pub overwrite: bool,
}

impl EncodeConfig {
    pub fn new(out_path: impl Into<PathBuf>, width: u32, height: u32, fps: Fps) -> Self {
        Self {
            width,
            height,
            fps,
            codec: VideoCodec::default(),
            out_path: out_path.into(),
            overwrite: true,
        }
    }

    pub fn with_codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn validate(&self) -> InkResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(InkError::validation("encode width/height must be non-zero"));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(InkError::validation("encode fps must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(InkError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        Ok(())
    }

    fn ffmpeg_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![if self.overwrite { "-y" } else { "-n" }.into()];
        args.extend(
            [
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s",
                &format!("{}x{}", self.width, self.height),
                "-r",
                &format!("{}/{}", self.fps.num, self.fps.den),
                "-i",
                "pipe:0",
                "-an",
                "-c:v",
                self.codec.encoder(),
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ]
            .map(String::from),
        );
        args.push(self.out_path.display().to_string());
        args
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> InkResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Streams raw `rgb24` frames into a system `ffmpeg` process.
pub struct FfmpegSink {
    cfg: EncodeConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    frames: u64,
}

impl std::fmt::Debug for FfmpegSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegSink")
            .field("out_path", &self.cfg.out_path)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl FfmpegSink {
    pub fn spawn(cfg: EncodeConfig) -> InkResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path).map_err(|e| InkError::sink(e.to_string()))?;

        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(InkError::sink(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(InkError::sink(
                "ffmpeg is required for video output, but was not found on PATH",
            ));
        }

        let mut child = Command::new("ffmpeg")
            .args(cfg.ffmpeg_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| InkError::sink(format!("failed to spawn ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| InkError::sink("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| InkError::sink("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        tracing::debug!(out = %cfg.out_path.display(), codec = ?cfg.codec, "ffmpeg started");
        Ok(Self {
            cfg,
            child: Some(child),
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
            frames: 0,
        })
    }

    pub fn out_path(&self) -> &Path {
        &self.cfg.out_path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }
}

impl FrameSink for FfmpegSink {
    fn write(&mut self, frame: &PixelBuffer) -> InkResult<()> {
        if frame.dimensions() != (self.cfg.width, self.cfg.height) {
            return Err(InkError::sink(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                self.cfg.width,
                self.cfg.height
            )));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(InkError::sink("ffmpeg sink is already closed"));
        };
        stdin
            .write_all(frame.data())
            .map_err(|e| InkError::sink(format!("failed to write frame to ffmpeg stdin: {e}")))?;
        self.frames += 1;
        Ok(())
    }

    fn close(&mut self) -> InkResult<()> {
        let Some(child) = self.child.take() else {
            return Err(InkError::sink("ffmpeg sink closed twice"));
        };
        drop(self.stdin.take());

        let status = child
            .wait_with_output()
            .map_err(|e| InkError::sink(format!("failed to wait for ffmpeg to finish: {e}")))?
            .status;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| InkError::sink("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| InkError::sink(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(InkError::sink(format!(
                "ffmpeg exited with status {status}: {}",
                stderr.trim()
            )));
        }
        tracing::debug!(frames = self.frames, out = %self.cfg.out_path.display(), "ffmpeg finished");
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(width: u32, height: u32) -> EncodeConfig {
        EncodeConfig::new("out/slide.mp4", width, height, Fps { num: 30, den: 1 })
    }

    #[test]
    fn config_validation_catches_bad_values() {
        assert!(cfg(0, 10).validate().is_err());
        assert!(cfg(11, 10).validate().is_err());
        let mut bad_fps = cfg(10, 10);
        bad_fps.fps = Fps { num: 30, den: 0 };
        assert!(bad_fps.validate().is_err());
        assert!(cfg(10, 10).validate().is_ok());
    }

    #[test]
    fn args_carry_codec_and_rational_rate() {
        let mut c = cfg(64, 48).with_codec(VideoCodec::Mpeg4);
        c.fps = Fps { num: 30000, den: 1001 };
        let args = c.ffmpeg_args();
        assert_eq!(args[0], "-y");
        assert!(args.windows(2).any(|w| w == ["-c:v", "mpeg4"]));
        assert!(args.windows(2).any(|w| w == ["-pix_fmt", "rgb24"]));
        assert!(args.windows(2).any(|w| w == ["-r", "30000/1001"]));
        assert!(args.windows(2).any(|w| w == ["-s", "64x48"]));
        assert_eq!(args.last().map(String::as_str), Some("out/slide.mp4"));
    }
}
