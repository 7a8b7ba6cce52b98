use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use ndarray::{Array4, Axis};
use tracing::{info, warn};

use crate::consts::VIDEO_EXTENSIONS;
use crate::error::{MicroStackError, Result};
use crate::io::{check_extension, VideoEncoder};

/// Streams raw rgb24 frames into an `ffmpeg` child process.
#[derive(Clone, Debug)]
pub struct FfmpegEncoder {
    program: PathBuf,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }
}

impl FfmpegEncoder {
    /// Use a specific `ffmpeg` binary instead of the one on `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn arguments(&self, path: &Path, width: usize, height: usize, fps: u32, codec: &str) -> Vec<String> {
        vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-s".into(),
            format!("{width}x{height}"),
            "-i".into(),
            "pipe:".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-vcodec".into(),
            codec.into(),
            "-r".into(),
            fps.to_string(),
            path.to_string_lossy().into_owned(),
        ]
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn encode(&self, frames: &Array4<u8>, path: &Path, fps: u32, codec: &str) -> Result<()> {
        check_extension(path, VIDEO_EXTENSIONS)?;
        let (n, height, width, _) = frames.dim();

        let mut child = Command::new(&self.program)
            .args(self.arguments(path, width, height, fps, codec))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        // stderr is drained while frames are written.
        let mut stderr_pipe = child.stderr.take();
        let drain = thread::spawn(move || {
            let mut captured = Vec::new();
            if let Some(ref mut pipe) = stderr_pipe {
                let _ = pipe.read_to_end(&mut captured);
            }
            String::from_utf8_lossy(&captured).trim().to_string()
        });

        let written = match child.stdin.take() {
            Some(mut stdin) => write_frames(&mut stdin, frames),
            None => Ok(()),
        };
        if written.is_err() {
            let _ = child.kill();
        }
        let status = child.wait()?;
        let stderr = drain.join().unwrap_or_default();

        if let Err(e) = written {
            warn!(error = %e, %stderr, "ffmpeg stopped reading frames");
            let message = if stderr.is_empty() {
                e.to_string()
            } else {
                format!("{e}: {stderr}")
            };
            return Err(MicroStackError::Encoder(message));
        }
        if !status.success() {
            warn!(code = ?status.code(), %stderr, "ffmpeg exited with an error");
            return Err(MicroStackError::Encoder(stderr));
        }

        info!(path = %path.display(), frames = n, fps, codec, "Video written");
        Ok(())
    }
}

fn write_frames(stdin: &mut impl Write, frames: &Array4<u8>) -> std::io::Result<()> {
    for frame in frames.axis_iter(Axis(0)) {
        let bytes: Vec<u8> = frame.iter().copied().collect();
        stdin.write_all(&bytes)?;
    }
    Ok(())
}
