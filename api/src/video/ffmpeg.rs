use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use super::{DecodeError, DecodedFrame, PixelOrder, VideoBackend, VideoSource};

/// Decodes videos with ffprobe (metadata) and ffmpeg (rawvideo rgb24 on a pipe)
pub struct FfmpegBackend {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegBackend {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    nb_frames: Option<String>,
    nb_read_packets: Option<String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

impl ProbeStream {
    /// Display rotation in degrees, from the display matrix or the legacy `rotate` tag
    fn rotation(&self) -> i64 {
        self.side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| self.tags.get("rotate").and_then(|r| r.trim().parse().ok()))
            .map(|r| r.round() as i64)
            .unwrap_or(0)
    }
}

/// Video stream metadata needed to slice the raw frame pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VideoProbe {
    width: u32,
    height: u32,
    frame_count: usize,
}

fn parse_probe(json: &str) -> Result<VideoProbe, DecodeError> {
    let output: ProbeOutput =
        serde_json::from_str(json).map_err(|e| DecodeError::Probe(e.to_string()))?;
    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| DecodeError::Probe("no video stream".into()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(DecodeError::Probe("missing frame dimensions".into())),
    };
    // ffmpeg autorotates, so quarter-turn clips decode with swapped dimensions
    let (width, height) = if stream.rotation().rem_euclid(180) == 90 {
        (height, width)
    } else {
        (width, height)
    };

    // Containers like mkv omit nb_frames; fall back to the packet count
    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .or_else(|| {
            stream
                .nb_read_packets
                .as_deref()
                .and_then(|s| s.parse::<usize>().ok())
        })
        .unwrap_or(0);

    Ok(VideoProbe {
        width,
        height,
        frame_count,
    })
}

fn probe(ffprobe: &str, path: &Path) -> Result<VideoProbe, DecodeError> {
    let output = Command::new(ffprobe)
        .args(["-v", "error"])
        .args(["-select_streams", "v:0"])
        .arg("-count_packets")
        .args([
            "-show_entries",
            "stream=width,height,nb_frames,nb_read_packets:stream_tags=rotate:stream_side_data=rotation",
        ])
        .args(["-of", "json"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| DecodeError::Probe(format!("ffprobe not available: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DecodeError::Probe(stderr.trim().to_string()));
    }

    parse_probe(&String::from_utf8_lossy(&output.stdout))
}

impl FfmpegBackend {
    fn spawn(&self, path: &Path) -> Result<FfmpegSource, DecodeError> {
        if !path.is_file() {
            return Err(DecodeError::NotFound(path.display().to_string()));
        }

        let probe = probe(&self.ffprobe, path)?;
        log::debug!(
            "[ffmpeg] {:?}: {}x{}, {} frames",
            path.file_name().unwrap_or_default(),
            probe.width,
            probe.height,
            probe.frame_count
        );

        let mut child = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin"])
            .arg("-i")
            .arg(path)
            .args(["-an", "-sn"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DecodeError::Decoder(format!("ffmpeg not available: {}", e)))?;

        // Drained concurrently: a full stderr pipe would stall the frame pipe
        let stderr = child.stderr.take().map(drain_stderr);
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(DecodeError::Decoder("ffmpeg stdout unavailable".into()));
        };

        Ok(FfmpegSource {
            child,
            stdout,
            stderr,
            probe,
            finished: false,
        })
    }
}

impl VideoBackend for FfmpegBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, DecodeError> {
        Ok(Box::new(self.spawn(path)?))
    }
}

/// Bytes of ffmpeg's log kept for error reports; the rest is read and discarded
const STDERR_CAPTURE_LIMIT: usize = 16 * 1024;

fn drain_stderr(mut pipe: ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut kept = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    let room = STDERR_CAPTURE_LIMIT.saturating_sub(kept.len());
                    kept.extend_from_slice(&chunk[..n.min(room)]);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        String::from_utf8_lossy(&kept).into_owned()
    })
}

/// A running ffmpeg decode. The child process is killed and reaped on drop.
pub struct FfmpegSource {
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    probe: VideoProbe,
    finished: bool,
}

impl FfmpegSource {
    fn frame_len(&self) -> usize {
        self.probe.width as usize * self.probe.height as usize * 3
    }

    /// Reap ffmpeg after stdout closes and surface a failed exit as a decode error.
    fn finish(&mut self) -> Result<(), DecodeError> {
        self.finished = true;

        let status = self.child.wait()?;
        let stderr = self
            .stderr
            .take()
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(DecodeError::Decoder(format!(
                "ffmpeg exited with {}: {}",
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl VideoSource for FfmpegSource {
    fn frame_count(&self) -> usize {
        self.probe.frame_count
    }

    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, DecodeError> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_len()];
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled == 0 {
            self.finish()?;
            return Ok(None);
        }
        if filled < buf.len() {
            self.finish()?;
            return Err(DecodeError::InvalidFrame(format!(
                "truncated frame: {} of {} bytes",
                filled,
                buf.len()
            )));
        }

        Ok(Some(DecodedFrame::new(
            self.probe.width,
            self.probe.height,
            PixelOrder::Rgb,
            buf,
        )))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}
