use crate::{AssetFormat, Error, Frame, Result};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

/// Encodes raw RGBA frames into a looping animation with an external
/// `ffmpeg` process.
///
/// Frames are streamed over stdin as `rawvideo`; the finished asset is read
/// back from stdout, so no intermediate files are written.
#[derive(Clone, Debug)]
pub struct FfmpegEncoder {
    program: PathBuf,
    format: AssetFormat,
    export_width: Option<u32>,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<PathBuf>, format: AssetFormat) -> Self {
        Self {
            program: program.into(),
            format,
            export_width: None,
        }
    }

    /// Rescales the output to `width` pixels wide, keeping the aspect ratio.
    pub fn with_export_width(mut self, width: u32) -> Self {
        self.export_width = (width > 0).then_some(width);
        self
    }

    pub fn format(&self) -> AssetFormat {
        self.format
    }

    /// Whether the configured binary can be started at all.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn args(&self, width: u32, height: u32, framerate: u32) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.push(format!("{width}x{height}"));
        args.extend(["-framerate".to_string(), framerate.to_string()]);
        args.extend(["-i".to_string(), "pipe:0".to_string(), "-an".to_string()]);
        if let Some(w) = self.export_width {
            args.extend(["-vf".to_string(), format!("scale={w}:-1:flags=lanczos")]);
        }
        args.extend(["-r".to_string(), framerate.to_string()]);
        match self.format {
            AssetFormat::Gif | AssetFormat::Webp => {
                args.extend(["-loop".to_string(), "0".to_string()]);
            }
            AssetFormat::Apng => {
                args.extend(["-plays".to_string(), "0".to_string()]);
            }
        }
        args.extend([
            "-f".to_string(),
            self.format.muxer().to_string(),
            "pipe:1".to_string(),
        ]);
        args
    }

    /// Encodes `frames` in order at `framerate` frames per second.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if the frames are empty or inconsistent, the
    /// encoder cannot be started, or it exits unsuccessfully. The error
    /// carries the encoder's stderr.
    pub fn encode(&self, frames: &[Frame], framerate: u32) -> Result<Vec<u8>> {
        let Some(first) = frames.first() else {
            return Err(Error::encode("no frames to encode"));
        };
        if framerate == 0 {
            return Err(Error::encode("framerate must be non-zero"));
        }
        let expected = Frame::byte_len(first.width, first.height);
        for (i, frame) in frames.iter().enumerate() {
            if frame.width != first.width
                || frame.height != first.height
                || frame.data.len() != expected
            {
                return Err(Error::encode(format!(
                    "frame {i} is {}x{} ({} bytes), expected {}x{} ({expected} bytes)",
                    frame.width,
                    frame.height,
                    frame.data.len(),
                    first.width,
                    first.height,
                )));
            }
        }

        let mut child = Command::new(&self.program)
            .args(self.args(first.width, first.height, framerate))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::encode(format!(
                    "failed to spawn '{}' (is it installed and on PATH?): {e}",
                    self.program.display()
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::encode("failed to open encoder stdin"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::encode("failed to open encoder stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::encode("failed to open encoder stderr"))?;

        // Both pipes must be drained while frames are written, or a full
        // pipe buffer stalls the encoder.
        let out_reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });
        let err_reader = thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf);
            buf
        });

        let mut write_error = None;
        for frame in frames {
            if let Err(e) = stdin.write_all(&frame.data) {
                write_error = Some(e);
                break;
            }
        }
        drop(stdin);

        let status = child
            .wait()
            .map_err(|e| Error::encode(format!("failed to wait for encoder: {e}")))?;
        let output = out_reader
            .join()
            .map_err(|_| Error::encode("encoder stdout reader panicked"))?;
        let stderr = err_reader.join().unwrap_or_default();
        let stderr = String::from_utf8_lossy(&stderr);

        if !status.success() {
            return Err(Error::encode(format!(
                "encoder exited with {status}: {}",
                stderr.trim()
            )));
        }
        if let Some(e) = write_error {
            return Err(Error::encode(format!(
                "failed to write frames to encoder: {e}: {}",
                stderr.trim()
            )));
        }
        let output =
            output.map_err(|e| Error::encode(format!("failed to read encoder output: {e}")))?;
        if output.is_empty() {
            return Err(Error::encode("encoder produced no output"));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32) -> Frame {
        Frame {
            width,
            height,
            data: vec![0; Frame::byte_len(width, height)],
        }
    }

    #[test]
    fn empty_sequence_is_rejected() {
        let encoder = FfmpegEncoder::new("ffmpeg", AssetFormat::Gif);
        assert!(matches!(encoder.encode(&[], 60), Err(Error::Encode { .. })));
    }

    #[test]
    fn mismatched_frames_are_rejected() {
        let encoder = FfmpegEncoder::new("ffmpeg", AssetFormat::Gif);
        let err = encoder.encode(&[frame(4, 4), frame(4, 2)], 60).unwrap_err();
        assert!(matches!(err, Error::Encode { .. }));
    }

    #[test]
    fn missing_binary_is_an_encode_error() {
        let encoder = FfmpegEncoder::new("/nonexistent/divergence-ffmpeg", AssetFormat::Webp);
        assert!(!encoder.is_available());
        let err = encoder.encode(&[frame(2, 2)], 60).unwrap_err();
        assert!(matches!(err, Error::Encode { .. }));
    }

    #[test]
    fn args_follow_format_and_export_width() {
        let gif = FfmpegEncoder::new("ffmpeg", AssetFormat::Gif).with_export_width(1500);
        let args = gif.args(704, 255, 60);
        assert!(args.windows(2).any(|w| w == ["-s", "704x255"]));
        assert!(args.windows(2).any(|w| w == ["-vf", "scale=1500:-1:flags=lanczos"]));
        assert!(args.windows(2).any(|w| w == ["-loop", "0"]));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));

        let apng = FfmpegEncoder::new("ffmpeg", AssetFormat::Apng).with_export_width(0);
        let args = apng.args(88, 255, 30);
        assert!(!args.iter().any(|a| a == "-vf"));
        assert!(args.windows(2).any(|w| w == ["-plays", "0"]));
        assert!(args.windows(2).any(|w| w == ["-f", "apng"]));
    }

    #[test]
    fn frames_encode_to_a_looping_gif() {
        let encoder = FfmpegEncoder::new("ffmpeg", AssetFormat::Gif).with_export_width(16);
        if !encoder.is_available() {
            eprintln!("skipping: ffmpeg is not on PATH");
            return;
        }
        let lit = Frame {
            width: 8,
            height: 8,
            data: [255, 140, 40, 255].repeat(64),
        };
        let dark = Frame {
            data: [8, 8, 10, 255].repeat(64),
            ..lit.clone()
        };

        let bytes = encoder.encode(&[lit, dark], 60).unwrap();
        assert!(bytes.starts_with(b"GIF89a"), "not a gif: {:?}", &bytes[..bytes.len().min(6)]);
        assert_eq!(bytes.last(), Some(&0x3b));
    }
}
