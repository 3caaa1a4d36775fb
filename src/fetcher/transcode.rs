//! Audio-track extraction using an external ffmpeg binary

use super::{MediaBody, MediaSource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

/// MIME type of transcoded output
pub const TRANSCODED_MIME_TYPE: &str = "audio/mpeg";

const READ_BUFFER: usize = 64 * 1024;

/// Re-encodes a media stream into an mp3 audio stream with ffmpeg
///
/// The input is piped to ffmpeg's stdin and the output read from its stdout,
/// so neither side is held in memory or written to disk.
#[derive(Debug, Clone)]
pub struct AudioTranscoder {
    binary_path: PathBuf,
}

impl AudioTranscoder {
    /// Create a transcoder with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Use `configured` if given, otherwise search PATH for `ffmpeg`
    pub fn locate(configured: Option<PathBuf>) -> Option<Self> {
        configured
            .or_else(|| which::which("ffmpeg").ok())
            .map(Self::new)
    }

    /// Binary this transcoder runs
    pub fn binary_path(&self) -> &std::path::Path {
        &self.binary_path
    }

    /// Start transcoding `input`; `link` is reported in errors
    pub fn transcode(&self, input: MediaSource, link: &str) -> Result<MediaSource> {
        let mut child = Command::new(&self.binary_path)
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-i",
                "pipe:0",
                "-vn",
                "-f",
                "mp3",
                "pipe:1",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::download_unavailable(link, format!("failed to execute ffmpeg: {}", e)))?;

        let (Some(mut stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(Error::download_unavailable(link, "ffmpeg pipes unavailable"));
        };

        let mut body = input.body;
        let feed_link = link.to_string();
        let feeder = tokio::spawn(async move {
            while let Some(chunk) = body.next_chunk().await? {
                stdin
                    .write_all(&chunk)
                    .await
                    .map_err(|e| Error::download_unavailable(&feed_link, e))?;
            }
            // dropping stdin closes the pipe and lets ffmpeg finish
            drop(stdin);
            Ok(())
        });

        Ok(MediaSource {
            mime_type: TRANSCODED_MIME_TYPE.to_string(),
            content_length: None,
            body: Box::new(TranscodedBody {
                child,
                stdout,
                feeder: Some(feeder),
                link: link.to_string(),
                finished: false,
            }),
        })
    }
}

struct TranscodedBody {
    child: Child,
    stdout: ChildStdout,
    feeder: Option<JoinHandle<Result<()>>>,
    link: String,
    finished: bool,
}

impl TranscodedBody {
    async fn finish(&mut self) -> Result<()> {
        if let Some(feeder) = self.feeder.take() {
            match feeder.await {
                Ok(result) => result?,
                Err(e) => return Err(Error::download_unavailable(&self.link, e)),
            }
        }
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| Error::download_unavailable(&self.link, e))?;
        if !status.success() {
            return Err(Error::download_unavailable(
                &self.link,
                format!("ffmpeg exited with {}", status),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaBody for TranscodedBody {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.finished {
            return Ok(None);
        }
        let mut buf = vec![0u8; READ_BUFFER];
        let n = self
            .stdout
            .read(&mut buf)
            .await
            .map_err(|e| Error::download_unavailable(&self.link, e))?;
        if n > 0 {
            buf.truncate(n);
            return Ok(Some(buf));
        }
        self.finished = true;
        self.finish().await?;
        Ok(None)
    }
}
