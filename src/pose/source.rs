//! Pose sources: anything that yields one `Pose` per call.
//!
//! The pose model runs outside this crate. Sources here either replay a
//! PoseNet JSON-lines recording or receive poses from an inference process
//! over TCP.

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;

use futures::{FutureExt, StreamExt};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::net::TcpListener;
use tracing::{debug, info};

use super::keypoint::Pose;
use super::posenet::parse_posenet_json;
use crate::error::PoseError;
use crate::protocol::{self, MessageStream, PoseMessage, ProtocolError};

/// One pose per call. A call may suspend while inference is running.
pub trait PoseSource {
    fn next_pose(&mut self) -> impl Future<Output = Result<Pose, PoseError>> + Send;

    /// Drops results that are already waiting to be read and returns how
    /// many were dropped. Called when capture resumes, so anything produced
    /// while capture was stopped is never counted. Never blocks.
    fn discard_pending(&mut self) -> usize {
        0
    }
}

/// PoseNet JSON を1行1姿勢で読み出すソース
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: AsyncBufRead + Unpin> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl JsonLinesSource<BufReader<File>> {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, PoseError> {
        let file = File::open(path.as_ref()).await?;
        info!(path = %path.as_ref().display(), "replaying poses");
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin + Send> PoseSource for JsonLinesSource<R> {
    async fn next_pose(&mut self) -> Result<Pose, PoseError> {
        loop {
            // 読めなかった行も1行として数える
            let next = self.lines.next_line().await;
            self.line_no += 1;
            let Some(line) = next? else {
                return Err(PoseError::Exhausted);
            };
            if line.trim().is_empty() {
                continue;
            }
            return parse_posenet_json(&line)
                .map_err(|e| PoseError::Decode(format!("line {}: {}", self.line_no, e)));
        }
    }
}

/// Receives poses from a single inference client over TCP.
///
/// The first call accepts the connection. The stream ends when the client
/// sends `EndOfStream` or disconnects; a later call accepts the next client.
pub struct TcpPoseSource {
    listener: TcpListener,
    stream: Option<MessageStream>,
    /// The client finished while its frames were being discarded. The next
    /// call reports `Exhausted` before accepting anyone new.
    ended: bool,
}

impl TcpPoseSource {
    pub async fn bind(addr: &str) -> Result<Self, PoseError> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "waiting for inference client");
        Ok(Self {
            listener,
            stream: None,
            ended: false,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, PoseError> {
        Ok(self.listener.local_addr()?)
    }

    async fn stream(&mut self) -> Result<&mut MessageStream, PoseError> {
        if self.stream.is_none() {
            let (tcp_stream, addr) = self.listener.accept().await?;
            tcp_stream.set_nodelay(true)?;
            info!(%addr, "inference client connected");
            self.stream = Some(protocol::message_stream(tcp_stream));
        }
        self.stream.as_mut().ok_or(PoseError::Exhausted)
    }
}

impl PoseSource for TcpPoseSource {
    async fn next_pose(&mut self) -> Result<Pose, PoseError> {
        if std::mem::take(&mut self.ended) {
            return Err(PoseError::Exhausted);
        }
        let stream = self.stream().await?;
        match protocol::recv_message::<PoseMessage>(stream).await {
            Ok(PoseMessage::Pose { frame_id, pose }) => {
                debug!(frame_id, "pose received");
                Ok(pose)
            }
            Ok(PoseMessage::InferenceFailed { frame_id, reason }) => {
                Err(PoseError::Inference(format!("frame {}: {}", frame_id, reason)))
            }
            Ok(PoseMessage::EndOfStream) | Err(ProtocolError::Closed) => {
                self.stream = None;
                info!("inference client finished");
                Err(PoseError::Exhausted)
            }
            Err(ProtocolError::Codec(e)) => Err(PoseError::Decode(e.to_string())),
            Err(ProtocolError::Io(e)) => Err(PoseError::Io(e)),
        }
    }

    fn discard_pending(&mut self) -> usize {
        let Some(stream) = self.stream.as_mut() else {
            return 0;
        };
        let mut discarded = 0;
        let mut ended = false;
        // Only frames the socket can hand over right now; never waits.
        while let Some(frame) = stream.next().now_or_never() {
            match frame {
                Some(Ok(bytes)) => match protocol::decode_message::<PoseMessage>(&bytes) {
                    Ok(PoseMessage::EndOfStream) => {
                        ended = true;
                        break;
                    }
                    _ => discarded += 1,
                },
                Some(Err(e)) => {
                    debug!(error = %e, "read error while discarding, left for the next call");
                    break;
                }
                None => {
                    ended = true;
                    break;
                }
            }
        }
        if ended {
            self.stream = None;
            self.ended = true;
            info!("inference client finished while capture was stopped");
        }
        discarded
    }
}
