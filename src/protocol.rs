//! TCP protocol for inference-process → counter communication.
//!
//! Each message is bincode, framed with a length prefix.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::pose::Pose;

/// A single pose is ~200 bytes; anything near this limit is garbage.
const MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Inference process → counter
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum PoseMessage {
    Pose { frame_id: u64, pose: Pose },
    InferenceFailed { frame_id: u64, reason: String },
    EndOfStream,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed")]
    Closed,
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

pub type MessageStream = Framed<TcpStream, LengthDelimitedCodec>;

/// Create a framed message stream with length-delimited framing.
pub fn message_stream(stream: TcpStream) -> MessageStream {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec();
    Framed::new(stream, codec)
}

/// Send a serializable message (bincode + length prefix).
pub async fn send_message<T: Serialize>(
    stream: &mut MessageStream,
    msg: &T,
) -> Result<(), ProtocolError> {
    let data = bincode::serialize(msg)?;
    stream.send(Bytes::from(data)).await?;
    Ok(())
}

/// Deserialize one frame's payload.
pub fn decode_message<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(bincode::deserialize(bytes)?)
}

/// Receive and deserialize a message.
pub async fn recv_message<T: DeserializeOwned>(
    stream: &mut MessageStream,
) -> Result<T, ProtocolError> {
    match stream.next().await {
        Some(Ok(bytes)) => decode_message(&bytes),
        Some(Err(e)) => Err(e.into()),
        None => Err(ProtocolError::Closed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Keypoint, KeypointIndex};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_pose_message_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut pose = Pose::default();
        pose.set(KeypointIndex::LeftWrist, Keypoint::new(100.0, 30.0, 0.8));
        let sent = PoseMessage::Pose { frame_id: 7, pose };
        let expected = sent.clone();

        let client = tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            let mut framed = message_stream(stream);
            send_message(&mut framed, &sent).await.unwrap();
            send_message(&mut framed, &PoseMessage::EndOfStream).await.unwrap();
        });

        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = message_stream(stream);
        let first: PoseMessage = recv_message(&mut framed).await.unwrap();
        let second: PoseMessage = recv_message(&mut framed).await.unwrap();
        assert_eq!(first, expected);
        assert_eq!(second, PoseMessage::EndOfStream);

        client.await.unwrap();
        let closed = recv_message::<PoseMessage>(&mut framed).await;
        assert!(matches!(closed, Err(ProtocolError::Closed)));
    }
}
