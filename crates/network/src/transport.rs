//! Async framing over a byte stream: the header is read first so only the
//! declared `payloadLen` is ever buffered for the body.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{NetworkError, NetworkResult};
use crate::frame::{Frame, FrameHeader, FRAME_HEADER_SIZE};

pub async fn write_frame<S: AsyncWrite + Unpin>(stream: &mut S, magic: u32, frame: &Frame) -> NetworkResult<()> {
    let bytes = frame.encode(magic)?;
    stream.write_all(&bytes).await.map_err(NetworkError::Io)?;
    Ok(())
}

pub async fn read_frame<S: AsyncRead + Unpin>(stream: &mut S, magic: u32) -> NetworkResult<Frame> {
    let mut header_bytes = [0u8; FRAME_HEADER_SIZE];
    stream.read_exact(&mut header_bytes).await.map_err(NetworkError::Io)?;
    let header = FrameHeader::from_bytes(&header_bytes)?;
    if header.magic != magic {
        return Err(NetworkError::MagicMismatch { expected: magic, actual: header.magic });
    }
    let mut payload = vec![0u8; header.payload_len as usize];
    stream.read_exact(&mut payload).await.map_err(NetworkError::Io)?;
    Frame::from_parts(header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MessageCommand;

    #[tokio::test]
    async fn frames_round_trip_over_an_in_memory_duplex() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let frame = Frame::new(MessageCommand::Ping, vec![1, 2, 3, 4]);
        write_frame(&mut client, 0x334F_454E, &frame).await.unwrap();
        let decoded = read_frame(&mut server, 0x334F_454E).await.unwrap();
        assert_eq!(decoded.command, MessageCommand::Ping);
        assert_eq!(decoded.payload, vec![1, 2, 3, 4]);
    }
}
