//! Version handshake (spec §4.7): the dialer sends `version`; the listener
//! replies `version` then both sides send `verack`. A magic mismatch or an
//! unsupported protocol version ends the connection before any other
//! message is processed.

use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use neo_io::Serializable;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;

use crate::command::MessageCommand;
use crate::error::{NetworkError, NetworkResult};
use crate::frame::Frame;
use crate::payload::VersionPayload;
use crate::transport::{read_frame, write_frame};

/// Lowest protocol version this node will negotiate with.
pub const MIN_PROTOCOL_VERSION: u32 = 0;

pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

pub fn local_version_payload(network: u32, nonce: u32, user_agent: String, start_height: u32) -> VersionPayload {
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as u32;
    VersionPayload { network, version: 0, timestamp, nonce, user_agent, start_height, relay: true }
}

fn check_peer_version(peer: &VersionPayload, magic: u32) -> NetworkResult<()> {
    if peer.network != magic {
        return Err(NetworkError::MagicMismatch { expected: magic, actual: peer.network });
    }
    if peer.version < MIN_PROTOCOL_VERSION {
        return Err(NetworkError::UnsupportedVersion(peer.version));
    }
    Ok(())
}

async fn send_version<S: AsyncWrite + Unpin>(stream: &mut S, magic: u32, version: &VersionPayload) -> NetworkResult<()> {
    write_frame(stream, magic, &Frame::new(MessageCommand::Version, version.to_bytes())).await
}

async fn send_verack<S: AsyncWrite + Unpin>(stream: &mut S, magic: u32) -> NetworkResult<()> {
    write_frame(stream, magic, &Frame::new(MessageCommand::Verack, Vec::new())).await
}

async fn expect_command<S: AsyncRead + Unpin>(
    stream: &mut S,
    magic: u32,
    expected: MessageCommand,
    expected_name: &'static str,
) -> NetworkResult<Frame> {
    let frame = read_frame(stream, magic).await?;
    if frame.command != expected {
        return Err(NetworkError::UnexpectedMessage { expected: expected_name, got: format!("{:?}", frame.command) });
    }
    Ok(frame)
}

async fn expect_version<S: AsyncRead + Unpin>(stream: &mut S, magic: u32) -> NetworkResult<VersionPayload> {
    let frame = expect_command(stream, magic, MessageCommand::Version, "version").await?;
    VersionPayload::from_bytes(&frame.payload).map_err(NetworkError::Codec)
}

async fn expect_verack<S: AsyncRead + Unpin>(stream: &mut S, magic: u32) -> NetworkResult<()> {
    expect_command(stream, magic, MessageCommand::Verack, "verack").await.map(|_| ())
}

/// Dialer side: we speak first.
pub async fn dial<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    magic: u32,
    local: &VersionPayload,
    peer_addr: SocketAddr,
) -> NetworkResult<VersionPayload> {
    timeout(HANDSHAKE_TIMEOUT, async {
        send_version(stream, magic, local).await?;
        let peer_version = expect_version(stream, magic).await?;
        check_peer_version(&peer_version, magic)?;
        send_verack(stream, magic).await?;
        expect_verack(stream, magic).await?;
        Ok(peer_version)
    })
    .await
    .unwrap_or(Err(NetworkError::HandshakeTimeout(peer_addr)))
}

/// Listener side: we wait for the peer's `version` before replying.
pub async fn accept<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    magic: u32,
    local: &VersionPayload,
    peer_addr: SocketAddr,
) -> NetworkResult<VersionPayload> {
    timeout(HANDSHAKE_TIMEOUT, async {
        let peer_version = expect_version(stream, magic).await?;
        check_peer_version(&peer_version, magic)?;
        send_version(stream, magic, local).await?;
        send_verack(stream, magic).await?;
        expect_verack(stream, magic).await?;
        Ok(peer_version)
    })
    .await
    .unwrap_or(Err(NetworkError::HandshakeTimeout(peer_addr)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dialer_and_listener_complete_the_handshake() {
        let (mut client, mut server) = tokio::io::duplex(8192);
        let magic = 0x334F_454E;
        let dialer_version = local_version_payload(magic, 1, "/neo-node-rs:0.1.0/".to_string(), 0);
        let listener_version = local_version_payload(magic, 2, "/neo-node-rs:0.1.0/".to_string(), 10);
        let addr: SocketAddr = "127.0.0.1:10333".parse().unwrap();

        let dial_fut = dial(&mut client, magic, &dialer_version, addr);
        let accept_fut = accept(&mut server, magic, &listener_version, addr);
        let (dial_result, accept_result) = tokio::join!(dial_fut, accept_fut);

        assert_eq!(dial_result.unwrap().nonce, 2);
        assert_eq!(accept_result.unwrap().nonce, 1);
    }

    #[test]
    fn a_peer_declaring_a_different_network_is_rejected() {
        let peer = local_version_payload(0x4E45_4F54, 1, "a".to_string(), 0);
        assert!(matches!(check_peer_version(&peer, 0x334F_454E), Err(NetworkError::MagicMismatch { .. })));
    }

    #[test]
    fn a_peer_on_the_same_network_passes() {
        let peer = local_version_payload(0x334F_454E, 1, "a".to_string(), 0);
        assert!(check_peer_version(&peer, 0x334F_454E).is_ok());
    }
}
