//! Wire framing: a 4-byte big-endian length prefix per TCP record (C6), and
//! a 12-byte nonce prefix per UDP datagram (C7).

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FramingError;
use crate::nonce::NONCE_LEN;

pub const MAX_PACKET_BYTES: u32 = 65_535;
const MIN_TCP_RECORD_LEN: u32 = 16;
const AEAD_TAG_LEN: usize = 16;
const MIN_UDP_DATAGRAM_LEN: usize = NONCE_LEN + AEAD_TAG_LEN;

/// Writes `u32_be(len(ciphertext)) || ciphertext`.
pub async fn write_tcp_record<T: AsyncWrite + Unpin>(
    transport: &mut T,
    ciphertext: &[u8],
) -> Result<(), FramingError> {
    transport.write_all(&(ciphertext.len() as u32).to_be_bytes()).await?;
    transport.write_all(ciphertext).await?;
    Ok(())
}

/// Reads one TCP record: a 4-byte length prefix followed by exactly that
/// many ciphertext bytes. `len` must be in `(16, MAX_PACKET_BYTES]`;
/// violating this is fatal to the connection since resynchronization is
/// impossible once the prefix is misread.
pub async fn read_tcp_record<T: AsyncRead + Unpin>(transport: &mut T) -> Result<Vec<u8>, FramingError> {
    let mut len_bytes = [0u8; 4];
    transport.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes);

    if len <= MIN_TCP_RECORD_LEN || len > MAX_PACKET_BYTES {
        return Err(FramingError::InvalidLength(len, MAX_PACKET_BYTES));
    }

    let mut buf = vec![0u8; len as usize];
    transport.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Writes `nonce (12) || ciphertext` as a single UDP datagram payload.
/// `nonce_and_ciphertext` is expected to already be in this layout, as
/// produced by [`crate::session::UdpSession::encrypt`].
pub fn encode_udp_datagram(nonce_and_ciphertext: &[u8]) -> &[u8] {
    nonce_and_ciphertext
}

/// Validates a received UDP datagram's minimum length before it is handed
/// to [`crate::session::UdpSession::decrypt`]. Too-short datagrams are
/// fatal only to the packet, not the session.
pub fn decode_udp_datagram(datagram: &[u8]) -> Result<&[u8], FramingError> {
    if datagram.len() < MIN_UDP_DATAGRAM_LEN {
        return Err(FramingError::MalformedDatagram);
    }
    Ok(datagram)
}
