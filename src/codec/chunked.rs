// Chunked transfer-coding decoder
//
// Grammar: <hex-length>[;ext]CRLF <payload> CRLF ... 0 CRLF CRLF
// Decoding never fails: a length line that is not hex stops decoding and the
// rest of the input is treated as absent.

use super::{find, CRLF};

/// One decoded chunk borrowed from the wire bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Declared size from the length line.
    pub size: usize,
    /// Payload actually present; shorter than `size` only for a truncated last chunk.
    pub data: &'a [u8],
}

/// Split a chunked body into its chunks, stopping at the zero-length chunk.
pub fn decode_chunks(body: &[u8]) -> Vec<Chunk<'_>> {
    let mut chunks = Vec::new();
    let mut pos = 0;

    while let Some(line_len) = find(&body[pos..], CRLF.as_bytes()) {
        let line = String::from_utf8_lossy(&body[pos..pos + line_len]);
        let token = line.split(';').next().unwrap_or("").trim();
        let size = match usize::from_str_radix(token, 16) {
            Ok(size) => size,
            Err(_) => {
                tracing::debug!(token = %token, offset = pos, "Unparsable chunk length, stopping decode");
                break;
            }
        };
        pos += line_len + CRLF.len();
        if size == 0 {
            break;
        }

        let end = pos.saturating_add(size).min(body.len());
        chunks.push(Chunk {
            size,
            data: &body[pos..end],
        });
        if end - pos < size {
            tracing::debug!(declared = size, available = end - pos, "Truncated chunk");
            break;
        }
        pos = end;
        if body[pos..].starts_with(CRLF.as_bytes()) {
            pos += CRLF.len();
        }
    }

    chunks
}

/// Concatenated payload of every chunk.
pub fn decode_chunked(body: &[u8]) -> Vec<u8> {
    decode_chunks(body)
        .into_iter()
        .flat_map(|chunk| chunk.data.iter().copied())
        .collect()
}

/// Frame `body` as chunks of at most `chunk_size` bytes plus the terminator.
pub fn encode_chunked(body: &[u8], chunk_size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 16);
    for piece in body.chunks(chunk_size.max(1)) {
        out.extend_from_slice(format!("{:x}{}", piece.len(), CRLF).as_bytes());
        out.extend_from_slice(piece);
        out.extend_from_slice(CRLF.as_bytes());
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}
