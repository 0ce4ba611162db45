//! RouterOS API wire codec.
//!
//! The API service frames everything as *words*: a variable-width length
//! header followed by that many bytes of UTF-8. A *sentence* is a run of
//! words terminated by a zero-length word. Replies are sentences whose
//! first word is a control token: `!re` (data row), `!done` (end of
//! reply), `!trap` / `!fatal` (error).
//!
//! Length headers use 1-5 bytes depending on magnitude:
//!
//! | length               | encoding                          |
//! |----------------------|-----------------------------------|
//! | `< 0x80`             | 1 byte, as-is                     |
//! | `< 0x4000`           | 2 bytes, high bits `10`           |
//! | `< 0x20_0000`        | 3 bytes, high bits `110`          |
//! | `< 0x1000_0000`      | 4 bytes, high bits `1110`         |
//! | otherwise            | `0xF0` marker + 4 length bytes    |

use std::collections::HashMap;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single word we are willing to read. RouterOS replies
/// to the commands this crate issues are tiny; anything larger is a
/// corrupt stream or a non-API peer.
const MAX_WORD_LENGTH: u32 = 1 << 20;

/// Encode a word length into `buf`, returning how many bytes were used.
pub fn encode_length(len: u32, buf: &mut [u8; 5]) -> usize {
    if len < 0x80 {
        buf[0] = len as u8;
        1
    } else if len < 0x4000 {
        let v = len | 0x8000;
        buf[0] = (v >> 8) as u8;
        buf[1] = v as u8;
        2
    } else if len < 0x20_0000 {
        let v = len | 0x00C0_0000;
        buf[0] = (v >> 16) as u8;
        buf[1] = (v >> 8) as u8;
        buf[2] = v as u8;
        3
    } else if len < 0x1000_0000 {
        let v = len | 0xE000_0000;
        buf[0] = (v >> 24) as u8;
        buf[1] = (v >> 16) as u8;
        buf[2] = (v >> 8) as u8;
        buf[3] = v as u8;
        4
    } else {
        buf[0] = 0xF0;
        buf[1] = (len >> 24) as u8;
        buf[2] = (len >> 16) as u8;
        buf[3] = (len >> 8) as u8;
        buf[4] = len as u8;
        5
    }
}

/// Read a word length header from the stream.
pub async fn read_length<R>(r: &mut R) -> io::Result<u32>
where
    R: AsyncRead + Unpin,
{
    let first = r.read_u8().await?;
    let len = if first < 0x80 {
        u32::from(first)
    } else if first < 0xC0 {
        (u32::from(first & 0x7F) << 8) | u32::from(r.read_u8().await?)
    } else if first < 0xE0 {
        (u32::from(first & 0x1F) << 16)
            | (u32::from(r.read_u8().await?) << 8)
            | u32::from(r.read_u8().await?)
    } else if first < 0xF0 {
        (u32::from(first & 0x0F) << 24)
            | (u32::from(r.read_u8().await?) << 16)
            | (u32::from(r.read_u8().await?) << 8)
            | u32::from(r.read_u8().await?)
    } else {
        (u32::from(r.read_u8().await?) << 24)
            | (u32::from(r.read_u8().await?) << 16)
            | (u32::from(r.read_u8().await?) << 8)
            | u32::from(r.read_u8().await?)
    };
    Ok(len)
}

/// Write one word (length header + payload).
pub async fn write_word<W>(w: &mut W, word: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = word.as_bytes();
    let mut header = [0u8; 5];
    let n = encode_length(bytes.len() as u32, &mut header);
    w.write_all(&header[..n]).await?;
    w.write_all(bytes).await?;
    Ok(())
}

/// Write a full sentence: every word in `words`, then the terminator.
pub async fn write_sentence<W, I, S>(w: &mut W, words: I) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for word in words {
        write_word(w, word.as_ref()).await?;
    }
    // Zero-length terminator word.
    w.write_all(&[0]).await?;
    w.flush().await?;
    Ok(())
}

/// Read one word; an empty string is the sentence terminator.
pub async fn read_word<R>(r: &mut R) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let len = read_length(r).await?;
    if len == 0 {
        return Ok(String::new());
    }
    if len > MAX_WORD_LENGTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("word length {len} exceeds limit"),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf).await?;
    String::from_utf8(buf)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "word is not valid UTF-8"))
}

/// Read one full sentence (words until the terminator).
///
/// Returns an empty vector for a bare terminator, which some RouterOS
/// versions emit between replies.
pub async fn read_sentence<R>(r: &mut R) -> io::Result<Vec<String>>
where
    R: AsyncRead + Unpin,
{
    let mut words = Vec::new();
    loop {
        let word = read_word(r).await?;
        if word.is_empty() {
            return Ok(words);
        }
        words.push(word);
    }
}

/// A parsed reply sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplySentence {
    /// `!re` - one data row of attributes.
    Data(HashMap<String, String>),
    /// `!done` - end of reply; may carry attributes (e.g. `=ret=`).
    Done(HashMap<String, String>),
    /// `!trap` or `!fatal` - the device reported an error.
    Trap {
        /// `=message=` attribute, or a placeholder when absent.
        message: String,
        /// True for `!fatal` (connection is dead afterwards).
        fatal: bool,
    },
}

/// Classify a raw sentence into a [`ReplySentence`].
///
/// Unknown control words yield `None`; the caller skips them the way
/// the stock clients do.
pub fn classify_sentence(words: &[String]) -> Option<ReplySentence> {
    let (control, rest) = words.split_first()?;
    match control.as_str() {
        "!re" => Some(ReplySentence::Data(parse_attributes(rest))),
        "!done" => Some(ReplySentence::Done(parse_attributes(rest))),
        "!trap" | "!fatal" => {
            let attrs = parse_attributes(rest);
            Some(ReplySentence::Trap {
                message: attrs
                    .get("message")
                    .cloned()
                    .unwrap_or_else(|| "unknown error".to_string()),
                fatal: control == "!fatal",
            })
        }
        _ => None,
    }
}

/// Parse `=key=value` attribute words into a map. Words that don't
/// follow the attribute shape are ignored.
fn parse_attributes(words: &[String]) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for word in words {
        if let Some(body) = word.strip_prefix('=') {
            let (key, value) = match body.split_once('=') {
                Some((k, v)) => (k, v),
                None => (body, ""),
            };
            attrs.insert(key.to_string(), value.to_string());
        }
    }
    attrs
}

/// Format a command argument word (`=key=value`).
pub fn attribute_word(key: &str, value: &str) -> String {
    format!("={key}={value}")
}

/// Format a print-query word (`?key=value`).
pub fn query_word(key: &str, value: &str) -> String {
    format!("?{key}={value}")
}
