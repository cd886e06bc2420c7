use crate::constants::REPLY_SERVICE_UNAVAILABLE;
use crate::core_reply::FtpResponse;
use crate::error::{FtpError, FtpResult};
use log::trace;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Reads one complete reply from the control connection.
///
/// The code comes from the first line. A first line whose fourth character is
/// `-` opens a multi-line reply (RFC 959 §4.2): lines without a leading code
/// are message text, and the reply ends on the first line that carries a code
/// not followed by `-`. A 421 reply is always turned into
/// [`FtpError::ServerDown`].
pub async fn read_response<R>(reader: &mut R, timeout: Duration) -> FtpResult<FtpResponse>
where
    R: AsyncBufRead + Unpin,
{
    let (first, _) = read_line(reader, timeout).await?;
    let code = parse_code(&first).ok_or_else(|| FtpError::InvalidResponse {
        line: first.clone(),
    })?;

    let mut more = is_continuation(&first);
    let mut lines = VecDeque::from([first]);
    while more {
        let (line, eof) = read_line(reader, timeout).await?;
        if eof && line.is_empty() {
            return Err(FtpError::InvalidResponse {
                line: lines.back().cloned().unwrap_or_default(),
            });
        }
        more = parse_code(&line).map_or(true, |_| is_continuation(&line));
        lines.push_back(line);
    }

    let response = FtpResponse::new(code, lines);
    trace!("<<< {}", response.text());
    if code == REPLY_SERVICE_UNAVAILABLE {
        return Err(FtpError::ServerDown(response));
    }
    Ok(response)
}

/// Reads up to and including the next `\n`. End of stream acts as a line
/// terminator so a connection closed mid-line never blocks the parser.
async fn read_line<R>(reader: &mut R, timeout: Duration) -> FtpResult<(String, bool)>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = tokio::time::timeout(timeout, reader.read_until(b'\n', &mut buf))
        .await
        .map_err(|_| FtpError::Timeout("reading a server reply".into()))??;
    let eof = n == 0 || buf.last() != Some(&b'\n');
    while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
        buf.pop();
    }
    Ok((String::from_utf8_lossy(&buf).into_owned(), eof))
}

fn parse_code(line: &str) -> Option<u16> {
    let digits = line.get(..3)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn is_continuation(line: &str) -> bool {
    line.len() >= 4 && line.as_bytes()[3] == b'-'
}
