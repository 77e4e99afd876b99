//! Control protocol reply framing
//!
//! A reply is one or more lines sharing a three-digit status:
//!
//! ```text
//! 250-version=0.4.8.10       mid line
//! 250+config-text=           data line, followed by a block ending in "."
//! ...
//! .
//! 250 OK                     end line
//! ```

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::trace;

use tormask_core::{Error, Result};

/// One complete reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Three-digit status code
    pub status: u16,
    /// Text of each line, without status and separator
    pub lines: Vec<String>,
}

impl Reply {
    /// 2xx replies are positive completions
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Text of the final line
    pub fn message(&self) -> &str {
        self.lines.last().map(String::as_str).unwrap_or("")
    }
}

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status, self.message())
    }
}

/// Reads replies from a control connection
pub struct ReplyReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> ReplyReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
        }
    }

    /// Read the next reply
    ///
    /// Returns `Ok(None)` on a clean end of stream between replies. An end of
    /// stream inside a reply, or a line that does not parse, is a transport
    /// error.
    pub async fn next_reply(&mut self) -> Result<Option<Reply>> {
        let mut status = None;
        let mut lines = Vec::new();

        loop {
            let Some(line) = self.read_line().await? else {
                if status.is_none() {
                    return Ok(None);
                }
                return Err(Error::transport("Connection closed mid-reply"));
            };

            let (code, separator, text) = split_line(&line)?;
            match status {
                None => status = Some(code),
                Some(expected) if expected != code => {
                    return Err(Error::transport(format!(
                        "Status changed mid-reply ({} then {})",
                        expected, code
                    )));
                }
                Some(_) => {}
            }

            match separator {
                ' ' => {
                    lines.push(text.to_string());
                    return Ok(Some(Reply { status: code, lines }));
                }
                '-' => lines.push(text.to_string()),
                '+' => {
                    lines.push(text.to_string());
                    self.skip_data_block().await?;
                }
                other => {
                    return Err(Error::transport(format!(
                        "Unexpected reply separator {:?}",
                        other
                    )));
                }
            }
        }
    }

    async fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| Error::transport(format!("Failed to read reply: {}", e)))?;
        if read == 0 {
            return Ok(None);
        }
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        trace!("Control reply line: {:?}", line);
        Ok(Some(line))
    }

    async fn skip_data_block(&mut self) -> Result<()> {
        loop {
            match self.read_line().await? {
                Some(line) if line == "." => return Ok(()),
                Some(_) => {}
                None => return Err(Error::transport("Connection closed inside data block")),
            }
        }
    }
}

fn split_line(line: &str) -> Result<(u16, char, &str)> {
    let malformed = || Error::transport(format!("Malformed reply line: {:?}", line));

    let code = line.get(..3).ok_or_else(malformed)?;
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let status = code.parse::<u16>().map_err(|_| malformed())?;

    let mut rest = line[3..].chars();
    // A bare "250" is treated as an end line
    let separator = rest.next().unwrap_or(' ');
    Ok((status, separator, rest.as_str()))
}
