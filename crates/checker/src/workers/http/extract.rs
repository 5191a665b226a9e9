//! Response header and body extraction.

use std::time::Duration;

use tracing::warn;

use crate::types::Header;

/// Group a response's headers by name.
pub(crate) fn extract_headers<'a, I, V>(headers: I) -> Vec<Header>
where
    I: IntoIterator<Item = (&'a str, V)>,
    V: AsRef<[u8]>,
{
    Header::group(
        headers
            .into_iter()
            .map(|(name, value)| (name.to_string(), String::from_utf8_lossy(value.as_ref()).into_owned())),
    )
}

/// Read at most `cap` bytes of body.
///
/// When the advertised length fits under the cap that many bytes are read,
/// otherwise the read stops at the cap. Either way the read gives up after
/// `timeout` and keeps what arrived.
pub(crate) async fn read_body(mut response: reqwest::Response, cap: usize, timeout: Duration) -> String {
    let limit = match response.content_length() {
        Some(length) if (length as usize) <= cap => length as usize,
        _ => cap,
    };

    let mut body = Vec::with_capacity(limit);
    let read = async {
        while body.len() < limit {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let take = (limit - body.len()).min(chunk.len());
                    body.extend_from_slice(&chunk[..take]);
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "error reading response body");
                    break;
                }
            }
        }
    };
    if tokio::time::timeout(timeout, read).await.is_err() {
        warn!("timed out waiting to read body");
    }

    trim_body(&body)
}

/// Strip NUL padding and trailing newlines.
pub(crate) fn trim_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    text.trim_matches('\0').trim_end_matches('\n').to_string()
}
