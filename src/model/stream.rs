//! Line-oriented decoding of streamed HTTP bodies

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::response::ChunkStream;

/// What a single body line contributes to the output stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineChunk {
    Text(String),
    Skip,
    Done,
}

/// Turn a streaming response into text chunks, one parsed line at a time
///
/// Lines are split on `\n` over raw bytes so multi-byte characters that
/// straddle network reads are reassembled before decoding. A transport error
/// ends the stream early.
pub fn line_stream<F>(response: reqwest::Response, mut parse: F) -> ChunkStream
where
    F: FnMut(&str) -> LineChunk + Send + 'static,
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let mut body = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(item) = body.next().await {
            let bytes = match item {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(error = %e, "model stream interrupted");
                    return;
                }
            };
            buffer.extend_from_slice(&bytes);

            while let Some(end) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=end).collect();
                let line = String::from_utf8_lossy(&line);
                match parse(line.trim()) {
                    LineChunk::Text(text) => {
                        if tx.send(text).await.is_err() {
                            return;
                        }
                    }
                    LineChunk::Skip => {}
                    LineChunk::Done => return,
                }
            }
        }

        let rest = String::from_utf8_lossy(&buffer);
        if let LineChunk::Text(text) = parse(rest.trim()) {
            let _ = tx.send(text).await;
        }
    });

    ReceiverStream::new(rx).boxed()
}
