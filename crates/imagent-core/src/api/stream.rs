//! Incremental reader for the agent's record stream.
//!
//! Chunks arrive at arbitrary byte boundaries, so two pieces of state
//! survive between polls: the undecoded tail of a multi-byte UTF-8
//! sequence, and the decoded text of a record whose blank-line delimiter
//! has not arrived yet. A record is only parsed once its delimiter has
//! been seen, except at end-of-stream where any remaining buffered text
//! gets a best-effort parse.
//!
//! Malformed records (bad prefix, bad JSON, missing `format` on
//! `final_image`) are yielded as parse-kind errors and the stream keeps
//! going. An `end` record finishes the sequence at once: the source is
//! never polled again and leftover bytes are dropped unparsed.

use std::collections::VecDeque;
use std::pin::Pin;

use futures_util::Stream;

use super::events::{self, AgentEvent};
use super::{ApiError, ApiErrorKind, ApiResult};

/// Pull-based reader turning a byte stream into a sequence of `AgentEvent`s.
///
/// Finite (ends at stream end or at the `end` record) and non-restartable.
pub struct EventReader<S> {
    inner: S,
    /// Undecoded tail of a multi-byte UTF-8 sequence from the previous chunk.
    carry: Vec<u8>,
    /// Decoded text that has not yet formed a complete record.
    buffer: String,
    /// Parsed items not yet handed to the consumer.
    ready: VecDeque<ApiResult<AgentEvent>>,
    /// Set once the `end` record, a fatal error, or end-of-stream was seen.
    finished: bool,
}

impl<S> std::fmt::Debug for EventReader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReader")
            .field("carry", &self.carry)
            .field("buffer", &self.buffer)
            .field("ready", &self.ready)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<S> EventReader<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            carry: Vec::new(),
            buffer: String::new(),
            ready: VecDeque::new(),
            finished: false,
        }
    }

    /// Feeds one chunk: decode what is decodable, then split off any
    /// completed records. An empty chunk is a no-op.
    fn feed(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.carry.extend_from_slice(chunk);
        self.decode_carry();
        self.split_records();
    }

    /// Moves decodable bytes from `carry` into `buffer`.
    ///
    /// An incomplete multi-byte sequence at the end stays in `carry` for the
    /// next chunk; invalid sequences decode to U+FFFD.
    fn decode_carry(&mut self) {
        let input = std::mem::take(&mut self.carry);
        let mut offset = 0;

        while offset < input.len() {
            match std::str::from_utf8(&input[offset..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    if valid_up_to > 0 {
                        // The prefix is known-valid, so this borrows without copying.
                        self.buffer.push_str(&String::from_utf8_lossy(
                            &input[offset..offset + valid_up_to],
                        ));
                    }
                    match err.error_len() {
                        Some(bad) => {
                            self.buffer.push('\u{FFFD}');
                            offset += valid_up_to + bad;
                        }
                        None => {
                            // Incomplete tail: keep for the next chunk.
                            self.carry = input[offset + valid_up_to..].to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Splits completed records out of `buffer` and queues their parse
    /// results. Stops everything once `end` is seen.
    fn split_records(&mut self) {
        while let Some((at, len)) = find_blank_line(&self.buffer) {
            let record: String = self.buffer[..at].to_string();
            self.buffer.drain(..at + len);
            if self.push_record(&record) {
                self.finished = true;
                self.buffer.clear();
                self.carry.clear();
                return;
            }
        }
    }

    /// Queues the parse result for one record. Returns true for `end`.
    fn push_record(&mut self, record: &str) -> bool {
        if record.trim().is_empty() {
            return false;
        }
        let item = events::parse_record(record);
        let is_end = matches!(item, Ok(AgentEvent::End));
        self.ready.push_back(item);
        is_end
    }

    /// Best-effort handling of whatever is left when the source ends.
    fn flush_at_eof(&mut self) {
        if !self.carry.is_empty() {
            // A dangling partial sequence decodes to replacement characters.
            let tail = std::mem::take(&mut self.carry);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        let rest = std::mem::take(&mut self.buffer);
        if !rest.trim().is_empty() {
            self.push_record(&rest);
        }
    }
}

/// Finds the earliest blank-line delimiter (`\n\n` or `\r\n\r\n`),
/// returning its byte offset and length.
fn find_blank_line(text: &str) -> Option<(usize, usize)> {
    let lf = text.find("\n\n").map(|i| (i, 2));
    let crlf = text.find("\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

impl<S, E> Stream for EventReader<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = ApiResult<AgentEvent>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        let this = self.as_mut().get_mut();
        loop {
            if let Some(item) = this.ready.pop_front() {
                return Poll::Ready(Some(item));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => this.feed(&chunk),
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(ApiError::new(
                        ApiErrorKind::Transport,
                        format!("stream error: {e}"),
                    ))));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    this.flush_at_eof();
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    const TWO_STEP_STREAM: &str = concat!(
        r#"data:{"type":"thought","content":"a"}"#,
        "\n\n",
        r#"data:{"type":"final_output","content":"b"}"#,
        "\n\n",
        r#"data:{"type":"end","content":""}"#,
        "\n\n",
    );

    /// Helper to create a mock byte stream with the given chunk size.
    fn byte_stream(
        data: &[u8],
        chunk_size: usize,
    ) -> impl Stream<Item = std::result::Result<bytes::Bytes, std::io::Error>> + Unpin {
        let chunks: Vec<_> = data
            .chunks(chunk_size)
            .map(|c| Ok(bytes::Bytes::copy_from_slice(c)))
            .collect();
        futures_util::stream::iter(chunks)
    }

    async fn collect_events(
        stream: impl Stream<Item = std::result::Result<bytes::Bytes, std::io::Error>> + Unpin,
    ) -> Vec<ApiResult<AgentEvent>> {
        let mut reader = EventReader::new(stream);
        let mut items = Vec::new();
        while let Some(item) = reader.next().await {
            items.push(item);
        }
        items
    }

    fn ok_events(items: Vec<ApiResult<AgentEvent>>) -> Vec<AgentEvent> {
        items
            .into_iter()
            .map(|item| item.expect("expected valid event"))
            .collect()
    }

    #[tokio::test]
    async fn chunk_boundaries_do_not_change_the_event_sequence() {
        let whole = ok_events(collect_events(byte_stream(TWO_STEP_STREAM.as_bytes(), usize::MAX)).await);

        for chunk_size in [1, 2, 3, 7, 50] {
            let split =
                ok_events(collect_events(byte_stream(TWO_STEP_STREAM.as_bytes(), chunk_size)).await);
            assert_eq!(split, whole, "chunk_size {chunk_size}");
        }

        assert_eq!(
            whole,
            vec![
                AgentEvent::Thought {
                    content: "a".to_string()
                },
                AgentEvent::FinalOutput {
                    content: "b".to_string()
                },
                AgentEvent::End,
            ]
        );
    }

    #[tokio::test]
    async fn delimiter_split_across_chunks_parses_identically() {
        let data = TWO_STEP_STREAM.as_bytes();
        // Split right between the two newlines of the first delimiter.
        let at = TWO_STEP_STREAM.find("\n\n").unwrap() + 1;
        let chunks: Vec<std::result::Result<bytes::Bytes, std::io::Error>> = vec![
            Ok(bytes::Bytes::copy_from_slice(&data[..at])),
            Ok(bytes::Bytes::copy_from_slice(&data[at..])),
        ];
        let events = ok_events(collect_events(futures_util::stream::iter(chunks)).await);

        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            AgentEvent::Thought {
                content: "a".to_string()
            }
        );
    }

    #[tokio::test]
    async fn multibyte_character_split_across_chunks_decodes_intact() {
        // 👋 = F0 9F 91 8B; split after 2 of its 4 bytes.
        let data = "data:{\"type\":\"thought\",\"content\":\"hi 👋\"}\n\n";
        let bytes = data.as_bytes();
        let emoji_start = bytes
            .windows(4)
            .position(|w| w == [0xF0, 0x9F, 0x91, 0x8B])
            .expect("emoji not found");
        let split_point = emoji_start + 2;

        let chunks: Vec<std::result::Result<bytes::Bytes, std::io::Error>> = vec![
            Ok(bytes::Bytes::copy_from_slice(&bytes[..split_point])),
            Ok(bytes::Bytes::copy_from_slice(&bytes[split_point..])),
        ];
        let events = ok_events(collect_events(futures_util::stream::iter(chunks)).await);

        assert_eq!(
            events,
            vec![AgentEvent::Thought {
                content: "hi 👋".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn end_halts_consumption_and_trailing_bytes_are_never_parsed() {
        let data = concat!(
            r#"data:{"type":"thought","content":"a"}"#,
            "\n\n",
            r#"data:{"type":"end","content":""}"#,
            "\n\n",
            r#"data:{"type":"thought","content":"never seen"}"#,
            "\n\n",
        );
        let events = ok_events(collect_events(byte_stream(data.as_bytes(), 5)).await);

        assert_eq!(
            events,
            vec![
                AgentEvent::Thought {
                    content: "a".to_string()
                },
                AgentEvent::End,
            ]
        );
    }

    #[tokio::test]
    async fn source_is_not_polled_after_end() {
        let head = concat!(r#"data:{"type":"end","content":""}"#, "\n\n");
        // A stream that panics if polled past the first chunk.
        let chunks = futures_util::stream::iter(vec![Ok::<_, std::io::Error>(
            bytes::Bytes::copy_from_slice(head.as_bytes()),
        )])
        .chain(futures_util::stream::poll_fn(
            |_| -> std::task::Poll<Option<std::result::Result<bytes::Bytes, std::io::Error>>> {
                panic!("polled past the terminal event")
            },
        ));
        let mut reader = EventReader::new(Box::pin(chunks));

        assert_eq!(reader.next().await, Some(Ok(AgentEvent::End)));
        assert_eq!(reader.next().await, None);
    }

    #[tokio::test]
    async fn malformed_records_are_local_errors_and_the_stream_continues() {
        let data = concat!(
            "noise without prefix\n\n",
            "data:{broken json\n\n",
            r#"data:{"type":"final_image","content":"aGVsbG8="}"#,
            "\n\n",
            r#"data:{"type":"observation","content":"still here"}"#,
            "\n\n",
        );
        let items = collect_events(byte_stream(data.as_bytes(), 9)).await;

        assert_eq!(items.len(), 4);
        for bad in &items[..3] {
            let err = bad.as_ref().expect_err("expected malformed record");
            assert_eq!(err.kind, ApiErrorKind::Parse);
        }
        assert_eq!(
            items[3],
            Ok(AgentEvent::Observation {
                content: "still here".to_string()
            })
        );
    }

    #[tokio::test]
    async fn trailing_record_without_delimiter_parses_at_eof() {
        let data = r#"data:{"type":"final_output","content":"tail"}"#;
        let events = ok_events(collect_events(byte_stream(data.as_bytes(), 50)).await);

        assert_eq!(
            events,
            vec![AgentEvent::FinalOutput {
                content: "tail".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn empty_chunks_are_a_no_op() {
        let record = concat!(r#"data:{"type":"thought","content":"a"}"#, "\n\n");
        let chunks: Vec<std::result::Result<bytes::Bytes, std::io::Error>> = vec![
            Ok(bytes::Bytes::new()),
            Ok(bytes::Bytes::copy_from_slice(record.as_bytes())),
            Ok(bytes::Bytes::new()),
        ];
        let events = ok_events(collect_events(futures_util::stream::iter(chunks)).await);

        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn crlf_delimiters_are_tolerated() {
        let data = "data:{\"type\":\"thought\",\"content\":\"a\"}\r\n\r\ndata:{\"type\":\"end\",\"content\":\"\"}\r\n\r\n";
        let events = ok_events(collect_events(byte_stream(data.as_bytes(), 4)).await);

        assert_eq!(
            events,
            vec![
                AgentEvent::Thought {
                    content: "a".to_string()
                },
                AgentEvent::End,
            ]
        );
    }

    #[tokio::test]
    async fn transport_error_mid_stream_is_fatal() {
        let record = concat!(r#"data:{"type":"thought","content":"a"}"#, "\n\n");
        let chunks: Vec<std::result::Result<bytes::Bytes, std::io::Error>> = vec![
            Ok(bytes::Bytes::copy_from_slice(record.as_bytes())),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            )),
        ];
        let items = collect_events(futures_util::stream::iter(chunks)).await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        let err = items[1].as_ref().unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Transport);
    }
}
