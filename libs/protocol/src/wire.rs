//! XML wire framing for the status stream
//!
//! The response body is one long-lived XML document: a declaration, an
//! enclosing `<Response>` element, and zero or more complete
//! `<StatusMessage>` elements in emission order. The encoder produces one
//! self-contained element per message; the decoder consumes the body
//! incrementally and yields each message as soon as its element is
//! complete, without waiting for end-of-stream.

use chrono::NaiveDateTime;
use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::message::{ExceptionDetail, Level, Progress, StatusMessage};
use crate::ProtocolError;

/// Written once when the stream opens, before any message.
pub const STREAM_PREAMBLE: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?><Response>";

/// Written once when the operation ends; its presence distinguishes a
/// completed stream from a connection cut mid-operation.
pub const STREAM_CLOSE: &str = "</Response>";

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const MSG_START: &[u8] = b"<StatusMessage";
const MSG_END: &[u8] = b"</StatusMessage>";

/// Serialize one message to a complete, independently-parseable element.
pub fn encode_message(msg: &StatusMessage) -> Result<String, ProtocolError> {
    let mut writer = Writer::new(Vec::new());

    writer
        .create_element("StatusMessage")
        .write_inner_content(|w| {
            w.create_element("Level")
                .write_text_content(BytesText::new(msg.level.as_str()))?;
            w.create_element("Message")
                .write_text_content(BytesText::new(&msg.message))?;
            let date = msg.timestamp.format(DATE_FORMAT).to_string();
            w.create_element("Date")
                .write_text_content(BytesText::new(&date))?;

            if let Some(exception) = &msg.exception {
                w.create_element("Exception").write_inner_content(|w| {
                    w.create_element("ErrorMessage")
                        .write_text_content(BytesText::new(&exception.error_text))?;
                    w.create_element("Source")
                        .write_text_content(BytesText::new(&exception.origin))?;
                    w.create_element("StackTrace")
                        .write_text_content(BytesText::new(&exception.trace))?;
                    Ok::<(), ProtocolError>(())
                })?;
            }

            if let Some(progress) = &msg.progress {
                w.create_element("Progress").write_inner_content(|w| {
                    w.create_element("Percentage")
                        .write_text_content(BytesText::new(&progress.percentage.to_string()))?;
                    w.create_element("Processed")
                        .write_text_content(BytesText::new(&progress.processed.to_string()))?;
                    w.create_element("TotalToProcess")
                        .write_text_content(BytesText::new(&progress.total.to_string()))?;
                    Ok::<(), ProtocolError>(())
                })?;
            }

            Ok::<(), ProtocolError>(())
        })?;

    let bytes = writer.into_inner();
    // The writer only ever emits UTF-8
    Ok(String::from_utf8(bytes).expect("writer produced invalid UTF-8"))
}

/// Incremental decoder for a growing response body.
///
/// Bytes are pushed in as they arrive off the wire; [`next_message`] pops
/// each status message once its element is fully buffered. Whitespace and
/// unknown elements between messages are skipped, and the enclosing
/// envelope tags are consumed silently apart from recording the clean
/// close.
///
/// [`next_message`]: StreamDecoder::next_message
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buf: Vec<u8>,
    closed: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes received from the transport.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Whether the closing envelope tag has been observed.
    ///
    /// A stream that ends without it was cut mid-operation.
    pub fn saw_close(&self) -> bool {
        self.closed
    }

    /// Pop the next complete message, if one is fully buffered.
    ///
    /// Returns `Ok(None)` when more bytes are needed. A malformed message
    /// element is returned as an error and discarded from the buffer, so
    /// the caller can log it and keep reading.
    pub fn next_message(&mut self) -> Result<Option<StatusMessage>, ProtocolError> {
        let Some(start) = find(&self.buf, MSG_START, 0) else {
            if find(&self.buf, STREAM_CLOSE.as_bytes(), 0).is_some() {
                self.closed = true;
            }
            // Keep a tail large enough to hold any tag split across chunks
            if self.buf.len() > 32 {
                let keep_from = self.buf.len() - 32;
                self.buf.drain(..keep_from);
            }
            return Ok(None);
        };

        if find(&self.buf[..start], STREAM_CLOSE.as_bytes(), 0).is_some() {
            self.closed = true;
        }

        let Some(end_tag) = find(&self.buf, MSG_END, start) else {
            // Element still in flight; drop the junk before it and wait
            self.buf.drain(..start);
            return Ok(None);
        };

        let end = end_tag + MSG_END.len();
        let raw = self.buf[start..end].to_vec();
        self.buf.drain(..end);

        let text = std::str::from_utf8(&raw)?;
        parse_message(text).map(Some)
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if haystack.len() < from + needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

/// Parse one complete `<StatusMessage>` element.
///
/// Unknown child elements are skipped rather than rejected, so newer peers
/// can add fields without breaking older readers.
fn parse_message(xml: &str) -> Result<StatusMessage, ProtocolError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();

    let mut level_raw = String::new();
    let mut message = String::new();
    let mut date_raw = String::new();

    let mut saw_exception = false;
    let mut error_text = String::new();
    let mut origin = String::new();
    let mut trace = String::new();

    let mut saw_progress = false;
    let mut percentage_raw = String::new();
    let mut processed_raw = String::new();
    let mut total_raw = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                if stack.len() == 1 && name == b"Exception" {
                    saw_exception = true;
                } else if stack.len() == 1 && name == b"Progress" {
                    saw_progress = true;
                }
                stack.push(name);
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                let target = match field_path(&stack) {
                    Some(FieldPath::Level) => &mut level_raw,
                    Some(FieldPath::Message) => &mut message,
                    Some(FieldPath::Date) => &mut date_raw,
                    Some(FieldPath::ErrorMessage) => &mut error_text,
                    Some(FieldPath::Source) => &mut origin,
                    Some(FieldPath::StackTrace) => &mut trace,
                    Some(FieldPath::Percentage) => &mut percentage_raw,
                    Some(FieldPath::Processed) => &mut processed_raw,
                    Some(FieldPath::TotalToProcess) => &mut total_raw,
                    None => continue,
                };
                target.push_str(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let level: Level = level_raw
        .parse()
        .map_err(|e: String| ProtocolError::Malformed(e))?;
    if message.is_empty() {
        return Err(ProtocolError::Malformed(
            "missing or empty Message element".to_string(),
        ));
    }
    let timestamp = NaiveDateTime::parse_from_str(&date_raw, DATE_FORMAT)
        .map_err(|e| ProtocolError::Malformed(format!("bad Date value '{}': {}", date_raw, e)))?;

    let exception = saw_exception.then_some(ExceptionDetail {
        error_text,
        origin,
        trace,
    });

    let progress = if saw_progress {
        Some(Progress {
            percentage: parse_count(&percentage_raw, "Percentage")?,
            processed: parse_count(&processed_raw, "Processed")?,
            total: parse_count(&total_raw, "TotalToProcess")?,
        })
    } else {
        None
    };

    Ok(StatusMessage {
        level,
        message,
        timestamp,
        exception,
        progress,
    })
}

enum FieldPath {
    Level,
    Message,
    Date,
    ErrorMessage,
    Source,
    StackTrace,
    Percentage,
    Processed,
    TotalToProcess,
}

fn field_path(stack: &[Vec<u8>]) -> Option<FieldPath> {
    match stack {
        [root, field] if root == b"StatusMessage" => match field.as_slice() {
            b"Level" => Some(FieldPath::Level),
            b"Message" => Some(FieldPath::Message),
            b"Date" => Some(FieldPath::Date),
            _ => None,
        },
        [root, group, field] if root == b"StatusMessage" && group == b"Exception" => {
            match field.as_slice() {
                b"ErrorMessage" => Some(FieldPath::ErrorMessage),
                b"Source" => Some(FieldPath::Source),
                b"StackTrace" => Some(FieldPath::StackTrace),
                _ => None,
            }
        }
        [root, group, field] if root == b"StatusMessage" && group == b"Progress" => {
            match field.as_slice() {
                b"Percentage" => Some(FieldPath::Percentage),
                b"Processed" => Some(FieldPath::Processed),
                b"TotalToProcess" => Some(FieldPath::TotalToProcess),
                _ => None,
            }
        }
        _ => None,
    }
}

fn parse_count(raw: &str, field: &str) -> Result<u32, ProtocolError> {
    raw.trim()
        .parse()
        .map_err(|e| ProtocolError::Malformed(format!("bad {} value '{}': {}", field, raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ExceptionDetail, Level, Progress, StatusMessage};

    fn sample_message() -> StatusMessage {
        StatusMessage {
            level: Level::Info,
            message: "Installed item <root>/home & co".to_string(),
            timestamp: NaiveDateTime::parse_from_str("2026-08-24T12:00:05", DATE_FORMAT).unwrap(),
            exception: None,
            progress: Some(Progress::compute(5, 10)),
        }
    }

    #[test]
    fn test_round_trip_plain() {
        let original = StatusMessage {
            level: Level::Debug,
            message: "preparing".to_string(),
            timestamp: NaiveDateTime::parse_from_str("2026-01-02T03:04:05", DATE_FORMAT).unwrap(),
            exception: None,
            progress: None,
        };

        let encoded = encode_message(&original).unwrap();
        let mut decoder = StreamDecoder::new();
        decoder.push(encoded.as_bytes());
        let decoded = decoder.next_message().unwrap().unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_round_trip_all_fields() {
        let original = sample_message().with_exception(ExceptionDetail {
            error_text: "cannot read \"item\"".to_string(),
            origin: "repository".to_string(),
            trace: "line 1\nline 2".to_string(),
        });

        let encoded = encode_message(&original).unwrap();
        let mut decoder = StreamDecoder::new();
        decoder.push(encoded.as_bytes());
        let decoded = decoder.next_message().unwrap().unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_incremental_single_byte_chunks() {
        let original = sample_message();
        let encoded = encode_message(&original).unwrap();

        let mut decoder = StreamDecoder::new();
        decoder.push(STREAM_PREAMBLE.as_bytes());
        assert!(decoder.next_message().unwrap().is_none());

        let bytes = encoded.as_bytes();
        for (i, byte) in bytes.iter().enumerate() {
            decoder.push(&[*byte]);
            let result = decoder.next_message().unwrap();
            if i < bytes.len() - 1 {
                assert!(result.is_none(), "message completed early at byte {}", i);
            } else {
                assert_eq!(result.unwrap(), original);
            }
        }
    }

    #[test]
    fn test_multiple_messages_in_one_chunk() {
        let first = sample_message();
        let second = StatusMessage {
            message: "second".to_string(),
            ..sample_message()
        };

        let mut body = String::from(STREAM_PREAMBLE);
        body.push_str(&encode_message(&first).unwrap());
        body.push_str("\n  \n");
        body.push_str(&encode_message(&second).unwrap());
        body.push_str(STREAM_CLOSE);

        let mut decoder = StreamDecoder::new();
        decoder.push(body.as_bytes());

        assert_eq!(decoder.next_message().unwrap().unwrap(), first);
        assert_eq!(decoder.next_message().unwrap().unwrap(), second);
        assert!(decoder.next_message().unwrap().is_none());
        assert!(decoder.saw_close());
    }

    #[test]
    fn test_unknown_elements_ignored() {
        let body = "<?xml version=\"1.0\" encoding=\"utf-8\"?><Response>\
            <Heartbeat>1</Heartbeat>\
            <StatusMessage>\
            <Level>WARN</Level>\
            <Message>drift</Message>\
            <Revision>42</Revision>\
            <Date>2026-08-24T12:00:00</Date>\
            </StatusMessage>";

        let mut decoder = StreamDecoder::new();
        decoder.push(body.as_bytes());
        let msg = decoder.next_message().unwrap().unwrap();
        assert_eq!(msg.level, Level::Warn);
        assert_eq!(msg.message, "drift");
        assert!(msg.progress.is_none());
        assert!(!decoder.saw_close());
    }

    #[test]
    fn test_close_without_messages() {
        let mut decoder = StreamDecoder::new();
        decoder.push(STREAM_PREAMBLE.as_bytes());
        assert!(decoder.next_message().unwrap().is_none());
        assert!(!decoder.saw_close());

        decoder.push(STREAM_CLOSE.as_bytes());
        assert!(decoder.next_message().unwrap().is_none());
        assert!(decoder.saw_close());
    }

    #[test]
    fn test_close_tag_split_across_chunks() {
        let mut decoder = StreamDecoder::new();
        decoder.push(STREAM_PREAMBLE.as_bytes());
        decoder.push(b"</Resp");
        assert!(decoder.next_message().unwrap().is_none());
        decoder.push(b"onse>");
        assert!(decoder.next_message().unwrap().is_none());
        assert!(decoder.saw_close());
    }

    #[test]
    fn test_truncated_stream_reports_no_close() {
        let original = sample_message();
        let mut body = String::from(STREAM_PREAMBLE);
        body.push_str(&encode_message(&original).unwrap());
        // Connection cut here: no closing envelope tag

        let mut decoder = StreamDecoder::new();
        decoder.push(body.as_bytes());
        assert!(decoder.next_message().unwrap().is_some());
        assert!(decoder.next_message().unwrap().is_none());
        assert!(!decoder.saw_close());
    }

    #[test]
    fn test_malformed_message_is_error_and_skipped() {
        let good = sample_message();
        let mut body = String::from(STREAM_PREAMBLE);
        body.push_str("<StatusMessage><Level>NOPE</Level><Message>x</Message><Date>2026-08-24T12:00:00</Date></StatusMessage>");
        body.push_str(&encode_message(&good).unwrap());

        let mut decoder = StreamDecoder::new();
        decoder.push(body.as_bytes());

        assert!(decoder.next_message().is_err());
        // The bad element was consumed; the stream keeps going
        assert_eq!(decoder.next_message().unwrap().unwrap(), good);
    }
}
