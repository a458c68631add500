use crate::stream::{LogLevel, StreamEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

#[derive(Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((idx, delim_len)) = find_frame_delimiter(&self.buf) {
            let frame_bytes = self.buf[..idx].to_vec();
            self.buf.drain(..idx + delim_len);
            if let Some(frame) = parse_sse_frame(&frame_bytes) {
                frames.push(frame);
            }
        }
        frames
    }
}

fn find_frame_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if i + 3 < buf.len()
            && buf[i] == b'\r'
            && buf[i + 1] == b'\n'
            && buf[i + 2] == b'\r'
            && buf[i + 3] == b'\n'
        {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

/// Strips the field name and at most one following space; chunk text may
/// legitimately start with whitespace.
fn field_value<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(field)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

fn parse_sse_frame(bytes: &[u8]) -> Option<SseFrame> {
    if bytes.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(bytes);
    let mut event: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(value) = field_value(line, "event") {
            event = Some(value.to_string()).filter(|name| !name.is_empty());
            continue;
        }
        if let Some(value) = field_value(line, "data") {
            data_lines.push(value);
        } else if line == "data" {
            data_lines.push("");
        }
    }
    if event.is_none() && data_lines.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}

/// What the networked adapter does with one decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FrameAction {
    /// Enqueue and keep reading.
    Emit(StreamEvent),
    /// Enqueue, then close the connection and end the stream.
    Close(StreamEvent),
    /// Unknown named frame.
    Ignore,
}

#[derive(serde::Deserialize)]
struct MetaFrame {
    chat_id: i64,
}

/// Marker enqueued when the peer closes the connection.
pub(crate) fn closed_event() -> StreamEvent {
    StreamEvent::log(LogLevel::Info, "closed")
}

pub(crate) fn map_frame(frame: &SseFrame) -> FrameAction {
    match frame.event.as_deref() {
        None | Some("message") => FrameAction::Emit(StreamEvent::chunk(frame.data.clone())),
        Some("meta") => match serde_json::from_str::<MetaFrame>(&frame.data) {
            Ok(meta) => FrameAction::Emit(StreamEvent::meta(meta.chat_id)),
            Err(e) => FrameAction::Emit(StreamEvent::log(
                LogLevel::Error,
                format!("invalid meta frame: {e}"),
            )),
        },
        Some("log") => FrameAction::Emit(StreamEvent::log(LogLevel::Log, frame.data.clone())),
        Some("error") if frame.data.is_empty() => FrameAction::Close(closed_event()),
        Some("error") => FrameAction::Close(StreamEvent::error(frame.data.clone())),
        Some(_) => FrameAction::Ignore,
    }
}
