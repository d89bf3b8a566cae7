//! SSE (Server-Sent Events) framing for streaming completions.
//!
//! Each [`StreamEvent`] becomes one `data:` event carrying
//! `{"chunk": ...}` or, once at the end of a failed stream, `{"error": ...}`.
//! Payloads use `": "` and `", "` separators, matching the byte format
//! existing clients of the gateway expect.

use std::convert::Infallible;
use std::io;

use axum::response::sse::{Event, Sse};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};

use crate::dispatch::StreamEvent;

/// JSON formatter writing a space after every `:` and `,` separator.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

/// Encode the `data:` payload of one event.
pub fn encode_event(event: &StreamEvent) -> String {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, SpacedFormatter);
    if event.serialize(&mut ser).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}

/// Convert a dispatcher event stream into an SSE stream.
pub fn events_to_sse_stream(
    events: impl Stream<Item = StreamEvent> + Send + 'static,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    events.map(|event| Ok(Event::default().data(encode_event(&event))))
}

/// Build the `text/event-stream` response for a dispatcher event stream.
///
/// No keep-alive comments are interleaved: the body holds only `data:` events.
pub fn sse_response(
    events: impl Stream<Item = StreamEvent> + Send + 'static,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    Sse::new(events_to_sse_stream(events))
}
