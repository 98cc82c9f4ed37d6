//! Payload decoding and callback dispatch.

use super::frame::FrameBuffer;
use super::parser::{EventBlockParser, RawEvent};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Reason used when an `error` event carries no readable message.
pub const DEFAULT_ERROR_REASON: &str = "An unexpected error occurred";

/// Transient status update sent while the server is still working.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressEvent {
    pub phase: String,
    pub message: String,
}

impl ProgressEvent {
    /// Missing, null and non-string fields all read as empty.
    fn from_value(value: &serde_json::Value) -> Self {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        Self {
            phase: field("phase"),
            message: field("message"),
        }
    }
}

/// Terminal failure reported in-band by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSignal {
    pub reason: String,
}

impl ErrorSignal {
    /// Read the reason from the first string field the server is known to use.
    fn from_value(value: &serde_json::Value) -> Self {
        let reason = ["reason", "message", "detail", "error"]
            .iter()
            .find_map(|key| {
                value
                    .get(key)
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or(DEFAULT_ERROR_REASON);
        Self {
            reason: reason.to_string(),
        }
    }
}

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent<C> {
    Progress(ProgressEvent),
    Complete(C),
    Error(ErrorSignal),
}

/// Decode one raw block.
///
/// Returns `None` for malformed payloads and unknown event types; both are
/// dropped without ending the stream.
pub fn decode_event<C: DeserializeOwned>(raw: &RawEvent) -> Option<StreamEvent<C>> {
    let value: serde_json::Value = match serde_json::from_str(&raw.data) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(event = %raw.event, "Failed to parse stream event: {e}\nData: {}", raw.data);
            return None;
        }
    };

    match raw.event.as_str() {
        "progress" if value.is_object() => {
            Some(StreamEvent::Progress(ProgressEvent::from_value(&value)))
        }
        "progress" => {
            tracing::warn!("Malformed progress event: expected an object\nData: {}", raw.data);
            None
        }
        "complete" => match serde_json::from_value::<C>(value) {
            Ok(payload) => Some(StreamEvent::Complete(payload)),
            Err(e) => {
                tracing::warn!("Malformed completion payload: {e}\nData: {}", raw.data);
                None
            }
        },
        "error" => Some(StreamEvent::Error(ErrorSignal::from_value(&value))),
        other => {
            tracing::debug!(event = other, "Ignoring unknown stream event");
            None
        }
    }
}

/// Bytes in, typed events out.
///
/// Chains the frame buffer, block parser and payload decoder. The output
/// sequence does not depend on where chunk boundaries fall.
#[derive(Debug)]
pub struct StreamDecoder<C> {
    frames: FrameBuffer,
    parser: EventBlockParser,
    _payload: PhantomData<fn() -> C>,
}

impl<C> Default for StreamDecoder<C> {
    fn default() -> Self {
        Self {
            frames: FrameBuffer::new(),
            parser: EventBlockParser::new(),
            _payload: PhantomData,
        }
    }
}

impl<C: DeserializeOwned> StreamDecoder<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a body chunk and return the events it completed, in wire order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent<C>> {
        let lines = self.frames.push(chunk);
        self.parser
            .push_lines(lines)
            .iter()
            .filter_map(decode_event::<C>)
            .collect()
    }

    /// End of body: anything not closed by a blank line is discarded.
    pub fn finish(&mut self) {
        let dropped = self.frames.finish();
        if dropped > 0 || self.parser.has_pending() {
            tracing::debug!(bytes = dropped, "Discarding incomplete frame at end of stream");
        }
        self.parser.finish();
    }
}

pub(crate) type ProgressFn = Box<dyn FnMut(ProgressEvent) + Send>;
pub(crate) type CompleteFn<C> = Box<dyn FnOnce(C) + Send>;
pub(crate) type ErrorFn = Box<dyn FnOnce(String) + Send>;

/// Callbacks for one stream. All optional.
///
/// The terminal callbacks are `FnOnce`: whichever of `on_complete` or
/// `on_error` fires first consumes both, so at most one terminal call
/// can ever happen.
pub struct StreamCallbacks<C> {
    on_progress: Option<ProgressFn>,
    on_complete: Option<CompleteFn<C>>,
    on_error: Option<ErrorFn>,
    finished: bool,
}

impl<C> Default for StreamCallbacks<C> {
    fn default() -> Self {
        Self {
            on_progress: None,
            on_complete: None,
            on_error: None,
            finished: false,
        }
    }
}

impl<C> std::fmt::Debug for StreamCallbacks<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCallbacks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("finished", &self.finished)
            .finish()
    }
}

impl<C> StreamCallbacks<C> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_progress(mut self, f: impl FnMut(ProgressEvent) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_complete(mut self, f: impl FnOnce(C) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_error(mut self, f: impl FnOnce(String) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Split into the raw callbacks, for wrapping.
    pub(crate) fn into_parts(self) -> (Option<ProgressFn>, Option<CompleteFn<C>>, Option<ErrorFn>) {
        (self.on_progress, self.on_complete, self.on_error)
    }

    /// Whether a terminal callback slot has been consumed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Route one event to its callback. Returns true once the stream is over.
    pub fn dispatch(&mut self, event: StreamEvent<C>) -> bool {
        if self.finished {
            return true;
        }
        match event {
            StreamEvent::Progress(progress) => {
                if let Some(f) = self.on_progress.as_mut() {
                    f(progress);
                }
                false
            }
            StreamEvent::Complete(payload) => {
                let on_complete = self.on_complete.take();
                self.finish();
                if let Some(f) = on_complete {
                    f(payload);
                }
                true
            }
            StreamEvent::Error(signal) => {
                self.fail(signal.reason);
                true
            }
        }
    }

    /// Report a failure that did not come from the event stream itself.
    pub fn fail(&mut self, reason: String) {
        if self.finished {
            return;
        }
        let on_error = self.on_error.take();
        self.finish();
        if let Some(f) = on_error {
            f(reason);
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.on_progress = None;
        self.on_complete = None;
        self.on_error = None;
    }
}
