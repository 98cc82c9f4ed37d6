//! Streaming event transport.
//!
//! Raw body chunks flow through [`FrameBuffer`] (lines), [`EventBlockParser`]
//! (event blocks) and [`decode_event`] (typed payloads) before
//! [`StreamCallbacks`] dispatches them. [`StreamDriver`] runs the whole
//! pipeline for one HTTP request.

mod cancel;
mod driver;
mod error;
mod event;
mod frame;
mod parser;

pub use cancel::StreamHandle;
pub use driver::{StreamDriver, StreamRequest};
pub use error::{StreamError, extract_detail};
pub use event::{
    DEFAULT_ERROR_REASON, ErrorSignal, ProgressEvent, StreamCallbacks, StreamDecoder, StreamEvent,
    decode_event,
};
pub use frame::FrameBuffer;
pub use parser::{EventBlockParser, RawEvent};
