// Wire protocol for execution event streams
//
// Three independent pieces, all stateless or buffered-per-connection:
// - the external event vocabulary (`events`), the shape clients consume
// - the internal-to-external mapper (`mapper`), a total function over
//   StepEvent kinds where "no external equivalent" is a valid outcome
// - the frame decoder (`frame`), which re-assembles blank-line-delimited
//   frames from arbitrarily fragmented byte chunks
//
// `repair` is a best-effort utility for rendering truncated JSON values
// while they are still being produced.

pub mod events;
pub mod frame;
pub mod mapper;
pub mod repair;

pub use events::{StreamEvent, StreamEventKind, DONE_SENTINEL};
pub use frame::{DecodedFrame, FrameDecoder};
pub use mapper::EventMapper;
pub use repair::repair_json;
