// Flowline SDK
//
// Typed client for the Flowline API: emit events, inspect executions,
// and consume the live execution stream with reconnection offsets.

mod client;
mod stream;

pub use client::{Client, ClientError};
pub use stream::decode_stream;
