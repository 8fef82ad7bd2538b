//! Async byte-stream traits.
//!
//! Content fetchers hand out `AsyncRead` streams and slot storage is written
//! through `AsyncWrite` sinks; both are the tokio traits.

pub use tokio::io::{
    copy, empty, sink, AsyncBufRead, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
    BufWriter, ReadBuf,
};
