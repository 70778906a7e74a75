//! HTTP byte-range parsing and stream slicing.
//!
//! A [`RangePlan`] captures everything the boundary layer needs to write a
//! correct full-content or partial-content response: status choice, content
//! length, the `Content-Range` value, and a slicer that restricts the payload
//! stream to the requested span. Slicing skips and truncates chunks rather
//! than seeking, so it works on any decoded stream regardless of source.

use futures_util::StreamExt;

use crate::error::{Error, Result};
use crate::stream::PayloadStream;

/// An inclusive byte span within a resource of known total size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte of the span.
    pub start: u64,
    /// Last byte of the span, inclusive.
    pub end: u64,
}

/// A validated delivery plan for one read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangePlan {
    /// Total size of the underlying resource in bytes.
    pub total_size: u64,
    /// The requested span, or `None` for a full-content delivery.
    pub range: Option<ByteRange>,
}

impl RangePlan {
    /// Parses and validates an optional `Range` header against the resource
    /// size.
    pub fn new(range_header: Option<&str>, total_size: u64) -> Result<Self> {
        let range = match range_header {
            Some(header) => Some(parse_range(header, total_size)?),
            None => None,
        };
        Ok(Self { total_size, range })
    }

    /// Whether this plan is a partial-content delivery.
    pub fn is_partial(&self) -> bool {
        self.range.is_some()
    }

    /// The number of body bytes this delivery carries.
    pub fn content_length(&self) -> u64 {
        match self.range {
            Some(range) => range.end - range.start + 1,
            None => self.total_size,
        }
    }

    /// The `Content-Range` header value, for partial deliveries.
    pub fn content_range(&self) -> Option<String> {
        self.range
            .map(|range| format!("bytes {}-{}/{}", range.start, range.end, self.total_size))
    }

    /// Restricts `stream` to the planned span.
    pub fn slice(&self, stream: PayloadStream) -> PayloadStream {
        match self.range {
            None => stream,
            Some(range) => slice_stream(stream, range),
        }
    }
}

fn parse_range(header: &str, total_size: u64) -> Result<ByteRange> {
    let unsatisfiable = || Error::RangeNotSatisfiable(header.to_owned());

    let spec = header.strip_prefix("bytes=").ok_or_else(unsatisfiable)?;
    if spec.contains(',') {
        // Multi-range requests are not supported.
        return Err(unsatisfiable());
    }
    let (start, end) = spec.split_once('-').ok_or_else(unsatisfiable)?;

    let start: u64 = start.trim().parse().map_err(|_| unsatisfiable())?;
    let end: u64 = match end.trim() {
        "" => total_size.checked_sub(1).ok_or_else(unsatisfiable)?,
        end => end.parse().map_err(|_| unsatisfiable())?,
    };

    if start > end || end >= total_size {
        return Err(Error::RangeNotSatisfiable(format!(
            "bytes {start}-{end} of {total_size}"
        )));
    }

    Ok(ByteRange { start, end })
}

fn slice_stream(stream: PayloadStream, range: ByteRange) -> PayloadStream {
    async_stream::try_stream! {
        let mut stream = stream;
        let mut skip = range.start;
        let mut remaining = range.end - range.start + 1;

        while remaining > 0 {
            let Some(chunk) = stream.next().await else {
                break;
            };
            let mut chunk = chunk?;

            if skip >= chunk.len() as u64 {
                skip -= chunk.len() as u64;
                continue;
            }
            if skip > 0 {
                chunk = chunk.slice(skip as usize..);
                skip = 0;
            }
            if chunk.len() as u64 > remaining {
                chunk = chunk.slice(..remaining as usize);
            }

            remaining -= chunk.len() as u64;
            yield chunk;
        }
    }
    .boxed()
}
