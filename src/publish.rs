//! Export of stored segment sets to S3.

use anyhow::Result;
use aws_sdk_s3::primitives::ByteStream;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use tracing::info;

use crate::model::{Segment, SegmentKey};

/// Object key for a segment set, partitioned like the local store.
pub fn object_key(key: &SegmentKey, gzip: bool) -> String {
    let base = format!(
        "segments/date={}/train_code={}.json",
        key.date.format("%Y-%m-%d"),
        key.train_code
    );
    if gzip { format!("{base}.gz") } else { base }
}

/// Serializes a segment set as a JSON array, optionally gzip-compressed.
pub fn encode(segments: &[Segment], gzip: bool) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(segments)?;
    if !gzip {
        return Ok(json);
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Uploads the segment set for `key`; returns the object key written.
#[tracing::instrument(skip(client, segments), fields(key = %key, count = segments.len()))]
pub async fn publish_segments(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &SegmentKey,
    segments: &[Segment],
    gzip: bool,
) -> Result<String> {
    let body = encode(segments, gzip)?;
    let s3_key = object_key(key, gzip);

    let mut request = client
        .put_object()
        .bucket(bucket)
        .key(&s3_key)
        .body(ByteStream::from(body))
        .content_type("application/json");
    if gzip {
        request = request.content_encoding("gzip");
    }
    request.send().await?;

    info!(bucket, s3_key, "Segments uploaded");
    Ok(s3_key)
}
