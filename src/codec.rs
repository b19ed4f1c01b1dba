//! Merge codecs: combine several unit payloads into one output payload

use std::sync::Arc;

use thiserror::Error;

/// Failure reported by a merge codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// The codec's internal buffer cannot hold this batch. Smaller batches
    /// may still succeed.
    #[error("batch of {inputs} inputs exceeds codec capacity ({limit})")]
    Capacity { inputs: usize, limit: usize },

    #[error("invalid input: {0}")]
    Invalid(String),
}

/// Combines N payloads into one.
///
/// Implementations must be associative over their own output: merging a
/// list directly has to equal merging two halves and then merging the two
/// results. Capacity recovery relies on it.
pub trait MergeCodec: Send + Sync {
    fn merge(&self, inputs: &[Arc<[u8]>]) -> Result<Vec<u8>, MergeError>;
}

impl<F> MergeCodec for F
where
    F: Fn(&[Arc<[u8]>]) -> Result<Vec<u8>, MergeError> + Send + Sync,
{
    fn merge(&self, inputs: &[Arc<[u8]>]) -> Result<Vec<u8>, MergeError> {
        self(inputs)
    }
}

// ============================================
// Framed container codec
// ============================================

const MAGIC: &[u8; 4] = b"DXSM";
const HEADER_LEN: usize = 8;

/// Length-prefixed container of unit payloads.
///
/// Layout: `DXSM`, frame count (u32 LE), then per frame a length (u32 LE)
/// followed by the bytes. Inputs that are themselves framed containers are
/// flattened, which makes the codec associative.
#[derive(Debug, Clone, Copy, Default)]
pub struct FramedCodec {
    max_batch: Option<usize>,
}

impl FramedCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject calls with more than `limit` inputs as a capacity failure
    pub fn with_max_batch(limit: usize) -> Self {
        Self {
            max_batch: Some(limit),
        }
    }

    /// Split a framed container back into its frames
    pub fn unpack(bytes: &[u8]) -> Result<Vec<Vec<u8>>, MergeError> {
        let frames = parse_frames(bytes)
            .ok_or_else(|| MergeError::Invalid("not a framed container".to_string()))?;
        Ok(frames.into_iter().map(<[u8]>::to_vec).collect())
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Option<usize> {
    let raw: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw) as usize)
}

fn parse_frames(bytes: &[u8]) -> Option<Vec<&[u8]>> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return None;
    }
    let count = read_u32(bytes, 4)?;
    let mut frames = Vec::with_capacity(count);
    let mut pos = HEADER_LEN;
    for _ in 0..count {
        let len = read_u32(bytes, pos)?;
        pos += 4;
        frames.push(bytes.get(pos..pos + len)?);
        pos += len;
    }
    (pos == bytes.len()).then_some(frames)
}

impl MergeCodec for FramedCodec {
    fn merge(&self, inputs: &[Arc<[u8]>]) -> Result<Vec<u8>, MergeError> {
        if let Some(limit) = self.max_batch {
            if inputs.len() > limit {
                return Err(MergeError::Capacity {
                    inputs: inputs.len(),
                    limit,
                });
            }
        }

        let mut frames: Vec<&[u8]> = Vec::new();
        for input in inputs {
            match parse_frames(input) {
                Some(inner) => frames.extend(inner),
                None => frames.push(&input[..]),
            }
        }

        let body: usize = frames.iter().map(|f| f.len() + 4).sum();
        let mut out = Vec::with_capacity(HEADER_LEN + body);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&frame_len(frames.len())?.to_le_bytes());
        for frame in frames {
            out.extend_from_slice(&frame_len(frame.len())?.to_le_bytes());
            out.extend_from_slice(frame);
        }
        Ok(out)
    }
}

fn frame_len(len: usize) -> Result<u32, MergeError> {
    u32::try_from(len).map_err(|_| MergeError::Invalid(format!("frame of {} bytes too large", len)))
}
