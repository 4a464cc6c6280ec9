//! Acquisition file codec (`SP01` spectroscopy / `SPF1` phasor files).
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! magic        4 bytes  "SP01" | "SPF1"
//! meta_len     u32
//! metadata     meta_len bytes of UTF-8 JSON
//! records      repeated until EOF:
//!   timestamp  f64 (ns)
//!   histograms per active channel, HISTOGRAM_BINS x u32
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{DecayCurve, HISTOGRAM_BINS};
use crate::error::SpcError;
use crate::math::linspace;

const MAGIC_LEN: usize = 4;
const BIN_BYTES: usize = 4;
const TIMESTAMP_BYTES: usize = 8;

/// Which acquisition mode produced the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Spectroscopy,
    Phasors,
}

impl FileKind {
    pub fn magic(self) -> &'static [u8; 4] {
        match self {
            FileKind::Spectroscopy => b"SP01",
            FileKind::Phasors => b"SPF1",
        }
    }

    pub fn from_magic(magic: [u8; 4]) -> Result<Self, SpcError> {
        match &magic {
            b"SP01" => Ok(FileKind::Spectroscopy),
            b"SPF1" => Ok(FileKind::Phasors),
            _ => Err(SpcError::BadMagic(magic)),
        }
    }
}

/// JSON header. Keys other than the two required ones are carried through
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpcMetadata {
    /// Active channel indices, in the order histograms appear in a record.
    pub channels: Vec<u32>,
    pub laser_period_ns: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One timestamped acquisition: a histogram per active channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SpcRecord {
    pub timestamp_ns: f64,
    pub histograms: Vec<Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpcFile {
    pub kind: FileKind,
    pub metadata: SpcMetadata,
    pub records: Vec<SpcRecord>,
}

impl SpcFile {
    fn record_len(&self) -> usize {
        record_len(self.metadata.channels.len())
    }

    /// Decode an in-memory file.
    pub fn decode(bytes: &[u8]) -> Result<Self, SpcError> {
        let mut rest = bytes;

        let magic: [u8; 4] = take_array(&mut rest, "magic")?;
        let kind = FileKind::from_magic(magic)?;

        let meta_len = u32::from_le_bytes(take_array(&mut rest, "metadata length")?) as usize;
        let meta_bytes = take(&mut rest, meta_len, "metadata")?;
        let metadata: SpcMetadata = serde_json::from_slice(meta_bytes)?;

        let n_channels = metadata.channels.len();
        let rec_len = record_len(n_channels);
        let n_records = rest.len() / rec_len;
        let trailing = rest.len() % rec_len;
        if trailing != 0 {
            warn!(
                trailing_bytes = trailing,
                record_bytes = rec_len,
                "dropping partial trailing record"
            );
        }

        let mut records = Vec::with_capacity(n_records);
        for chunk in rest.chunks_exact(rec_len) {
            records.push(decode_record(chunk, n_channels));
        }
        debug!(?kind, channels = n_channels, records = records.len(), "decoded acquisition file");

        Ok(Self {
            kind,
            metadata,
            records,
        })
    }

    /// Encode to bytes. `decode(encode(f)) == f`.
    pub fn encode(&self) -> Result<Vec<u8>, SpcError> {
        let n_channels = self.metadata.channels.len();
        for record in &self.records {
            if record.histograms.len() != n_channels {
                return Err(SpcError::ChannelCount {
                    expected: n_channels,
                    got: record.histograms.len(),
                });
            }
            if let Some((index, h)) = record
                .histograms
                .iter()
                .enumerate()
                .find(|(_, h)| h.len() != HISTOGRAM_BINS)
            {
                return Err(SpcError::HistogramLength {
                    index,
                    len: h.len(),
                    expected: HISTOGRAM_BINS,
                });
            }
        }

        let meta = serde_json::to_vec(&self.metadata)?;
        let meta_len = u32::try_from(meta.len()).map_err(|_| SpcError::Truncated("metadata too large"))?;

        let mut out =
            Vec::with_capacity(MAGIC_LEN + 4 + meta.len() + self.records.len() * self.record_len());
        out.extend_from_slice(self.kind.magic());
        out.extend_from_slice(&meta_len.to_le_bytes());
        out.extend_from_slice(&meta);
        for record in &self.records {
            out.extend_from_slice(&record.timestamp_ns.to_le_bytes());
            for h in &record.histograms {
                for count in h {
                    out.extend_from_slice(&count.to_le_bytes());
                }
            }
        }
        Ok(out)
    }

    /// One decay curve per active channel: histograms summed over every
    /// record, on `linspace(0, laser_period_ns, HISTOGRAM_BINS)`.
    pub fn decay_curves(&self) -> Vec<DecayCurve> {
        let x = linspace(0.0, self.metadata.laser_period_ns, HISTOGRAM_BINS);

        self.metadata
            .channels
            .iter()
            .enumerate()
            .map(|(idx, &channel)| {
                let mut sums = vec![0u64; HISTOGRAM_BINS];
                for record in &self.records {
                    for (acc, &count) in sums.iter_mut().zip(&record.histograms[idx]) {
                        *acc += u64::from(count);
                    }
                }
                DecayCurve::new(channel, x.clone(), sums.into_iter().map(|v| v as f64).collect())
            })
            .collect()
    }
}

/// Read and decode an acquisition file from disk.
pub fn read_spc(path: &Path) -> Result<SpcFile, SpcError> {
    let bytes = fs::read(path)?;
    SpcFile::decode(&bytes)
}

pub fn write_spc(path: &Path, file: &SpcFile) -> Result<(), SpcError> {
    fs::write(path, file.encode()?)?;
    Ok(())
}

fn record_len(n_channels: usize) -> usize {
    TIMESTAMP_BYTES + n_channels * HISTOGRAM_BINS * BIN_BYTES
}

fn decode_record(chunk: &[u8], n_channels: usize) -> SpcRecord {
    let (ts, body) = chunk.split_at(TIMESTAMP_BYTES);
    let mut ts_bytes = [0u8; TIMESTAMP_BYTES];
    ts_bytes.copy_from_slice(ts);

    let histograms = body
        .chunks_exact(HISTOGRAM_BINS * BIN_BYTES)
        .take(n_channels)
        .map(|h| {
            h.chunks_exact(BIN_BYTES)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect()
        })
        .collect();

    SpcRecord {
        timestamp_ns: f64::from_le_bytes(ts_bytes),
        histograms,
    }
}

fn take<'a>(rest: &mut &'a [u8], n: usize, what: &'static str) -> Result<&'a [u8], SpcError> {
    if rest.len() < n {
        return Err(SpcError::Truncated(what));
    }
    let (head, tail) = rest.split_at(n);
    *rest = tail;
    Ok(head)
}

fn take_array<const N: usize>(rest: &mut &[u8], what: &'static str) -> Result<[u8; N], SpcError> {
    let mut out = [0u8; N];
    out.copy_from_slice(take(rest, N, what)?);
    Ok(out)
}
