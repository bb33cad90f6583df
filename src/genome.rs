//! Genome-wide coordinates and fixed-size windows.
//!
//! Contigs are laid end to end in reference-index order. The first contig
//! starts at offset 1 and every following contig starts right after the
//! previous one:
//!
//! ```text
//! offsets[0] = 1
//! offsets[i] = offsets[i - 1] + length[i - 1]
//! absolute   = position + offsets[contig] - 1
//! ```

use std::collections::HashMap;

use crate::error::{Result, ScanError};

/// Offset of the first contig on the genome-wide axis.
pub const FIRST_CONTIG_OFFSET: u64 = 1;

/// Ordered contig lengths with their cumulative start offsets.
#[derive(Debug, Clone)]
pub struct ContigIndex {
    contigs: Vec<(String, u64)>,
    offsets: HashMap<String, u64>,
}

impl ContigIndex {
    /// Build the index from `(name, length)` pairs in concatenation order.
    ///
    /// A name listed twice keeps its first offset.
    pub fn new(contigs: Vec<(String, u64)>) -> Result<Self> {
        let mut offsets = HashMap::with_capacity(contigs.len());
        let mut next = FIRST_CONTIG_OFFSET;
        for (i, (name, len)) in contigs.iter().enumerate() {
            if *len == 0 {
                return Err(ScanError::parse(
                    i + 1,
                    format!("contig '{}' has zero length", name),
                ));
            }
            offsets.entry(name.clone()).or_insert(next);
            next += len;
        }
        Ok(Self { contigs, offsets })
    }

    pub fn contigs(&self) -> &[(String, u64)] {
        &self.contigs
    }

    pub fn len(&self) -> usize {
        self.contigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contigs.is_empty()
    }

    /// Start offset of `contig`, or `None` if the index does not list it.
    pub fn offset(&self, contig: &str) -> Option<u64> {
        self.offsets.get(contig).copied()
    }

    /// Genome-wide coordinate of a 1-based contig position.
    pub fn absolute_position(&self, contig: &str, position: u64) -> Option<u64> {
        self.offset(contig).map(|off| position + off - 1)
    }
}

/// Where a window id sits inside the window it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAnchor {
    /// `floor(pos / w) * w`
    Start,
    /// `floor(pos / w) * w + w / 2`
    Midpoint,
}

/// Assigns positions to fixed-width windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAssigner {
    size: u64,
    anchor: WindowAnchor,
}

impl WindowAssigner {
    pub fn new(size: u64, anchor: WindowAnchor) -> Result<Self> {
        if size == 0 {
            return Err(ScanError::config("window size", "0", "must be a positive integer"));
        }
        Ok(Self { size, anchor })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn anchor(&self) -> WindowAnchor {
        self.anchor
    }

    pub fn window_of(&self, position: u64) -> u64 {
        let start = (position / self.size) * self.size;
        match self.anchor {
            WindowAnchor::Start => start,
            WindowAnchor::Midpoint => start + self.size / 2,
        }
    }
}

/// Maps `(contig, position)` pairs to a coordinate and a window.
///
/// Without a reference index windows are computed on the contig-relative
/// position. With one, they are computed on the genome-wide coordinate and a
/// contig missing from the index yields null for both.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateMapper<'a> {
    index: Option<&'a ContigIndex>,
    windows: WindowAssigner,
}

impl<'a> CoordinateMapper<'a> {
    pub fn relative(windows: WindowAssigner) -> Self {
        Self { index: None, windows }
    }

    pub fn absolute(index: &'a ContigIndex, windows: WindowAssigner) -> Self {
        Self {
            index: Some(index),
            windows,
        }
    }

    /// Returns `(genome_position, window)`.
    pub fn map(&self, contig: &str, position: u64) -> (Option<u64>, Option<u64>) {
        let coordinate = match self.index {
            Some(index) => index.absolute_position(contig, position),
            None => Some(position),
        };
        (coordinate, coordinate.map(|c| self.windows.window_of(c)))
    }
}
