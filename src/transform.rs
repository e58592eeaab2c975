/// Window/level transform: raw sample value -> 8-bit display intensity
///
/// The mapping is evaluated in two places: `WindowLevelTable` on the CPU
/// path and the fragment shader on the GPU path. Both derive `lower`,
/// `upper` and `scale` once in f32, compare with `<=`/`>=`, and truncate
/// `(v - lower) * scale`. Keep them in sync.

use crate::sample::BitDepth;
use crate::state::window::WindowLevel;

/// Inclusive range of raw values a buffer can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueDomain {
    pub min: i32,
    pub max: i32,
}

impl ValueDomain {
    pub const U8: ValueDomain = ValueDomain { min: 0, max: 255 };
    pub const U16: ValueDomain = ValueDomain { min: 0, max: 65535 };
    pub const I16: ValueDomain = ValueDomain { min: -32768, max: 32767 };

    /// 8-bit samples are always read unsigned
    pub fn for_format(bit_depth: BitDepth, signed: bool) -> Self {
        match (bit_depth, signed) {
            (BitDepth::Eight, _) => Self::U8,
            (BitDepth::Sixteen, false) => Self::U16,
            (BitDepth::Sixteen, true) => Self::I16,
        }
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        (self.max as i64 - self.min as i64 + 1) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowLevelTransform {
    lower: f32,
    upper: f32,
    scale: f32,
    degenerate: bool,
    invert: bool,
    domain: ValueDomain,
}

impl WindowLevelTransform {
    pub fn new(window: &WindowLevel, domain: ValueDomain, invert: bool) -> Self {
        let degenerate = window.is_degenerate();
        let scale = if degenerate { 0.0 } else { 255.0 / window.width };

        Self {
            lower: window.lower() as f32,
            upper: window.upper() as f32,
            scale: scale as f32,
            degenerate,
            invert,
            domain,
        }
    }

    pub fn lower(&self) -> f32 {
        self.lower
    }

    pub fn upper(&self) -> f32 {
        self.upper
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    pub fn inverts(&self) -> bool {
        self.invert
    }

    pub fn domain(&self) -> ValueDomain {
        self.domain
    }

    /// Display intensity for one raw value
    ///
    /// A degenerate window maps everything to 0, inverted or not.
    pub fn map(&self, raw: i32) -> u8 {
        if self.degenerate {
            return 0;
        }

        let v = raw as f32;
        let level = if v <= self.lower {
            0
        } else if v >= self.upper {
            255
        } else {
            (((v - self.lower) * self.scale) as u32).min(255) as u8
        };

        if self.invert {
            255 - level
        } else {
            level
        }
    }

    /// Precompute `map` for every value in the domain
    pub fn build_table(&self) -> WindowLevelTable {
        let entries = (self.domain.min..=self.domain.max)
            .map(|raw| self.map(raw))
            .collect();

        WindowLevelTable {
            min: self.domain.min,
            entries,
        }
    }
}

/// Lookup table indexed by `raw - domain.min`
#[derive(Debug, Clone, PartialEq)]
pub struct WindowLevelTable {
    min: i32,
    entries: Vec<u8>,
}

impl WindowLevelTable {
    /// Values outside the domain clamp to its edges
    #[inline]
    pub fn get(&self, raw: i32) -> u8 {
        let last = self.entries.len() as i64 - 1;
        let index = (raw as i64 - self.min as i64).clamp(0, last);
        self.entries[index as usize]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.entries
    }
}
