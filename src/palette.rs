/// Pseudo-color palettes for monochrome images
///
/// Each palette is a 256-entry RGB table indexed by the windowed 8-bit
/// intensity. Tables are generated once per type and shared for the rest of
/// the process.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaletteType {
    #[default]
    Grayscale,
    Inverted,
    Hot,
    Cool,
    Rainbow,
    Bone,
    Copper,
    Ocean,
}

impl PaletteType {
    pub const ALL: [PaletteType; 8] = [
        PaletteType::Grayscale,
        PaletteType::Inverted,
        PaletteType::Hot,
        PaletteType::Cool,
        PaletteType::Rainbow,
        PaletteType::Bone,
        PaletteType::Copper,
        PaletteType::Ocean,
    ];

    /// Human-readable name for menus and logs
    pub fn name(self) -> &'static str {
        match self {
            PaletteType::Grayscale => "Grayscale",
            PaletteType::Inverted => "Inverted",
            PaletteType::Hot => "Hot (Thermal)",
            PaletteType::Cool => "Cool",
            PaletteType::Rainbow => "Rainbow",
            PaletteType::Bone => "Bone",
            PaletteType::Copper => "Copper",
            PaletteType::Ocean => "Ocean",
        }
    }

    /// Look up by config key ("hot") or display name ("Hot (Thermal)")
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|kind| {
            kind.name().eq_ignore_ascii_case(name) || kind.key().eq_ignore_ascii_case(name)
        })
    }

    /// Lowercase key used in config files
    pub fn key(self) -> &'static str {
        match self {
            PaletteType::Grayscale => "grayscale",
            PaletteType::Inverted => "inverted",
            PaletteType::Hot => "hot",
            PaletteType::Cool => "cool",
            PaletteType::Rainbow => "rainbow",
            PaletteType::Bone => "bone",
            PaletteType::Copper => "copper",
            PaletteType::Ocean => "ocean",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for PaletteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 256 RGB triples, one per display intensity
#[derive(Clone, PartialEq, Eq)]
pub struct PaletteTable {
    kind: PaletteType,
    entries: [[u8; 3]; 256],
}

impl std::fmt::Debug for PaletteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaletteTable")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

static TABLES: [OnceLock<PaletteTable>; 8] = [const { OnceLock::new() }; 8];

impl PaletteTable {
    /// Cached table for `kind`, generated on first use
    pub fn for_type(kind: PaletteType) -> &'static PaletteTable {
        TABLES[kind.index()].get_or_init(|| Self::generate(kind))
    }

    /// Build a fresh table (bypasses the cache)
    pub fn generate(kind: PaletteType) -> Self {
        let mut entries = [[0u8; 3]; 256];
        for (i, entry) in entries.iter_mut().enumerate() {
            let t = i as f64 / 255.0;
            *entry = match kind {
                PaletteType::Grayscale => [i as u8; 3],
                PaletteType::Inverted => [(255 - i) as u8; 3],
                PaletteType::Hot => hot(t),
                PaletteType::Cool => [channel(t * 255.0), channel((1.0 - t) * 255.0), 255],
                PaletteType::Rainbow => rainbow(t),
                PaletteType::Bone => {
                    let rg = channel((t * 255.0 * 0.9 + t * t * 25.5).min(255.0));
                    [rg, rg, channel((t * 255.0).min(255.0))]
                }
                PaletteType::Copper => [
                    channel((t * 1.25 * 255.0).min(255.0)),
                    channel(t * 0.7812 * 255.0),
                    channel(t * 0.4975 * 255.0),
                ],
                PaletteType::Ocean => [
                    channel(t * t * 255.0),
                    channel(t * 255.0),
                    channel((0.4 + 0.6 * t) * 255.0),
                ],
            };
        }

        Self { kind, entries }
    }

    pub fn kind(&self) -> PaletteType {
        self.kind
    }

    #[inline]
    pub fn map(&self, level: u8) -> [u8; 3] {
        self.entries[level as usize]
    }

    pub fn entries(&self) -> &[[u8; 3]; 256] {
        &self.entries
    }

    /// Opaque RGBA texels for a 256x1 lookup texture
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.entries
            .iter()
            .flat_map(|&[r, g, b]| [r, g, b, 255])
            .collect()
    }
}

/// Truncate a channel value already in 0..=255
fn channel(value: f64) -> u8 {
    value as u8
}

// ========== Generators ==========

fn hot(t: f64) -> [u8; 3] {
    let r = if t < 0.375 { channel(t / 0.375 * 255.0) } else { 255 };
    let g = if t < 0.375 {
        0
    } else if t < 0.75 {
        channel((t - 0.375) / 0.375 * 255.0)
    } else {
        255
    };
    let b = if t < 0.75 { 0 } else { channel((t - 0.75) / 0.25 * 255.0) };
    [r, g, b]
}

/// Hue sweep from red (0°) to magenta (300°), full saturation and value
fn rainbow(t: f64) -> [u8; 3] {
    let hue = t * 300.0;
    let x = 1.0 - ((hue / 60.0) % 2.0 - 1.0).abs();

    let (r, g, b) = if hue < 60.0 {
        (1.0, x, 0.0)
    } else if hue < 120.0 {
        (x, 1.0, 0.0)
    } else if hue < 180.0 {
        (0.0, 1.0, x)
    } else if hue < 240.0 {
        (0.0, x, 1.0)
    } else {
        (x, 0.0, 1.0)
    };

    [channel(r * 255.0), channel(g * 255.0), channel(b * 255.0)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grayscale_and_inverted() {
        let gray = PaletteTable::for_type(PaletteType::Grayscale);
        let inverted = PaletteTable::for_type(PaletteType::Inverted);
        for i in 0..=255u8 {
            assert_eq!(gray.map(i), [i, i, i]);
            assert_eq!(inverted.map(i), [255 - i; 3]);
        }
    }

    #[test]
    fn test_tables_are_cached() {
        let a = PaletteTable::for_type(PaletteType::Hot);
        let b = PaletteTable::for_type(PaletteType::Hot);
        assert!(std::ptr::eq(a, b));
        assert_eq!(*a, PaletteTable::generate(PaletteType::Hot));
    }

    #[test]
    fn test_hot_endpoints() {
        let hot = PaletteTable::for_type(PaletteType::Hot);
        assert_eq!(hot.map(0), [0, 0, 0]);
        assert_eq!(hot.map(255), [255, 255, 255]);
        // Green and blue stay off through the red ramp
        let [r, g, b] = hot.map(95);
        assert!(r > 250);
        assert_eq!((g, b), (0, 0));
    }

    #[test]
    fn test_rainbow_runs_red_to_magenta() {
        let rainbow = PaletteTable::for_type(PaletteType::Rainbow);
        assert_eq!(rainbow.map(0), [255, 0, 0]);
        assert_eq!(rainbow.map(255), [255, 0, 255]);
    }

    #[test]
    fn test_fixed_formulas() {
        assert_eq!(PaletteTable::for_type(PaletteType::Cool).map(0), [0, 255, 255]);
        assert_eq!(PaletteTable::for_type(PaletteType::Bone).map(255), [255, 255, 255]);
        assert_eq!(PaletteTable::for_type(PaletteType::Copper).map(255), [255, 199, 126]);
        assert_eq!(PaletteTable::for_type(PaletteType::Ocean).map(0), [0, 0, 102]);
    }

    #[test]
    fn test_rgba_packing() {
        let bytes = PaletteTable::for_type(PaletteType::Ocean).to_rgba_bytes();
        assert_eq!(bytes.len(), 1024);
        assert_eq!(&bytes[0..4], &[0, 0, 102, 255]);
    }

    #[test]
    fn test_names() {
        assert_eq!(PaletteType::ALL.len(), 8);
        assert_eq!(PaletteType::Hot.name(), "Hot (Thermal)");
        assert_eq!(PaletteType::default(), PaletteType::Grayscale);
        for kind in PaletteType::ALL {
            assert_eq!(serde_json::to_string(&kind).unwrap(), format!("\"{}\"", kind.key()));
        }
        assert_eq!(PaletteType::from_name("HOT"), Some(PaletteType::Hot));
        assert_eq!(PaletteType::from_name("hot (thermal)"), Some(PaletteType::Hot));
        assert_eq!(PaletteType::from_name("viridis"), None);
    }
}
