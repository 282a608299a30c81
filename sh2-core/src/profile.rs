//! Per-executable constants needed to locate and decode the index.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::format::DEFAULT_STRING_WINDOW;

/// Distance between consecutive table 2 records, and the amount a chunk's parent
/// address grows per nested sub-directory.
pub const DEFAULT_PARENT_STRIDE: u32 = 0x10;

/// How to get from the end of one table to the start of the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableGap {
    /// Step over zero words until the first non-zero one.
    Scan { max_steps: usize },
    /// Skip an exact number of bytes.
    Fixed { bytes: u32 },
}

impl Default for TableGap {
    fn default() -> Self {
        TableGap::Scan { max_steps: 32 }
    }
}

fn default_string_window() -> usize {
    DEFAULT_STRING_WINDOW
}

fn default_parent_stride() -> u32 {
    DEFAULT_PARENT_STRIDE
}

/// Everything that differs between builds of the game executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Absolute offset of table 1 inside the executable.
    pub data_offset: u32,
    /// Subtracted from every stored address to get an offset into the executable.
    pub magic_offset: u32,
    #[serde(default = "default_string_window")]
    pub max_string_len: usize,
    #[serde(default = "default_parent_stride")]
    pub parent_stride: u32,
    // tables last, TOML wants plain keys first
    #[serde(default)]
    pub gap_after_path_pairs: TableGap,
    #[serde(default)]
    pub gap_after_entries: TableGap,
}

impl VersionProfile {
    pub fn new(name: impl Into<String>, data_offset: u32, magic_offset: u32) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            data_offset,
            magic_offset,
            max_string_len: DEFAULT_STRING_WINDOW,
            parent_stride: DEFAULT_PARENT_STRIDE,
            gap_after_path_pairs: TableGap::default(),
            gap_after_entries: TableGap::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_gaps(mut self, after_path_pairs: TableGap, after_entries: TableGap) -> Self {
        self.gap_after_path_pairs = after_path_pairs;
        self.gap_after_entries = after_entries;
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let profile: Self = toml::from_str(s).context("invalid version profile")?;
        Ok(profile)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("unable to read profile {:?}", path))?;
        Self::from_toml_str(&text).with_context(|| format!("in {:?}", path))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// A retail, demo or prototype build whose executable hash is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownVersion {
    /// Uppercase hex SHA1 of the executable
    pub sha1: &'static str,
    pub file_name: &'static str,
    pub description: &'static str,
    pub data_offset: u32,
    pub magic_offset: u32,
}

impl KnownVersion {
    pub fn profile(&self) -> VersionProfile {
        VersionProfile::new(self.file_name, self.data_offset, self.magic_offset)
            .with_description(self.description)
    }
}

pub const KNOWN_VERSIONS: &[KnownVersion] = &[
    // NTSC
    KnownVersion {
        sha1: "3A27DEDDFA81CF30F46F0742C3523230CAC75D9A",
        file_name: "SLUS_202.28",
        description: "NTSC (Greatest Hits)",
        data_offset: 0x2CCF00,
        magic_offset: 0xFF800,
    },
    // PAL
    KnownVersion {
        sha1: "8BC367E1B9E7AA5CC5D5FA32048ED97F3FADE728",
        file_name: "SLES_503.82",
        description: "PAL (Special 2 Disc Set)",
        data_offset: 0x2BD400,
        magic_offset: 0xFF800,
    },
    KnownVersion {
        sha1: "2C5A7AFBA3A5B4507CCB828811C8ADD9E5D0E961",
        file_name: "SLES_511.56",
        description: "PAL (Director's Cut)",
        data_offset: 0x2CD980,
        magic_offset: 0xFF800,
    },
    // demos and prototypes
    KnownVersion {
        sha1: "50C664C525736619215654186446A5D6B211FB31",
        file_name: "SLPM_123.45",
        description: "NTSC (E3 2001)",
        data_offset: 0x45C200,
        magic_offset: 0xFFF80,
    },
    KnownVersion {
        sha1: "888EFF71606FF4C1C610E30111B3CA5DA647EDCC",
        file_name: "SLUS_202.28",
        description: "NTSC (2001-07-13 prototype)",
        data_offset: 0x29CD00,
        magic_offset: 0xFF900,
    },
    KnownVersion {
        sha1: "B9CB2E895FC83CD4452DC9A818BF3CA26394ADBE",
        file_name: "SLPM_610.09",
        description: "PAL (Trial Version)",
        data_offset: 0x2B3120,
        magic_offset: 0xFF900,
    },
];
