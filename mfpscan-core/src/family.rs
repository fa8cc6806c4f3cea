//! Device families
//!
//! A family is a group of firmware generations sharing one command grammar
//! and one scan-data framing. Families differ only in the constants held by
//! [`FamilyProfile`]; everything else is shared code.

use std::fmt;

use crate::constants::block_type;

/// Supported device generations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceFamily {
    Family2,
    Family3,
    #[default]
    Family4,
    Family5,
}

/// Per-family constants
#[derive(Debug, PartialEq, Eq)]
pub struct FamilyProfile {
    pub name: &'static str,

    /// Offset of the little-endian u16 payload length in a data header.
    /// The header ends right after it.
    pub length_offset: usize,

    /// Bytes consumed by a sentinel block
    pub sentinel_len: usize,

    /// Data-carrying block types this family emits
    pub data_types: &'static [u8],

    /// Sentinel block types this family emits
    pub sentinel_types: &'static [u8],

    /// Accepts `D=DUP` in the main parameter block
    pub duplex: bool,

    /// Can be asked for JPEG-compressed color
    pub jpeg: bool,
}

const COMMON_SENTINELS: &[u8] = &[
    block_type::END_OF_DATA,
    block_type::END_OF_FRAME,
    block_type::END_OF_FRAME_LAST,
    block_type::CANCEL_ACK,
    block_type::NO_DOCUMENTS,
    block_type::PAPER_JAM,
];

const FULL_SENTINELS: &[u8] = &[
    block_type::END_OF_DATA,
    block_type::END_OF_FRAME,
    block_type::END_OF_FRAME_LAST,
    block_type::CANCEL_ACK,
    block_type::NO_DOCUMENTS,
    block_type::PAPER_JAM,
    block_type::COVER_OPEN,
];

static FAMILY2: FamilyProfile = FamilyProfile {
    name: "family 2",
    length_offset: 1,
    sentinel_len: 1,
    data_types: &[
        block_type::GRAY_RAW,
        block_type::GRAY_RLENGTH,
        block_type::COLOR_RGB,
    ],
    sentinel_types: COMMON_SENTINELS,
    duplex: false,
    jpeg: false,
};

static FAMILY3: FamilyProfile = FamilyProfile {
    name: "family 3",
    length_offset: 1,
    sentinel_len: 1,
    data_types: &[
        block_type::GRAY_RAW,
        block_type::GRAY_RLENGTH,
        block_type::COLOR_YCBCR,
    ],
    sentinel_types: COMMON_SENTINELS,
    duplex: false,
    jpeg: false,
};

static FAMILY4: FamilyProfile = FamilyProfile {
    name: "family 4",
    length_offset: 10,
    sentinel_len: 1,
    data_types: &[
        block_type::GRAY_RAW,
        block_type::GRAY_RLENGTH,
        block_type::COLOR_RGB,
        block_type::COLOR_JPEG,
    ],
    sentinel_types: FULL_SENTINELS,
    duplex: true,
    jpeg: true,
};

static FAMILY5: FamilyProfile = FamilyProfile {
    name: "family 5",
    length_offset: 8,
    sentinel_len: 1,
    data_types: &[
        block_type::GRAY_RAW,
        block_type::GRAY_RLENGTH,
        block_type::COLOR_YCBCR,
        block_type::COLOR_JPEG,
    ],
    sentinel_types: FULL_SENTINELS,
    duplex: true,
    jpeg: true,
};

impl DeviceFamily {
    pub const ALL: [DeviceFamily; 4] = [
        Self::Family2,
        Self::Family3,
        Self::Family4,
        Self::Family5,
    ];

    pub fn profile(self) -> &'static FamilyProfile {
        match self {
            Self::Family2 => &FAMILY2,
            Self::Family3 => &FAMILY3,
            Self::Family4 => &FAMILY4,
            Self::Family5 => &FAMILY5,
        }
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile().name)
    }
}

impl FamilyProfile {
    /// Full size of a data block header
    pub fn header_len(&self) -> usize {
        self.length_offset + 2
    }

    pub fn emits_data(&self, tag: u8) -> bool {
        self.data_types.contains(&tag)
    }

    pub fn emits_sentinel(&self, tag: u8) -> bool {
        self.sentinel_types.contains(&tag)
    }
}
