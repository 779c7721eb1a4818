#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Frame header truncated at offset {offset}: {available} of 4 bytes available")]
    Truncated { offset: usize, available: usize },

    #[error("Invalid syncword at offset {offset}. Read {value:#04X}, expected 0x9C")]
    InvalidSyncword { offset: usize, value: u8 },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CursorError {
    #[error("Cursor advance of {requested} bytes exceeds the {remaining} bytes remaining")]
    OutOfBounds { requested: usize, remaining: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error("Frame length {length} is invalid with {available} bytes remaining")]
    InvalidFrameLength { length: usize, available: usize },

    #[error("bitpool must be between 2 and {max}. Read {bitpool}")]
    BitpoolOutOfRange { bitpool: u8, max: u32 },

    #[error(
        "Frame geometry changed mid-stream: expected {expected_channels}ch/{expected_subbands}sb, found {channels}ch/{subbands}sb"
    )]
    GeometryMismatch {
        expected_channels: usize,
        expected_subbands: usize,
        channels: usize,
        subbands: usize,
    },

    #[error("Unsupported decoder geometry: {channels} channels, {subbands} subbands")]
    UnsupportedGeometry { channels: usize, subbands: usize },

    #[error("Decoder used before reset")]
    NotReset,

    #[error("Bitstream read failed: {0}")]
    Bitstream(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Input truncated: read {read} of {expected} bytes")]
    TruncatedFile { expected: u64, read: u64 },

    #[error("No SBC syncword (0x9C) found in the stream")]
    NoSyncFound,
}
