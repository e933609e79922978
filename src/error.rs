//! Error types returned by this crate.

use std::fmt;

/// The result type used throughout this crate.
pub type Result<T> = core::result::Result<T, DecodeError>;

/// Top-level error produced by any decoding operation.
#[derive(Debug)]
pub enum DecodeError {
    /// A positional read failed or returned fewer bytes than requested.
    Io(IoError),
    /// The container's framing (XML envelope, seektable, block-header table) is malformed.
    Format(FormatError),
    /// A codeblock payload could not be decompressed.
    Decompress(DecompressError),
    /// The block allocator could not satisfy an allocation.
    Oom(OomError),
    /// A caller-supplied argument is out of range.
    Arg(ArgError),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "{e}"),
            Self::Format(e) => write!(f, "{e}"),
            Self::Decompress(e) => write!(f, "{e}"),
            Self::Oom(e) => write!(f, "{e}"),
            Self::Arg(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Format(e) => Some(e),
            Self::Decompress(e) => Some(e),
            Self::Oom(e) => Some(e),
            Self::Arg(e) => Some(e),
        }
    }
}

/// I/O failures at the positional-file-reader boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoError {
    /// A read returned fewer bytes than requested.
    ShortRead {
        /// Offset the read started at.
        offset: u64,
        /// Number of bytes requested.
        requested: usize,
        /// Number of bytes actually returned.
        got: usize,
    },
    /// The underlying file could not be opened or seeked.
    Unavailable,
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortRead {
                offset,
                requested,
                got,
            } => write!(
                f,
                "short read at offset {offset}: requested {requested} bytes, got {got}"
            ),
            Self::Unavailable => write!(f, "underlying file is unavailable"),
        }
    }
}

impl std::error::Error for IoError {}

impl From<std::io::Error> for DecodeError {
    fn from(_: std::io::Error) -> Self {
        Self::Io(IoError::Unavailable)
    }
}

/// Container framing errors: XML envelope, seektable, block-header table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// No `0x04` byte was found while scanning for the end of the XML header.
    MissingXmlTerminator,
    /// The XML root element was not `DataObject ObjectType="DPUfsImport"`.
    UnexpectedRoot,
    /// A DICOM tag header did not match what was expected at this position.
    UnexpectedDicomTag {
        /// Tag group actually observed.
        group: u16,
        /// Tag element actually observed.
        element: u16,
    },
    /// A block-header record had a byte stride other than 48 or 80.
    BadBlockHeaderStride(usize),
    /// The XML document was not well-formed (unbalanced tags, bad attribute syntax).
    MalformedXml,
    /// A base64 payload failed to decode.
    BadBase64,
    /// Required metadata (dimensions, block size, levels) was absent.
    MissingAttribute(&'static str),
    /// An embedded label/macro JPEG could not be decoded.
    BadEmbeddedImage,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingXmlTerminator => write!(f, "no 0x04 terminator found in XML header"),
            Self::UnexpectedRoot => write!(f, "unexpected XML root element"),
            Self::UnexpectedDicomTag { group, element } => {
                write!(f, "unexpected DICOM tag 0x{group:04X}/0x{element:04X}")
            }
            Self::BadBlockHeaderStride(n) => {
                write!(f, "block header stride {n} is neither 48 nor 80")
            }
            Self::MalformedXml => write!(f, "malformed XML"),
            Self::BadBase64 => write!(f, "invalid base64 payload"),
            Self::MissingAttribute(name) => write!(f, "missing required attribute `{name}`"),
            Self::BadEmbeddedImage => write!(f, "embedded label/macro JPEG could not be decoded"),
        }
    }
}

impl std::error::Error for FormatError {}

impl From<FormatError> for DecodeError {
    fn from(value: FormatError) -> Self {
        Self::Format(value)
    }
}

/// Failures while decompressing a single codeblock payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompressError {
    /// The Huffman table was inconsistent (more leaves than codes permit).
    HuffmanTableOverrun,
    /// A bit sequence did not match any known Huffman code.
    HuffmanSymbolNotFound,
    /// The decoded byte count did not match the payload's declared serialized length.
    SerializedLengthMismatch {
        /// Expected length in bytes.
        expected: u32,
        /// Actual decoded length in bytes.
        actual: u32,
    },
    /// The decoded byte count exceeded the expected plane size.
    SerializedLengthExceedsExpected,
}

impl fmt::Display for DecompressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HuffmanTableOverrun => write!(f, "huffman table overrun while decoding tree"),
            Self::HuffmanSymbolNotFound => write!(f, "no huffman symbol matched the bitstream"),
            Self::SerializedLengthMismatch { expected, actual } => write!(
                f,
                "serialized length mismatch: expected {expected}, decoded {actual}"
            ),
            Self::SerializedLengthExceedsExpected => {
                write!(f, "serialized length exceeds the expected plane size")
            }
        }
    }
}

impl std::error::Error for DecompressError {}

impl From<DecompressError> for DecodeError {
    fn from(value: DecompressError) -> Self {
        Self::Decompress(value)
    }
}

/// The block allocator could not satisfy a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OomError {
    /// Both the free list and chunk growth were exhausted for the LL pool.
    LlPoolExhausted,
    /// Both the free list and chunk growth were exhausted for the H pool.
    HPoolExhausted,
}

impl fmt::Display for OomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LlPoolExhausted => write!(f, "LL block allocator exhausted"),
            Self::HPoolExhausted => write!(f, "H block allocator exhausted"),
        }
    }
}

impl std::error::Error for OomError {}

impl From<OomError> for DecodeError {
    fn from(value: OomError) -> Self {
        Self::Oom(value)
    }
}

/// An out-of-range argument supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgError {
    /// The requested scale is not a valid pyramid level.
    ScaleOutOfRange {
        /// Scale that was requested.
        scale: u32,
        /// Number of levels available.
        level_count: u32,
    },
    /// The requested tile coordinate is outside the level's tile grid.
    TileOutOfRange {
        /// Tile x coordinate requested.
        tx: u32,
        /// Tile y coordinate requested.
        ty: u32,
    },
}

impl fmt::Display for ArgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScaleOutOfRange { scale, level_count } => {
                write!(f, "scale {scale} is out of range (0..{level_count})")
            }
            Self::TileOutOfRange { tx, ty } => {
                write!(f, "tile ({tx}, {ty}) is outside the level's tile grid")
            }
        }
    }
}

impl std::error::Error for ArgError {}

impl From<ArgError> for DecodeError {
    fn from(value: ArgError) -> Self {
        Self::Arg(value)
    }
}

macro_rules! bail {
    ($err:expr) => {
        return Err(::core::convert::Into::into($err))
    };
}

macro_rules! err {
    ($err:expr) => {
        ::core::convert::Into::<$crate::error::DecodeError>::into($err)
    };
}

pub(crate) use bail;
pub(crate) use err;
