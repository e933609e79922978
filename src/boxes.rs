//! DICOM-style `(group, element)` tag constants recognised by the metadata parser.
//!
//! A flattened DICOM attribute model identifies every value by a `(group, element)`
//! pair instead of a name; the XML envelope carries both the human-readable `Name` and
//! these numeric identifiers on every `<Attribute>` node. Only a small fixed set is
//! material to decoding (§4.5 of the design notes) — everything else is read and
//! discarded.

/// A `(group, element)` pair identifying one DICOM-style attribute.
pub type Tag = (u16, u16);

/// `PIM_DP_IMAGE_TYPE`: distinguishes `WSI` / `LABELIMAGE` / `MACROIMAGE`.
pub const IMAGE_TYPE: Tag = (0x301D, 0x1004);
/// `DICOM_PIXEL_SPACING`: micrometre-per-pixel pair at the full-resolution level.
pub const PIXEL_SPACING: Tag = (0x0028, 0x0030);
/// `DICOM_ICCPROFILE`: raw (not base64) ICC colour profile bytes (§1 non-goal: parsed
/// but not applied).
pub const ICC_PROFILE: Tag = (0x0028, 0x2000);
/// `PIIM_PIXEL_DATA_REPRESENTATION_NUMBER`: the scale this dimension range describes.
pub const PIXEL_DATA_REPRESENTATION_NUMBER: Tag = (0x301D, 0x1007);
/// `DICOM_DIMENSION_RANGE`: `{size, increment}` pairs for one pyramid level.
pub const DIMENSION_RANGE: Tag = (0x301D, 0x1012);
/// Block width, shared by all templates in the file.
pub const BLOCK_WIDTH: Tag = (0x301D, 0x2010);
/// Block height companion tag to [`BLOCK_WIDTH`].
pub const BLOCK_HEIGHT: Tag = (0x301D, 0x2011);
/// The base64 block-header table payload.
pub const BLOCK_HEADER_TABLE: Tag = (0x301D, 0x2009);
/// DICOM sequence element wrapping the seektable on-disk.
pub const SEEKTABLE_SEQUENCE: Tag = (0x301D, 0x2015);
/// Per-entry tag inside the binary seektable region.
pub const SEEKTABLE_ENTRY: Tag = (0x301D, 0x2010);
/// Embedded base64 JPEG for the LABEL/MACRO images.
pub const SCANNED_IMAGE: Tag = (0x301D, 0x1013);

/// Object-type bit recorded on a `DataObject` frame, used to route ambiguous
/// numeric attributes like `DimensionRange` that appear inside more than one
/// container shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectTypeTag {
    /// `DPUfsImport`: the document root.
    UfsImport,
    /// `DPScannedImage`: one `Image` (WSI, LABEL, or MACRO).
    ScannedImage,
    /// `PixelDataRepresentation`: one pyramid level's dimension range.
    PixelDataRepresentation,
    /// Header template entry.
    HeaderTemplate,
    /// Any other/unknown object type; its attributes are still read but not
    /// specially routed.
    Other,
}

impl ObjectTypeTag {
    /// Maps an `ObjectType="…"` string to its tag, defaulting to [`Self::Other`].
    pub fn from_str(s: &str) -> Self {
        match s {
            "DPUfsImport" => Self::UfsImport,
            "DPScannedImage" => Self::ScannedImage,
            "PixelDataRepresentation" => Self::PixelDataRepresentation,
            "WaveletQuantizerSeq" => Self::HeaderTemplate,
            _ => Self::Other,
        }
    }
}

/// The sentinel byte separating the XML header from the binary seektable.
pub const XML_TERMINATOR: u8 = 0x04;

/// Root element name expected at the top of the XML envelope.
pub const ROOT_ELEMENT: &str = "DataObject";
/// `ObjectType` attribute value expected on the root element.
pub const ROOT_OBJECT_TYPE: &str = "DPUfsImport";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_type_round_trips_known_values() {
        assert_eq!(
            ObjectTypeTag::from_str("DPScannedImage"),
            ObjectTypeTag::ScannedImage
        );
        assert_eq!(ObjectTypeTag::from_str("nonsense"), ObjectTypeTag::Other);
    }
}
