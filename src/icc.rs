//! ICC colour profile parsing (§1 non-goal: "ICC profiles are parsed but not
//! applied"). The metadata parser surfaces a profile's declared colour space for
//! diagnostics; no colour management is performed against it.

/// The colour space an ICC profile declares via its signature field.
#[derive(Clone, Hash, Debug, Eq, PartialEq)]
pub(crate) enum IccColorSpace {
    Xyz,
    Lab,
    Luv,
    Ycbr,
    Yxy,
    Lms,
    Rgb,
    Gray,
    Hsv,
    Hls,
    Cmyk,
    Cmy,
    OneClr,
    ThreeClr,
    FourClr,
    // There are more, but those should be the most important
    // ones.
}

impl IccColorSpace {
    /// Short human-readable name, for diagnostics.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            IccColorSpace::Xyz => "XYZ",
            IccColorSpace::Lab => "Lab",
            IccColorSpace::Luv => "Luv",
            IccColorSpace::Ycbr => "YCbr",
            IccColorSpace::Yxy => "Yxy",
            IccColorSpace::Lms => "LMS",
            IccColorSpace::Rgb => "RGB",
            IccColorSpace::Gray => "Gray",
            IccColorSpace::Hsv => "HSV",
            IccColorSpace::Hls => "HLS",
            IccColorSpace::Cmyk => "CMYK",
            IccColorSpace::Cmy => "CMY",
            IccColorSpace::OneClr => "1-channel",
            IccColorSpace::ThreeClr => "3-channel",
            IccColorSpace::FourClr => "4-channel",
        }
    }

    pub(crate) fn num_components(&self) -> u8 {
        match self {
            IccColorSpace::Xyz => 3,
            IccColorSpace::Lab => 3,
            IccColorSpace::Luv => 3,
            IccColorSpace::Ycbr => 3,
            IccColorSpace::Yxy => 3,
            IccColorSpace::Lms => 3,
            IccColorSpace::Rgb => 3,
            IccColorSpace::Gray => 1,
            IccColorSpace::Hsv => 3,
            IccColorSpace::Hls => 3,
            IccColorSpace::Cmyk => 4,
            IccColorSpace::Cmy => 3,
            IccColorSpace::OneClr => 1,
            IccColorSpace::ThreeClr => 3,
            IccColorSpace::FourClr => 4,
        }
    }
}

impl TryFrom<u32> for IccColorSpace {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x58595A20 => Ok(IccColorSpace::Xyz),
            0x4C616220 => Ok(IccColorSpace::Lab),
            0x4C757620 => Ok(IccColorSpace::Luv),
            0x59436272 => Ok(IccColorSpace::Ycbr),
            0x59787920 => Ok(IccColorSpace::Yxy),
            0x4C4D5320 => Ok(IccColorSpace::Lms),
            0x52474220 => Ok(IccColorSpace::Rgb),
            0x47524159 => Ok(IccColorSpace::Gray),
            0x48535620 => Ok(IccColorSpace::Hsv),
            0x484C5320 => Ok(IccColorSpace::Hls),
            0x434D594B => Ok(IccColorSpace::Cmyk),
            0x434D5920 => Ok(IccColorSpace::Cmy),
            0x31434C52 => Ok(IccColorSpace::OneClr),
            0x33434C52 => Ok(IccColorSpace::ThreeClr),
            0x34434C52 => Ok(IccColorSpace::FourClr),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Hash, Debug, Eq, PartialEq)]
pub(crate) struct IccMetadata {
    pub(crate) color_space: IccColorSpace,
}

impl IccMetadata {
    pub(crate) fn from_data(data: &[u8]) -> Option<Self> {
        let color_space = {
            let marker = u32::from_be_bytes(data.get(16..20)?.try_into().ok()?);
            IccColorSpace::try_from(marker).ok()?
        };

        Some(Self { color_space })
    }
}
