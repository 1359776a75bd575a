/// Physical orientation reported by the device's motion sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceOrientation {
    #[default]
    Unknown,
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
}

/// EXIF/TIFF orientation tag. The name reads as "where row 0 sits, where column 0 sits".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ExifOrientation {
    #[default]
    TopLeft = 1,
    TopRight = 2,
    BottomRight = 3,
    BottomLeft = 4,
    LeftTop = 5,
    RightTop = 6,
    RightBottom = 7,
    LeftBottom = 8,
}

impl ExifOrientation {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Orientation of a back-camera sensor buffer for the given device pose.
/// Depends on the pose only, never on the frame size.
pub fn exif_orientation_for(device: DeviceOrientation) -> ExifOrientation {
    match device {
        DeviceOrientation::PortraitUpsideDown => ExifOrientation::LeftBottom,
        DeviceOrientation::LandscapeLeft => ExifOrientation::TopLeft,
        DeviceOrientation::LandscapeRight => ExifOrientation::BottomRight,
        DeviceOrientation::Portrait
        | DeviceOrientation::Unknown
        | DeviceOrientation::FaceUp
        | DeviceOrientation::FaceDown => ExifOrientation::RightTop,
    }
}
