//! The tagged union that rides every edge in the graph for one run.

use serde::{Deserialize, Serialize};

/// Closed set of data kinds a socket can declare or a value can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowDataKind {
    Invalid,
    Image,
    ImageMono,
    ImageRgb,
    Array,
    Keypoints,
    Matches,
    DeviceImage,
    DeviceImageMono,
    DeviceImageRgb,
    DeviceArray,
}

impl FlowDataKind {
    /// Lowercase spelling used by the serializer's socket `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowDataKind::Invalid => "invalid",
            FlowDataKind::Image => "image",
            FlowDataKind::ImageMono => "imageMono",
            FlowDataKind::ImageRgb => "imageRgb",
            FlowDataKind::Array => "array",
            FlowDataKind::Keypoints => "keypoints",
            FlowDataKind::Matches => "matches",
            FlowDataKind::DeviceImage => "deviceImage",
            FlowDataKind::DeviceImageMono => "deviceImageMono",
            FlowDataKind::DeviceImageRgb => "deviceImageRgb",
            FlowDataKind::DeviceArray => "deviceArray",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "invalid" => FlowDataKind::Invalid,
            "image" => FlowDataKind::Image,
            "imageMono" => FlowDataKind::ImageMono,
            "imageRgb" => FlowDataKind::ImageRgb,
            "array" => FlowDataKind::Array,
            "keypoints" => FlowDataKind::Keypoints,
            "matches" => FlowDataKind::Matches,
            "deviceImage" => FlowDataKind::DeviceImage,
            "deviceImageMono" => FlowDataKind::DeviceImageMono,
            "deviceImageRgb" => FlowDataKind::DeviceImageRgb,
            "deviceArray" => FlowDataKind::DeviceArray,
            _ => return None,
        })
    }
}

/// A 2D image buffer with an explicit channel count, the value backing the
/// `Image`/`ImageMono`/`ImageRgb` kinds. The channel count is what drives
/// the `isConvertible` rules in [`FlowData::is_convertible`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub data: Vec<u8>,
}

impl ImageBuffer {
    pub fn new(width: u32, height: u32, channels: u8) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0u8; width as usize * height as usize * channels as usize],
        }
    }
}

/// A device-resident (GPU) buffer, the value backing the `DeviceImage*`
/// kinds. `bytes_per_element` drives the device-side convertibility rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceImageBuffer {
    pub width: u32,
    pub height: u32,
    pub bytes_per_element: u8,
    pub handle: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub angle: f32,
    pub response: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub query_idx: u32,
    pub train_idx: u32,
    pub distance: f32,
}

/// The value that travels one edge for one execution.
///
/// This is a closed sum type: the only cross-arm coercion permitted is the
/// convertibility matrix in [`FlowData::is_convertible`], which governs
/// whether a socket declared as one kind may legally read a value actually
/// stored as a different (but related) kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlowData {
    Invalid,
    Image(ImageBuffer),
    Array(Vec<f64>),
    Keypoints(Vec<Keypoint>),
    Matches(Vec<Match>),
    DeviceImage(DeviceImageBuffer),
    DeviceArray(Vec<u8>),
}

impl Default for FlowData {
    fn default() -> Self {
        FlowData::Invalid
    }
}

impl FlowData {
    pub fn kind(&self) -> FlowDataKind {
        match self {
            FlowData::Invalid => FlowDataKind::Invalid,
            FlowData::Image(img) => match img.channels {
                1 => FlowDataKind::ImageMono,
                3 => FlowDataKind::ImageRgb,
                _ => FlowDataKind::Image,
            },
            FlowData::Array(_) => FlowDataKind::Array,
            FlowData::Keypoints(_) => FlowDataKind::Keypoints,
            FlowData::Matches(_) => FlowDataKind::Matches,
            FlowData::DeviceImage(img) => match img.bytes_per_element {
                1 => FlowDataKind::DeviceImageMono,
                4 => FlowDataKind::DeviceImageRgb,
                _ => FlowDataKind::DeviceImage,
            },
            FlowData::DeviceArray(_) => FlowDataKind::DeviceArray,
        }
    }

    /// `from → to` per §3.2: reflexive; Image <-> ImageMono keyed on 1
    /// channel; Image <-> ImageRgb keyed on 3 channels; the analogous
    /// device-side rules keyed on bytes-per-element 1/4; everything else
    /// is not convertible.
    pub fn is_convertible(&self, to: FlowDataKind) -> bool {
        let from = self.kind();
        if from == to {
            return true;
        }
        match (from, to) {
            (FlowDataKind::Image, FlowDataKind::ImageMono)
            | (FlowDataKind::ImageMono, FlowDataKind::Image) => self.channels() == Some(1),
            (FlowDataKind::Image, FlowDataKind::ImageRgb)
            | (FlowDataKind::ImageRgb, FlowDataKind::Image) => self.channels() == Some(3),
            (FlowDataKind::DeviceImage, FlowDataKind::DeviceImageMono)
            | (FlowDataKind::DeviceImageMono, FlowDataKind::DeviceImage) => {
                self.bytes_per_element() == Some(1)
            }
            (FlowDataKind::DeviceImage, FlowDataKind::DeviceImageRgb)
            | (FlowDataKind::DeviceImageRgb, FlowDataKind::DeviceImage) => {
                self.bytes_per_element() == Some(4)
            }
            _ => false,
        }
    }

    fn channels(&self) -> Option<u8> {
        match self {
            FlowData::Image(img) => Some(img.channels),
            _ => None,
        }
    }

    fn bytes_per_element(&self) -> Option<u8> {
        match self {
            FlowData::DeviceImage(img) => Some(img.bytes_per_element),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            FlowDataKind::Invalid,
            FlowDataKind::Image,
            FlowDataKind::ImageMono,
            FlowDataKind::ImageRgb,
            FlowDataKind::Array,
            FlowDataKind::Keypoints,
            FlowDataKind::Matches,
            FlowDataKind::DeviceImage,
            FlowDataKind::DeviceImageMono,
            FlowDataKind::DeviceImageRgb,
            FlowDataKind::DeviceArray,
        ] {
            assert_eq!(FlowDataKind::from_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn mono_image_converts_to_image_and_back() {
        let mono = FlowData::Image(ImageBuffer::new(4, 4, 1));
        assert_eq!(mono.kind(), FlowDataKind::ImageMono);
        assert!(mono.is_convertible(FlowDataKind::Image));
        assert!(!mono.is_convertible(FlowDataKind::ImageRgb));
    }

    #[test]
    fn rgb_image_converts_to_image_and_back() {
        let rgb = FlowData::Image(ImageBuffer::new(4, 4, 3));
        assert_eq!(rgb.kind(), FlowDataKind::ImageRgb);
        assert!(rgb.is_convertible(FlowDataKind::Image));
        assert!(!rgb.is_convertible(FlowDataKind::ImageMono));
    }

    #[test]
    fn unrelated_kinds_are_not_convertible() {
        let arr = FlowData::Array(vec![1.0, 2.0]);
        assert!(!arr.is_convertible(FlowDataKind::Keypoints));
        assert!(arr.is_convertible(FlowDataKind::Array));
    }

    #[test]
    fn device_image_convertibility_keyed_on_bytes_per_element() {
        let mono = FlowData::DeviceImage(DeviceImageBuffer {
            width: 8,
            height: 8,
            bytes_per_element: 1,
            handle: 0,
        });
        assert_eq!(mono.kind(), FlowDataKind::DeviceImageMono);
        assert!(mono.is_convertible(FlowDataKind::DeviceImage));
        assert!(!mono.is_convertible(FlowDataKind::DeviceImageRgb));

        let rgba = FlowData::DeviceImage(DeviceImageBuffer {
            width: 8,
            height: 8,
            bytes_per_element: 4,
            handle: 0,
        });
        assert_eq!(rgba.kind(), FlowDataKind::DeviceImageRgb);
        assert!(rgba.is_convertible(FlowDataKind::DeviceImage));
    }

    #[test]
    fn invalid_is_only_self_convertible() {
        assert!(FlowData::Invalid.is_convertible(FlowDataKind::Invalid));
        assert!(!FlowData::Invalid.is_convertible(FlowDataKind::Image));
    }
}
