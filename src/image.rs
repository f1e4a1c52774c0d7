//! Pixel data artifacts passed between sockets and plugs.

use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell};
use std::fmt;

/// Sample data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DataType {
    U8 = 0,
    U16,
    U32,
    Half,
    Float,
    Double,
}

impl DataType {
    pub const ALL: [DataType; 6] = [
        DataType::U8,
        DataType::U16,
        DataType::U32,
        DataType::Half,
        DataType::Float,
        DataType::Double,
    ];

    pub fn from_bits(bits: u32) -> Option<Self> {
        Self::ALL.get(bits as usize).copied()
    }

    pub fn byte_size(self) -> usize {
        match self {
            DataType::U8 => 1,
            DataType::U16 | DataType::Half => 2,
            DataType::U32 | DataType::Float => 4,
            DataType::Double => 8,
        }
    }
}

/// Semantic role of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    #[default]
    Undefined,
    Other,
    Lightness,
    Color,
    ColorLightness,
    ColorLightnessPremultiplied,
    Depth,
    Alpha1,
    Alpha2,
    Alpha3,
    U,
    V,
}

/// Pixel layout packed into a `u32`.
///
/// | bits  | field        |
/// |-------|--------------|
/// | 0-15  | channels     |
/// | 16-23 | color offset |
/// | 24-27 | data type    |
/// | 28    | swap         |
/// | 29    | planar       |
/// | 30    | revert       |
/// | 31    | byte swap    |
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelLayout(pub u32);

impl PixelLayout {
    const CHANNELS_MASK: u32 = 0xFFFF;
    const OFFSET_SHIFT: u32 = 16;
    const OFFSET_MASK: u32 = 0xFF;
    const TYPE_SHIFT: u32 = 24;
    const TYPE_MASK: u32 = 0x0F;
    const SWAP: u32 = 1 << 28;
    const PLANAR: u32 = 1 << 29;
    const REVERT: u32 = 1 << 30;
    const BYTE_SWAP: u32 = 1 << 31;

    pub fn new(data_type: DataType, channels: u16) -> Self {
        Self(((data_type as u32 & Self::TYPE_MASK) << Self::TYPE_SHIFT) | channels as u32)
    }

    pub fn with_color_offset(self, offset: u8) -> Self {
        let cleared = self.0 & !(Self::OFFSET_MASK << Self::OFFSET_SHIFT);
        Self(cleared | ((offset as u32) << Self::OFFSET_SHIFT))
    }

    pub fn with_planar(self, on: bool) -> Self {
        self.with_flag(Self::PLANAR, on)
    }

    pub fn with_swap(self, on: bool) -> Self {
        self.with_flag(Self::SWAP, on)
    }

    pub fn with_byte_swap(self, on: bool) -> Self {
        self.with_flag(Self::BYTE_SWAP, on)
    }

    pub fn with_revert(self, on: bool) -> Self {
        self.with_flag(Self::REVERT, on)
    }

    fn with_flag(self, flag: u32, on: bool) -> Self {
        if on {
            Self(self.0 | flag)
        } else {
            Self(self.0 & !flag)
        }
    }

    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// A zero layout defers all capability checks.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn channels(self) -> u16 {
        (self.0 & Self::CHANNELS_MASK) as u16
    }

    #[inline]
    pub fn color_offset(self) -> u8 {
        ((self.0 >> Self::OFFSET_SHIFT) & Self::OFFSET_MASK) as u8
    }

    pub fn data_type(self) -> Option<DataType> {
        DataType::from_bits((self.0 >> Self::TYPE_SHIFT) & Self::TYPE_MASK)
    }

    #[inline]
    pub fn is_planar(self) -> bool {
        self.0 & Self::PLANAR != 0
    }

    #[inline]
    pub fn is_swapped(self) -> bool {
        self.0 & Self::SWAP != 0
    }

    #[inline]
    pub fn is_byte_swapped(self) -> bool {
        self.0 & Self::BYTE_SWAP != 0
    }

    #[inline]
    pub fn is_reverted(self) -> bool {
        self.0 & Self::REVERT != 0
    }
}

impl fmt::Debug for PixelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelLayout")
            .field("channels", &self.channels())
            .field("color_offset", &self.color_offset())
            .field("data_type", &self.data_type())
            .field("planar", &self.is_planar())
            .field("swap", &self.is_swapped())
            .field("byte_swap", &self.is_byte_swapped())
            .field("revert", &self.is_reverted())
            .finish()
    }
}

/// Rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// An image: geometry, layout and interleaved `f64` samples.
///
/// Samples sit behind a `RefCell` so that a shared `Rc<Image>` can be
/// written by the node that produces it.
pub struct Image {
    width: u32,
    height: u32,
    layout: PixelLayout,
    color_channels: u16,
    channel_types: Vec<ChannelType>,
    subpixel: bool,
    profile: Option<String>,
    samples: RefCell<Vec<f64>>,
}

impl Image {
    /// A zero filled image. Leading channels are color, the rest alpha.
    pub fn new(width: u32, height: u32, layout: PixelLayout) -> Self {
        let channels = layout.channels();
        let color_channels = channels.min(3);
        let channel_types = (0..channels)
            .map(|i| {
                if i < color_channels {
                    ChannelType::Color
                } else {
                    ChannelType::Alpha1
                }
            })
            .collect();
        let len = width as usize * height as usize * channels as usize;
        Self {
            width,
            height,
            layout,
            color_channels,
            channel_types,
            subpixel: false,
            profile: None,
            samples: RefCell::new(vec![0.0; len]),
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_color_channels(mut self, count: u16) -> Self {
        self.color_channels = count;
        self
    }

    pub fn with_channel_types(mut self, types: Vec<ChannelType>) -> Self {
        self.channel_types = types;
        self
    }

    pub fn with_subpixel(mut self, on: bool) -> Self {
        self.subpixel = on;
        self
    }

    /// Replace the samples. Short input is zero padded, long input truncated.
    pub fn with_samples(self, mut samples: Vec<f64>) -> Self {
        samples.resize(self.sample_count(), 0.0);
        *self.samples.borrow_mut() = samples;
        self
    }

    /// Same geometry and profile with a different layout, zero filled.
    pub fn reshaped(&self, layout: PixelLayout) -> Self {
        let mut image = Image::new(self.width, self.height, layout);
        image.profile = self.profile.clone();
        image
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn channels(&self) -> u16 {
        self.layout.channels()
    }

    pub fn color_channels(&self) -> u16 {
        self.color_channels
    }

    pub fn channel_types(&self) -> &[ChannelType] {
        &self.channel_types
    }

    pub fn subpixel(&self) -> bool {
        self.subpixel
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn sample_count(&self) -> usize {
        self.width as usize * self.height as usize * self.channels() as usize
    }

    pub fn samples(&self) -> Ref<'_, Vec<f64>> {
        self.samples.borrow()
    }

    /// Clamp `rect` to the image bounds.
    pub fn clamp_rect(&self, rect: PixelRect) -> PixelRect {
        let x = rect.x.min(self.width);
        let y = rect.y.min(self.height);
        PixelRect {
            x,
            y,
            width: rect.width.min(self.width - x),
            height: rect.height.min(self.height - y),
        }
    }

    /// Copy the samples inside `rect`, row by row.
    pub fn read_rect(&self, rect: PixelRect) -> Vec<f64> {
        let rect = self.clamp_rect(rect);
        let channels = self.channels() as usize;
        let samples = self.samples.borrow();
        let mut out = Vec::with_capacity(rect.width as usize * rect.height as usize * channels);
        for row in rect.y..rect.y + rect.height {
            let start = (row as usize * self.width as usize + rect.x as usize) * channels;
            let end = start + rect.width as usize * channels;
            out.extend_from_slice(&samples[start..end]);
        }
        out
    }

    /// Write `data` into `rect`, row by row. Returns the samples written.
    pub fn write_rect(&self, rect: PixelRect, data: &[f64]) -> usize {
        let rect = self.clamp_rect(rect);
        let channels = self.channels() as usize;
        let row_len = rect.width as usize * channels;
        let mut samples = self.samples.borrow_mut();
        let mut written = 0;
        for (i, row) in (rect.y..rect.y + rect.height).enumerate() {
            let src = &data[(i * row_len).min(data.len())..((i + 1) * row_len).min(data.len())];
            if src.is_empty() {
                break;
            }
            let start = (row as usize * self.width as usize + rect.x as usize) * channels;
            samples[start..start + src.len()].copy_from_slice(src);
            written += src.len();
        }
        written
    }
}

impl Clone for Image {
    fn clone(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            layout: self.layout,
            color_channels: self.color_channels,
            channel_types: self.channel_types.clone(),
            subpixel: self.subpixel,
            profile: self.profile.clone(),
            samples: RefCell::new(self.samples.borrow().clone()),
        }
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_packing() {
        let layout = PixelLayout::new(DataType::U16, 4)
            .with_color_offset(1)
            .with_planar(true)
            .with_byte_swap(true);

        assert_eq!(layout.channels(), 4);
        assert_eq!(layout.color_offset(), 1);
        assert_eq!(layout.data_type(), Some(DataType::U16));
        assert!(layout.is_planar());
        assert!(layout.is_byte_swapped());
        assert!(!layout.is_swapped());
        assert!(!layout.is_reverted());
        assert_eq!(layout.bits(), 4 | (1 << 16) | (1 << 24) | (1 << 29) | (1 << 31));
    }

    #[test]
    fn test_layout_flags_toggle() {
        let layout = PixelLayout::new(DataType::Float, 3).with_swap(true);
        assert!(layout.is_swapped());
        assert!(!layout.with_swap(false).is_swapped());
        assert!(PixelLayout::default().is_empty());
        assert!(!layout.is_empty());
    }

    #[test]
    fn test_new_image_channel_types() {
        let image = Image::new(2, 2, PixelLayout::new(DataType::U8, 4));
        assert_eq!(image.color_channels(), 3);
        assert_eq!(
            image.channel_types(),
            &[
                ChannelType::Color,
                ChannelType::Color,
                ChannelType::Color,
                ChannelType::Alpha1
            ]
        );
        assert_eq!(image.sample_count(), 16);
    }

    #[test]
    fn test_read_write_rect() {
        let image = Image::new(3, 2, PixelLayout::new(DataType::Double, 1))
            .with_samples(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);

        let rect = PixelRect { x: 1, y: 0, width: 2, height: 2 };
        assert_eq!(image.read_rect(rect), vec![1.0, 2.0, 4.0, 5.0]);

        assert_eq!(image.write_rect(rect, &[9.0, 9.0, 8.0, 8.0]), 4);
        assert_eq!(&*image.samples(), &[0.0, 9.0, 9.0, 3.0, 8.0, 8.0]);
    }

    #[test]
    fn test_rect_is_clamped() {
        let image = Image::new(2, 2, PixelLayout::new(DataType::U8, 1));
        let rect = image.clamp_rect(PixelRect { x: 1, y: 1, width: 10, height: 10 });
        assert_eq!(rect, PixelRect { x: 1, y: 1, width: 1, height: 1 });
        assert_eq!(image.read_rect(PixelRect { x: 5, y: 5, width: 1, height: 1 }), Vec::<f64>::new());
    }
}
