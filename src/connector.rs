//! Connector capability descriptors and plug/socket negotiation.

use crate::image::{ChannelType, DataType, Image};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorRole {
    #[default]
    Plug,
    Socket,
}

/// Static description of what one plug or socket accepts.
///
/// Connectors are shared by all nodes created from the same module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Connector {
    pub nick: String,
    pub name: String,
    /// Connector type, e.g. `//imaging/data`.
    pub registration: String,
    pub role: ConnectorRole,
    pub mandatory: bool,
    pub min_channels: u16,
    pub max_channels: u16,
    pub min_color_channels: u16,
    pub max_color_channels: u16,
    pub data_types: Vec<DataType>,
    /// Channel types that must be present in the data.
    pub channel_types: Vec<ChannelType>,
    pub max_color_offset: u8,
    pub can_planar: bool,
    pub can_interwoven: bool,
    pub can_swap: bool,
    pub can_swap_bytes: bool,
    pub can_revert: bool,
    pub can_premultiplied_alpha: bool,
    pub can_nonpremultiplied_alpha: bool,
    pub can_subpixel: bool,
}

impl Default for Connector {
    fn default() -> Self {
        Self {
            nick: String::new(),
            name: String::new(),
            registration: "//imaging/data".to_string(),
            role: ConnectorRole::Plug,
            mandatory: true,
            min_channels: 1,
            max_channels: 255,
            min_color_channels: 1,
            max_color_channels: 255,
            data_types: DataType::ALL.to_vec(),
            channel_types: Vec::new(),
            max_color_offset: u8::MAX,
            can_planar: false,
            can_interwoven: true,
            can_swap: false,
            can_swap_bytes: false,
            can_revert: false,
            can_premultiplied_alpha: false,
            can_nonpremultiplied_alpha: true,
            can_subpixel: false,
        }
    }
}

impl Connector {
    pub fn plug(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            role: ConnectorRole::Plug,
            ..Default::default()
        }
    }

    pub fn socket(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            role: ConnectorRole::Socket,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_registration(mut self, registration: impl Into<String>) -> Self {
        self.registration = registration.into();
        self
    }

    pub fn with_channels(mut self, min: u16, max: u16) -> Self {
        self.min_channels = min;
        self.max_channels = max;
        self
    }

    pub fn with_color_channels(mut self, min: u16, max: u16) -> Self {
        self.min_color_channels = min;
        self.max_color_channels = max;
        self
    }

    pub fn with_data_types(mut self, types: &[DataType]) -> Self {
        self.data_types = types.to_vec();
        self
    }

    pub fn with_channel_types(mut self, types: &[ChannelType]) -> Self {
        self.channel_types = types.to_vec();
        self
    }

    pub fn with_max_color_offset(mut self, offset: u8) -> Self {
        self.max_color_offset = offset;
        self
    }

    pub fn with_planar(mut self, planar: bool, interwoven: bool) -> Self {
        self.can_planar = planar;
        self.can_interwoven = interwoven;
        self
    }

    pub fn with_swap(mut self, swap: bool, swap_bytes: bool) -> Self {
        self.can_swap = swap;
        self.can_swap_bytes = swap_bytes;
        self
    }

    pub fn with_revert(mut self, revert: bool) -> Self {
        self.can_revert = revert;
        self
    }

    pub fn with_alpha(mut self, premultiplied: bool, nonpremultiplied: bool) -> Self {
        self.can_premultiplied_alpha = premultiplied;
        self.can_nonpremultiplied_alpha = nonpremultiplied;
        self
    }

    pub fn with_subpixel(mut self, subpixel: bool) -> Self {
        self.can_subpixel = subpixel;
        self
    }

    pub fn optional(mut self) -> Self {
        self.mandatory = false;
        self
    }
}

/// Check whether `plug` accepts what `socket` offers.
///
/// Without data, or with a zero pixel layout, only the roles are checked;
/// the rest is deferred until data arrives.
pub fn compatible(socket: &Connector, plug: &Connector, data: Option<&Image>) -> bool {
    if plug.role != ConnectorRole::Plug || socket.role != ConnectorRole::Socket {
        return false;
    }

    let Some(image) = data else {
        return true;
    };
    let layout = image.layout();
    if layout.is_empty() {
        return true;
    }

    let channels = layout.channels();
    if channels < plug.min_channels || channels > plug.max_channels {
        return false;
    }

    let colors = image.color_channels();
    if colors < plug.min_color_channels || colors > plug.max_color_channels {
        return false;
    }

    match layout.data_type() {
        Some(data_type) if plug.data_types.contains(&data_type) => {}
        _ => return false,
    }

    if layout.color_offset() > plug.max_color_offset {
        return false;
    }

    if (layout.is_planar() && !plug.can_planar) || (!layout.is_planar() && !plug.can_interwoven) {
        return false;
    }

    if (layout.is_swapped() && !plug.can_swap) || (layout.is_byte_swapped() && !plug.can_swap_bytes)
    {
        return false;
    }

    if layout.is_reverted() && !plug.can_revert {
        return false;
    }

    let present = image.channel_types();
    let satisfied = plug.channel_types.iter().all(|wanted| {
        present.iter().any(|have| {
            have == wanted
                && !(*have == ChannelType::ColorLightness && !plug.can_nonpremultiplied_alpha)
                && !(*have == ChannelType::ColorLightnessPremultiplied
                    && !plug.can_premultiplied_alpha)
        })
    });
    if !satisfied {
        return false;
    }

    if image.subpixel() && !plug.can_subpixel {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PixelLayout;

    fn rgb_u8(channels: u16) -> Image {
        Image::new(2, 2, PixelLayout::new(DataType::U8, channels))
    }

    #[test]
    fn test_roles_are_checked_first() {
        let socket = Connector::socket("Img");
        let plug = Connector::plug("Img");
        assert!(compatible(&socket, &plug, None));
        assert!(!compatible(&plug, &plug, None));
        assert!(!compatible(&socket, &socket, None));
    }

    #[test]
    fn test_channel_bounds() {
        let socket = Connector::socket("Img");
        let plug = Connector::plug("Img").with_channels(1, 3);
        assert!(compatible(&socket, &plug, Some(&rgb_u8(3))));
        assert!(!compatible(&socket, &plug, Some(&rgb_u8(4))));
    }

    #[test]
    fn test_zero_layout_defers_checks() {
        let socket = Connector::socket("Img");
        let plug = Connector::plug("Img").with_channels(1, 3);
        let image = Image::new(2, 2, PixelLayout::default());
        assert!(compatible(&socket, &plug, Some(&image)));
    }

    #[test]
    fn test_data_type_and_offset() {
        let socket = Connector::socket("Img");
        let plug = Connector::plug("Img").with_data_types(&[DataType::Float]);
        assert!(!compatible(&socket, &plug, Some(&rgb_u8(3))));

        let plug = Connector::plug("Img").with_max_color_offset(0);
        let offset = Image::new(1, 1, PixelLayout::new(DataType::U8, 4).with_color_offset(1));
        assert!(!compatible(&socket, &plug, Some(&offset)));
    }

    #[test]
    fn test_layout_capabilities() {
        let socket = Connector::socket("Img");
        let plain = Connector::plug("Img");
        let layout = PixelLayout::new(DataType::U16, 3);

        for image in [
            Image::new(1, 1, layout.with_planar(true)),
            Image::new(1, 1, layout.with_swap(true)),
            Image::new(1, 1, layout.with_byte_swap(true)),
            Image::new(1, 1, layout.with_revert(true)),
        ] {
            assert!(!compatible(&socket, &plain, Some(&image)));
        }

        let capable = Connector::plug("Img")
            .with_planar(true, true)
            .with_swap(true, true)
            .with_revert(true);
        let all = Image::new(
            1,
            1,
            layout
                .with_planar(true)
                .with_swap(true)
                .with_byte_swap(true)
                .with_revert(true),
        );
        assert!(compatible(&socket, &capable, Some(&all)));

        let planar_only = Connector::plug("Img").with_planar(true, false);
        assert!(!compatible(&socket, &planar_only, Some(&rgb_u8(3))));
    }

    #[test]
    fn test_channel_type_alpha_rules() {
        let socket = Connector::socket("Img");
        let image = rgb_u8(3).with_channel_types(vec![
            ChannelType::ColorLightnessPremultiplied,
            ChannelType::Color,
            ChannelType::Color,
        ]);

        let wants = Connector::plug("Img")
            .with_channel_types(&[ChannelType::ColorLightnessPremultiplied]);
        assert!(!compatible(&socket, &wants, Some(&image)));
        assert!(compatible(&socket, &wants.clone().with_alpha(true, true), Some(&image)));

        let wants_depth = Connector::plug("Img").with_channel_types(&[ChannelType::Depth]);
        assert!(!compatible(&socket, &wants_depth, Some(&image)));
    }

    #[test]
    fn test_subpixel() {
        let socket = Connector::socket("Img");
        let image = rgb_u8(3).with_subpixel(true);
        assert!(!compatible(&socket, &Connector::plug("Img"), Some(&image)));
        assert!(compatible(
            &socket,
            &Connector::plug("Img").with_subpixel(true),
            Some(&image)
        ));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let connector: Connector = toml::from_str(
            r#"
            nick = "Img"
            max_channels = 3
            data_types = ["u8", "float"]
            "#,
        )
        .unwrap();
        assert_eq!(connector.nick, "Img");
        assert_eq!(connector.max_channels, 3);
        assert_eq!(connector.min_channels, 1);
        assert_eq!(connector.data_types, vec![DataType::U8, DataType::Float]);
        assert!(connector.can_interwoven);
    }
}
