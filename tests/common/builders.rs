//! Test data builders for images and module manifests

use colorpipe::image::{DataType, Image, PixelLayout};
use std::path::{Path, PathBuf};

/// Builder for test images filled with a sample ramp
pub struct ImageBuilder {
    width: u32,
    height: u32,
    data_type: DataType,
    channels: u16,
    ramp: bool,
}

impl ImageBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data_type: DataType::Float,
            channels: 3,
            ramp: true,
        }
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Zero filled instead of `0, 1, 2, ...`
    pub fn zeroed(mut self) -> Self {
        self.ramp = false;
        self
    }

    pub fn build(self) -> Image {
        let image = Image::new(
            self.width,
            self.height,
            PixelLayout::new(self.data_type, self.channels),
        );
        if self.ramp {
            let samples = (0..image.sample_count()).map(|i| i as f64).collect();
            image.with_samples(samples)
        } else {
            image
        }
    }
}

struct FilterEntry {
    registration: String,
    implementation: String,
    max_channels: Option<u16>,
}

/// Builder for `*.module.toml` manifests
pub struct ManifestBuilder {
    backend: String,
    name: String,
    filters: Vec<FilterEntry>,
}

impl ManifestBuilder {
    pub fn new(backend: &str) -> Self {
        Self {
            backend: backend.to_string(),
            name: format!("{} modules", backend),
            filters: Vec::new(),
        }
    }

    pub fn filter(mut self, registration: &str, implementation: &str) -> Self {
        self.filters.push(FilterEntry {
            registration: registration.to_string(),
            implementation: implementation.to_string(),
            max_channels: None,
        });
        self
    }

    /// Data plug and socket on the last filter, the plug limited to
    /// `max_channels`.
    pub fn max_channels(mut self, max_channels: u16) -> Self {
        if let Some(last) = self.filters.last_mut() {
            last.max_channels = Some(max_channels);
        }
        self
    }

    pub fn to_toml(&self) -> String {
        let mut text = format!("backend = \"{}\"\nname = \"{}\"\n", self.backend, self.name);
        for filter in &self.filters {
            text.push_str(&format!(
                "\n[[filter]]\nregistration = \"{}\"\nimplementation = \"{}\"\n",
                filter.registration, filter.implementation
            ));
            if let Some(max) = filter.max_channels {
                text.push_str(&format!(
                    "\n[[filter.plugs]]\nnick = \"data\"\nmax_channels = {}\n\n[[filter.sockets]]\nnick = \"data\"\n",
                    max
                ));
            }
        }
        text
    }

    /// Write `<backend>_<stem>.module.toml` into `dir`
    pub fn write_to(&self, dir: &Path, stem: &str) -> PathBuf {
        let path = dir.join(format!("{}_{}.module.toml", self.backend, stem));
        std::fs::write(&path, self.to_toml()).expect("write manifest");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_builder() {
        let image = ImageBuilder::new(2, 1).channels(4).build();
        assert_eq!(image.sample_count(), 8);
        assert_eq!(image.samples()[7], 7.0);
    }
}
