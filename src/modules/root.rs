//! Root module: the image source at the start of every chain.
//!
//! The root holds the input image in its socket. When the socket is empty
//! it builds an image from its own options:
//!
//! | key        | value                          |
//! |------------|--------------------------------|
//! | `width`    | pixels, required               |
//! | `height`   | pixels, required               |
//! | `channels` | sample channels, default 3     |
//! | `data_type`| `DataType` index, default float|
//! | `fill`     | initial sample value, default 0|

use crate::image::{DataType, Image, PixelLayout};
use crate::options::Options;
use crate::pipeline::{PipelineError, RunContext};
use crate::registry::{DescribeUi, ModuleCapabilities, ModuleDescriptor, RunFilter};
use std::rc::Rc;

pub const REGISTRATION: &str = "org/colorpipe/imaging/root";

/// Image described by the root options, or `None` without a size.
pub fn image_from_options(options: &Options) -> Option<Image> {
    let width = u32::try_from(options.find_int("width")?).ok()?;
    let height = u32::try_from(options.find_int("height")?).ok()?;
    let channels = options
        .find_int("channels")
        .and_then(|c| u16::try_from(c).ok())
        .unwrap_or(3);
    let data_type = options
        .find_int("data_type")
        .and_then(|t| DataType::from_bits(t as u32))
        .unwrap_or(DataType::Float);
    let fill = options.find_double("fill").unwrap_or(0.0);

    let image = Image::new(width, height, PixelLayout::new(data_type, channels));
    let samples = vec![fill; image.sample_count()];
    Some(image.with_samples(samples))
}

struct RootRunner;

impl RunFilter for RootRunner {
    fn run(&self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        let node = ctx.node;
        let image = match node.data(0) {
            Some(image) => image,
            None => {
                let image = image_from_options(node.options())
                    .ok_or(PipelineError::ResolutionFailed(node.id()))?;
                tracing::debug!(
                    "Root node {} created a {}x{} image",
                    node.id(),
                    image.width(),
                    image.height()
                );
                let image = Rc::new(image);
                node.set_data(0, Some(image.clone()))?;
                image
            }
        };

        let rect = ctx.ticket.pixel_rect(&image);
        ctx.ticket.set_array(image.read_rect(rect));
        Ok(())
    }
}

struct RootUi;

impl DescribeUi for RootUi {
    fn describe(&self, core: &crate::pipeline::FilterCore) -> String {
        match image_from_options(core.options()) {
            Some(image) => format!("Root {}x{}", image.width(), image.height()),
            None => "Root".to_string(),
        }
    }
}

pub fn capabilities() -> ModuleCapabilities {
    ModuleCapabilities::default()
        .with_runner(RootRunner)
        .with_ui(RootUi)
}

pub fn descriptor() -> ModuleDescriptor {
    ModuleDescriptor::new(super::core_tag(), REGISTRATION)
        .with_name("Root Image")
        .with_category("Imaging/Source")
        .with_socket(super::data_socket())
        .with_capabilities(capabilities())
}
