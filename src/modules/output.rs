//! Output module: the pull end of a chain.
//!
//! Running the output node pulls the ticket's pixel rectangle through the
//! upstream chain into the ticket array. When the output socket holds an
//! image of its own, the pixels are written into it as well.

use crate::pipeline::RunContext;
use crate::registry::{ModuleCapabilities, ModuleDescriptor, RunFilter};
use std::rc::Rc;

pub const REGISTRATION: &str = "org/colorpipe/imaging/output";

/// Repack interleaved pixels from `from` to `to` channels. Missing channels
/// are zero, surplus ones dropped.
pub fn remap_channels(samples: &[f64], from: u16, to: u16) -> Vec<f64> {
    if from == to || from == 0 {
        return samples.to_vec();
    }
    let (from, to) = (from as usize, to as usize);
    let mut out = Vec::with_capacity(samples.len() / from * to);
    for pixel in samples.chunks_exact(from) {
        let kept = from.min(to);
        out.extend_from_slice(&pixel[..kept]);
        out.resize(out.len() + (to - kept), 0.0);
    }
    out
}

struct OutputRunner;

impl RunFilter for OutputRunner {
    fn run(&self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        let input = ctx.pull_input(0)?;

        let Some(target) = ctx.node.data(0) else {
            return Ok(());
        };
        if Rc::ptr_eq(&target, &input) {
            return Ok(());
        }

        let rect = ctx.ticket.pixel_rect(&target);
        let samples = remap_channels(ctx.ticket.array(), input.channels(), target.channels());
        let written = target.write_rect(rect, &samples);
        tracing::trace!(
            "Output node {} wrote {} samples at {:?}",
            ctx.node.id(),
            written,
            rect
        );
        Ok(())
    }
}

pub fn capabilities() -> ModuleCapabilities {
    ModuleCapabilities::default().with_runner(OutputRunner)
}

pub fn descriptor() -> ModuleDescriptor {
    ModuleDescriptor::new(super::core_tag(), REGISTRATION)
        .with_name("Output")
        .with_category("Imaging/Output")
        .with_plug(super::data_plug())
        .with_socket(super::data_socket())
        .with_capabilities(capabilities())
}
