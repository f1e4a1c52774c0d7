//! Copy module: passes pixels through unchanged.

use crate::pipeline::RunContext;
use crate::registry::{ModuleCapabilities, ModuleDescriptor, RunFilter};

pub const REGISTRATION: &str = "org/colorpipe/imaging/copy";

struct CopyRunner;

impl RunFilter for CopyRunner {
    fn run(&self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        ctx.pull_input(0)?;
        Ok(())
    }
}

pub fn capabilities() -> ModuleCapabilities {
    ModuleCapabilities::default().with_runner(CopyRunner)
}

pub fn descriptor() -> ModuleDescriptor {
    ModuleDescriptor::new(super::core_tag(), REGISTRATION)
        .with_name("Copy")
        .with_category("Imaging/Copy")
        .with_plug(super::data_plug())
        .with_socket(super::data_socket())
        .with_capabilities(capabilities())
}
