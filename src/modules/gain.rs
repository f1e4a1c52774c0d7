//! Gain module: `sample * factor + offset`.
//!
//! The factor and offset are baked into a `gain` context, so the context is
//! rebuilt whenever the node's options change.

use crate::options::OptionValue;
use crate::pipeline::{Context, FilterCore, RunContext};
use crate::registry::{BuildContext, DescribeUi, ModuleCapabilities, ModuleDescriptor, RunFilter};

pub const REGISTRATION: &str = "org/colorpipe/imaging/gain";
pub const FACTOR_KEY: &str = "org/colorpipe/imaging/gain/factor";
pub const OFFSET_KEY: &str = "org/colorpipe/imaging/gain/offset";
pub const CONTEXT_TYPE: &str = "gain";

/// Precomputed gain parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainParams {
    pub factor: f64,
    pub offset: f64,
}

impl GainParams {
    pub fn from_core(core: &FilterCore) -> Self {
        let options = core.options();
        Self {
            factor: options.find_double(FACTOR_KEY).unwrap_or(1.0),
            offset: options.find_double(OFFSET_KEY).unwrap_or(0.0),
        }
    }

    pub fn apply(&self, samples: &mut [f64]) {
        for s in samples {
            *s = *s * self.factor + self.offset;
        }
    }
}

struct GainContext;

impl BuildContext for GainContext {
    fn context_type(&self) -> &str {
        CONTEXT_TYPE
    }

    fn build(&self, core: &FilterCore) -> anyhow::Result<Context> {
        let params = GainParams::from_core(core);
        if !params.factor.is_finite() || !params.offset.is_finite() {
            anyhow::bail!("gain parameters must be finite, got {:?}", params);
        }
        Ok(Context::new(
            CONTEXT_TYPE,
            std::mem::size_of::<GainParams>(),
            params,
        ))
    }
}

struct GainRunner;

impl RunFilter for GainRunner {
    fn run(&self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        let context = ctx
            .context()
            .ok_or_else(|| anyhow::anyhow!("gain context missing"))?;
        let params = *context
            .downcast_ref::<GainParams>()
            .ok_or_else(|| anyhow::anyhow!("unexpected {} context", context.kind()))?;

        ctx.pull_input(0)?;
        params.apply(ctx.ticket.array_mut());
        Ok(())
    }
}

struct GainUi;

impl DescribeUi for GainUi {
    fn describe(&self, core: &FilterCore) -> String {
        let params = GainParams::from_core(core);
        format!("Gain x{} {:+}", params.factor, params.offset)
    }
}

pub fn capabilities() -> ModuleCapabilities {
    ModuleCapabilities::default()
        .with_runner(GainRunner)
        .with_context(GainContext)
        .with_ui(GainUi)
}

pub fn descriptor() -> ModuleDescriptor {
    ModuleDescriptor::new(super::core_tag(), REGISTRATION)
        .with_name("Gain")
        .with_category("Imaging/Adjust")
        .with_plug(super::data_plug())
        .with_socket(super::data_socket())
        .with_option(FACTOR_KEY, OptionValue::Double(1.0))
        .with_option(OFFSET_KEY, OptionValue::Double(0.0))
        .with_capabilities(capabilities())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{OptionSource, Options};
    use std::rc::Rc;

    #[test]
    fn test_params_apply() {
        let params = GainParams {
            factor: 2.0,
            offset: -1.0,
        };
        let mut samples = vec![0.0, 0.5, 1.0];
        params.apply(&mut samples);
        assert_eq!(samples, vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_context_reflects_options() {
        let user = Options::new();
        user.set(FACTOR_KEY, OptionValue::Double(3.0), OptionSource::User);
        let core = FilterCore::new(Rc::new(descriptor()), Some(&user));

        let context = GainContext.build(&core).unwrap();
        assert_eq!(context.kind(), CONTEXT_TYPE);
        assert_eq!(
            context.downcast_ref::<GainParams>(),
            Some(&GainParams {
                factor: 3.0,
                offset: 0.0
            })
        );
        assert_eq!(core.describe().as_deref(), Some("Gain x3 +0"));
    }

    #[test]
    fn test_non_finite_factor_fails() {
        let user = Options::new();
        user.set(FACTOR_KEY, OptionValue::Double(f64::NAN), OptionSource::User);
        let core = FilterCore::new(Rc::new(descriptor()), Some(&user));
        assert!(GainContext.build(&core).is_err());
    }
}
