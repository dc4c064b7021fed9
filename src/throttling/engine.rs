//! Embedded JavaScript engine (rquickjs) hosting the compiled transform.
//!
//! The transform is lifted verbatim from the player script, so it is
//! executed rather than reimplemented. `QuickJS` is small enough to keep
//! one context alive for the whole process.

use rquickjs::{Context, Function, Runtime};
use tracing::debug;

/// Global name the extracted function is bound to inside the context.
const TRANSFORM_GLOBAL: &str = "__streamres_transform";

/// A `QuickJS` context holding exactly one compiled transform function.
pub struct TransformEngine {
    context: Context,
    // Field order matters: the runtime is dropped after the context.
    _runtime: Runtime,
}

impl TransformEngine {
    /// Compile `function_source` (a `function(a){...}` expression).
    pub fn compile(function_source: &str) -> rquickjs::Result<Self> {
        let runtime = Runtime::new()?;

        // The transform only shuffles a short string
        runtime.set_memory_limit(8 * 1024 * 1024);
        runtime.set_max_stack_size(512 * 1024);

        let context = Context::full(&runtime)?;
        let code = format!("var {TRANSFORM_GLOBAL} = {function_source};");
        debug!("Compiling transform: {} chars", code.len());

        context.with(|ctx| ctx.eval::<(), _>(code))?;

        Ok(Self {
            context,
            _runtime: runtime,
        })
    }

    /// Run the transform on `input`.
    pub fn call(&self, input: &str) -> rquickjs::Result<String> {
        self.context.with(|ctx| {
            let transform: Function = ctx.globals().get(TRANSFORM_GLOBAL)?;
            transform.call((input,))
        })
    }
}
