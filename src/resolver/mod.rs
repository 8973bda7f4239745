//! Focus resolution over view snapshots.

pub mod focus;
pub mod session;

use crate::view::{FillContext, ViewNode, WindowNode};

/// Resolves which view, if any, has input focus.
///
/// The bridge calls this instead of walking the snapshot itself, so an
/// alternative strategy can be supplied without touching the fill path.
pub trait FocusedFieldResolver: Send + Sync {
    /// Return the focused node across `windows`, or `None`.
    fn resolve<'a>(&self, windows: &'a [WindowNode]) -> Option<&'a ViewNode>;

    /// Resolve against the most recent fill context.
    fn resolve_latest<'a>(&self, contexts: &'a [FillContext]) -> Option<&'a ViewNode> {
        contexts.last().and_then(|ctx| self.resolve(&ctx.windows))
    }
}

/// Window index ascending, then pre-order. First focused node wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentOrderResolver;

impl FocusedFieldResolver for DocumentOrderResolver {
    fn resolve<'a>(&self, windows: &'a [WindowNode]) -> Option<&'a ViewNode> {
        focus::resolve(windows)
    }
}
