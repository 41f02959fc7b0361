//! Structured diagnostics channel.
//!
//! Recoverable failures (a render contract erroring, a teardown callback
//! panicking, a bad emission) are never swallowed and never abort the
//! owning mount; they are reported here. By default reports go to the `log`
//! facade; a host or test can install its own sink with [`set_sink`].

use std::cell::RefCell;
use std::rc::Rc;

/// A recoverable failure reported by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A render contract failed; the affected entry was skipped.
    RenderFailed { detail: String },
    /// A teardown callback panicked during scope cancellation. Remaining
    /// teardowns still ran.
    TeardownPanicked { detail: String },
    /// One emission carried the same identity twice; the emission was
    /// skipped to preserve registry uniqueness.
    DuplicateIdentity { detail: String },
    /// The upstream stream failed; the mount stopped processing it.
    UpstreamFailed { detail: String },
}

type Sink = Rc<dyn Fn(&Diagnostic)>;

thread_local! {
    static SINK: RefCell<Option<Sink>> = const { RefCell::new(None) };
}

/// Installs a diagnostics sink, replacing the default `log`-based one.
/// Passing `None` restores the default.
pub fn set_sink(sink: Option<Rc<dyn Fn(&Diagnostic)>>) {
    SINK.with(|s| *s.borrow_mut() = sink);
}

/// Reports a diagnostic through the installed sink, or via `log` when none
/// is installed.
pub fn report(diagnostic: Diagnostic) {
    let sink = SINK.with(|s| s.borrow().clone());
    if let Some(sink) = sink {
        sink(&diagnostic);
        return;
    }
    match &diagnostic {
        Diagnostic::RenderFailed { detail } => log::error!("render failed: {detail}"),
        Diagnostic::TeardownPanicked { detail } => {
            log::error!("teardown callback panicked: {detail}")
        }
        Diagnostic::DuplicateIdentity { detail } => {
            log::error!("duplicate identity within one emission: {detail}")
        }
        Diagnostic::UpstreamFailed { detail } => log::warn!("upstream stream failed: {detail}"),
    }
}
