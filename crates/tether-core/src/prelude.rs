pub use crate::context::Context;
pub use crate::diag::{self, Diagnostic};
pub use crate::diff::{EditOp, diff_by_value, diff_keyed};
pub use crate::error::{RenderError, StreamError};
pub use crate::scope::{Scope, register_teardown};
pub use crate::stream::{Stream, SubId, stream};
