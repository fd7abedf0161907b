//! Fatal error taxonomy.
//!
//! These are programmer-misuse errors: the runtime cannot recover from them
//! and does not try. They panic at the call site with the formatted message,
//! so the offending component is in the backtrace. Everything the runtime
//! *can* recover from is a `Result` (data suspension) or a log line
//! (diagnostics for internal invariants and unsupported element shapes).
//!
//! Note that "hook called outside a render" cannot happen here: hooks are
//! methods on [`HookCx`](crate::render::HookCx), which only exists while a
//! function unit is rendering.

use thiserror::Error;

/// Unrecoverable misuse of the hook protocol.
///
/// The number and order of hook calls for a function unit must be identical
/// between its mount render and every update render. Conditional hook calls
/// break the positional pairing and surface as one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    /// An update render called more hooks than the previous render of the
    /// same unit recorded.
    #[error("rendered more hooks than during the previous render: hook #{index} has no stored counterpart")]
    HookCountTooMany { index: usize },

    /// An update render finished having called fewer hooks than the
    /// previous render of the same unit recorded.
    #[error("rendered fewer hooks than during the previous render: expected {expected}, got {rendered}")]
    HookCountTooFew { expected: usize, rendered: usize },

    /// Hook #n was one kind of hook last render and another kind this
    /// render (e.g. a state hook where an effect hook used to be).
    #[error("hook #{index} changed kind between renders: was {previous}, now {current}")]
    HookKindMismatch {
        index: usize,
        previous: &'static str,
        current: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_position() {
        let err = FatalError::HookCountTooMany { index: 3 };
        assert!(err.to_string().contains("#3"));

        let err = FatalError::HookKindMismatch {
            index: 1,
            previous: "state",
            current: "effect",
        };
        let msg = err.to_string();
        assert!(msg.contains("state") && msg.contains("effect"));
    }
}
