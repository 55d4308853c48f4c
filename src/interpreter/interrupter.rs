//! Interrupter hook: host strategy consulted before default behavior

use crate::error::Result;
use crate::interpreter::ExecutionScope;
use crate::script::{Node, Value, Variables};

/// Per-activation strategy supplied by the host.
///
/// Every method has a pass-through default, so hosts only override what they
/// need. A typical veto closes a menu-driven trigger once the menu is gone.
pub trait Interrupter: Send + Sync {
    /// Called before every statement and expression. `true` stops the
    /// activation cleanly.
    fn on_node_process(&self, _scope: &ExecutionScope<'_>, _node: Node<'_>) -> bool {
        false
    }

    /// Offered every `#NAME(args)` first. Return `Ok(true)` when handled.
    ///
    /// `variables` is the live local tier of the running activation.
    fn on_command(
        &self,
        _scope: &ExecutionScope<'_>,
        _variables: &mut Variables,
        _name: &str,
        _args: &[Value],
    ) -> Result<bool> {
        Ok(false)
    }

    /// Offered every `%name%` first. `Ok(None)` falls through to the
    /// placeholder registry.
    fn on_placeholder(
        &self,
        _scope: &ExecutionScope<'_>,
        _name: &str,
        _args: &[Value],
    ) -> Result<Option<Value>> {
        Ok(None)
    }
}

/// Interrupter that never intervenes
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInterrupter;

impl Interrupter for NoInterrupter {}
