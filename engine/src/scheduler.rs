use super::Chain;
use auto_impl::auto_impl;
use std::fmt::Debug;

/// A task-execution engine.
///
/// The engine owns all I/O and timing; callers only ever see their chains
/// progress through unit callbacks. The delivery contract every backend
/// must uphold:
///
/// - units of one chain run strictly in order, and each unit's callback is
///   invoked exactly once, from the engine's callback context;
/// - when a callback returns, the splices it recorded in its
///   [`ChainScope`](super::ChainScope) are applied before the next unit is
///   taken, and an aborted chain drops every remaining unit;
/// - distinct chains may interleave arbitrarily.
#[auto_impl(&, Box, Arc)]
pub trait Scheduler: Debug + Send + Sync {
    /// Hands over a chain for execution.
    ///
    /// Must not block on the chain's I/O or timers.
    fn launch(&self, chain: Chain);

    /// Blocks the caller until every launched chain has drained or aborted.
    fn wait_idle(&self);
}
