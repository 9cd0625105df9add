//! Policy resolver — the precedence rule for one page at one moment.
//!
//! Precedence, short-circuiting in order:
//! 1. an explicit site override wins outright,
//! 2. a disabled global policy turns rendering off,
//! 3. otherwise render dark unless the page already looks dark.
//!
//! The heuristic is a closure so it is only evaluated in branch 3; callers
//! pass something that inspects computed styles, which is not free.

/// Compute the effective decision. `true` means dark rendering is active.
pub fn resolve<F>(global: bool, site_override: Option<bool>, site_looks_dark: F) -> bool
where
    F: FnOnce() -> bool,
{
    if let Some(forced) = site_override {
        return forced;
    }
    if !global {
        return false;
    }
    !site_looks_dark()
}

#[cfg(test)]
#[path = "resolve_test.rs"]
mod tests;
