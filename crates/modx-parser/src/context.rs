//! Processing context threaded through recursive resolution.

use crate::error::{ParseError, Result};

/// The flags and budget governing one resolution call.
///
/// Contexts are values: a nested call derives its own context with the
/// `with_*` methods and the caller's context is untouched when it returns.
/// The one piece of state that outlives a call, the "started processing
/// uncacheable tags" latch, lives on the [`Parser`](crate::Parser) instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingContext {
    /// Whether `[[!...]]` tags are resolved in this call.
    pub process_uncacheable: bool,
    /// Whether unresolved tags are deleted rather than left in place.
    pub remove_unprocessed: bool,
    /// Maximum number of scan passes over the content.
    pub max_depth: usize,
    /// Maximum number of tags resolved inside one another. Zero means no
    /// limit.
    pub max_nesting: usize,
    resolving: Vec<String>,
}

impl ProcessingContext {
    pub fn new(process_uncacheable: bool, remove_unprocessed: bool, max_depth: usize) -> Self {
        Self {
            process_uncacheable,
            remove_unprocessed,
            max_depth,
            max_nesting: 0,
            resolving: Vec::new(),
        }
    }

    pub fn with_uncacheable(&self, process_uncacheable: bool) -> Self {
        Self {
            process_uncacheable,
            ..self.clone()
        }
    }

    pub fn with_remove_unprocessed(&self, remove_unprocessed: bool) -> Self {
        Self {
            remove_unprocessed,
            ..self.clone()
        }
    }

    pub fn with_max_depth(&self, max_depth: usize) -> Self {
        Self {
            max_depth,
            ..self.clone()
        }
    }

    pub fn with_max_nesting(&self, max_nesting: usize) -> Self {
        Self {
            max_nesting,
            ..self.clone()
        }
    }

    /// Derives the context for resolving the content of `tag`.
    ///
    /// Fails with [`ParseError::CyclicReference`] if `tag` is already being
    /// resolved further up the stack, and with
    /// [`ParseError::NestingTooDeep`] if the stack is already `max_nesting`
    /// tags deep.
    pub fn enter(&self, tag: &str) -> Result<Self> {
        if self.is_resolving(tag) {
            return Err(ParseError::CyclicReference {
                tag: tag.to_string(),
                chain: self.resolving.clone(),
            });
        }
        if self.max_nesting > 0 && self.resolving.len() >= self.max_nesting {
            return Err(ParseError::NestingTooDeep {
                tag: tag.to_string(),
                limit: self.max_nesting,
            });
        }
        let mut inner = self.clone();
        inner.resolving.push(tag.to_string());
        Ok(inner)
    }

    pub fn is_resolving(&self, tag: &str) -> bool {
        self.resolving.iter().any(|t| t == tag)
    }

    /// Tags currently being resolved, outermost first.
    pub fn resolving(&self) -> &[String] {
        &self.resolving
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_contexts_leave_parent_alone() {
        let parent = ProcessingContext::new(true, false, 10);
        let child = parent.with_uncacheable(false).with_max_depth(1);
        assert!(parent.process_uncacheable);
        assert_eq!(parent.max_depth, 10);
        assert!(!child.process_uncacheable);
        assert_eq!(child.max_depth, 1);
        assert!(!child.remove_unprocessed);
    }

    #[test]
    fn test_enter_tracks_stack() {
        let ctx = ProcessingContext::default();
        let a = ctx.enter("[[$a]]").unwrap();
        let b = a.enter("[[$b]]").unwrap();
        assert_eq!(b.resolving(), ["[[$a]]", "[[$b]]"]);
        assert!(ctx.resolving().is_empty());
    }

    #[test]
    fn test_nesting_limit() {
        let ctx = ProcessingContext::default().with_max_nesting(2);
        let two = ctx
            .enter("[[$a]]")
            .and_then(|c| c.enter("[[$b]]"))
            .unwrap();
        match two.enter("[[$c]]") {
            Err(ParseError::NestingTooDeep { tag, limit }) => {
                assert_eq!(tag, "[[$c]]");
                assert_eq!(limit, 2);
            }
            other => panic!("expected nesting error, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_nesting_limit_is_unbounded() {
        let mut ctx = ProcessingContext::default();
        for i in 0..200 {
            ctx = ctx.enter(&format!("[[$t{i}]]")).unwrap();
        }
        assert_eq!(ctx.resolving().len(), 200);
    }

    #[test]
    fn test_reentering_is_a_cycle() {
        let ctx = ProcessingContext::default()
            .enter("[[$a]]")
            .and_then(|c| c.enter("[[$b]]"))
            .unwrap();
        match ctx.enter("[[$a]]") {
            Err(ParseError::CyclicReference { tag, chain }) => {
                assert_eq!(tag, "[[$a]]");
                assert_eq!(chain, vec!["[[$a]]", "[[$b]]"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }
}
