//! The depth-first rewriting iterator.

use crate::tree::Tensor;

/// Which side of a node the iterator is on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Event {
    /// Yielded before the node's children.
    Entering,
    /// Yielded after the node's children, with the node rebuilt from any
    /// replaced descendants.
    Leaving,
}

struct Frame {
    /// The node as it was first entered, kept so the parent can tell a
    /// replacement apart from an untouched child.
    entered: Tensor,
    /// The node being traversed: the replacement, after a `set` while
    /// entering.
    node: Tensor,
    cursor: usize,
    rebuilt: Vec<Tensor>,
    changed: bool,
}

impl Frame {
    fn new(node: Tensor) -> Self {
        Frame {
            entered: node.clone(),
            node,
            cursor: 0,
            rebuilt: Vec::new(),
            changed: false,
        }
    }

    /// Restarts the frame over a replacement, keeping the entered node.
    fn replace(&mut self, replacement: Tensor) {
        self.node = replacement;
        self.cursor = 0;
        self.rebuilt.clear();
        self.changed = false;
    }
}

enum State {
    Start,
    /// Last event was [`Event::Entering`] for the top frame.
    Descending,
    /// Last event was [`Event::Leaving`]; the finished node has not been
    /// handed to its parent yet, so `set` can still swap it.
    Ascended { entered: Tensor, rebuilt: Tensor },
    Finished(Tensor),
}

/// A depth-first walk that rebuilds the tree around replacements.
///
/// After a node is yielded, [`TreeIterator::set`] substitutes it: a
/// replacement set while entering is traversed in the node's place, one set
/// while leaving is handed to the parent as-is. [`TreeIterator::result`]
/// finishes the walk and returns the rebuilt root, which is the original
/// handle whenever nothing was replaced.
pub struct TreeIterator {
    root: Tensor,
    stack: Vec<Frame>,
    state: State,
    guide: Option<Box<dyn Fn(&Tensor) -> bool>>,
}

impl TreeIterator {
    pub fn new(root: &Tensor) -> Self {
        TreeIterator {
            root: root.clone(),
            stack: Vec::new(),
            state: State::Start,
            guide: None,
        }
    }

    /// Like [`TreeIterator::new`], but descends into a node's children only
    /// when `guide` accepts it. Rejected nodes are still yielded (both
    /// events); their subtrees are skipped.
    pub fn with_guide(root: &Tensor, guide: impl Fn(&Tensor) -> bool + 'static) -> Self {
        TreeIterator {
            root: root.clone(),
            stack: Vec::new(),
            state: State::Start,
            guide: Some(Box::new(guide)),
        }
    }

    /// Nesting depth of the last-yielded node. The root is at depth zero.
    pub fn depth(&self) -> usize {
        self.stack.len().saturating_sub(1)
    }

    pub fn next(&mut self) -> Option<(Event, Tensor)> {
        match std::mem::replace(&mut self.state, State::Start) {
            State::Start => {
                if self.stack.is_empty() {
                    self.stack.push(Frame::new(self.root.clone()));
                    self.state = State::Descending;
                    Some((Event::Entering, self.root.clone()))
                } else {
                    // unreachable by construction; restart defensively
                    self.state = State::Descending;
                    self.step()
                }
            }
            State::Descending => {
                self.state = State::Descending;
                self.step()
            }
            State::Ascended { entered, rebuilt } => match self.stack.last_mut() {
                Some(parent) => {
                    if !Tensor::same_node(&entered, &rebuilt) {
                        parent.changed = true;
                    }
                    parent.rebuilt.push(rebuilt);
                    self.state = State::Descending;
                    self.step()
                }
                None => {
                    self.state = State::Finished(rebuilt);
                    None
                }
            },
            State::Finished(result) => {
                self.state = State::Finished(result);
                None
            }
        }
    }

    fn step(&mut self) -> Option<(Event, Tensor)> {
        let top = self.stack.last_mut()?;
        let descend = top.cursor < top.node.child_count()
            && self.guide.as_ref().map_or(true, |g| g(&top.node));
        if descend {
            let child = top.node.child(top.cursor).cloned()?;
            top.cursor += 1;
            self.stack.push(Frame::new(child.clone()));
            self.state = State::Descending;
            Some((Event::Entering, child))
        } else {
            let frame = self.stack.pop()?;
            let rebuilt = if frame.changed {
                frame.node.with_children(frame.rebuilt)
            } else {
                frame.node.clone()
            };
            self.state = State::Ascended {
                entered: frame.entered,
                rebuilt: rebuilt.clone(),
            };
            Some((Event::Leaving, rebuilt))
        }
    }

    /// Replaces the last-yielded node. After an entering event the
    /// replacement is traversed; after a leaving event it is final.
    pub fn set(&mut self, replacement: Tensor) {
        match &mut self.state {
            State::Descending => {
                if let Some(top) = self.stack.last_mut() {
                    top.replace(replacement);
                }
            }
            State::Ascended { rebuilt, .. } => {
                *rebuilt = replacement;
            }
            State::Start | State::Finished(_) => {}
        }
    }

    /// Drives the walk to completion and returns the rebuilt root.
    pub fn result(mut self) -> Tensor {
        while self.next().is_some() {}
        match self.state {
            State::Finished(result) => result,
            // the loop above cannot end in any other state
            _ => self.root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    fn events(ctx: &Context, text: &str) -> Vec<(Event, String)> {
        let t = ctx.parse(text).unwrap();
        let mut it = TreeIterator::new(&t);
        let mut seen = Vec::new();
        while let Some((event, node)) = it.next() {
            seen.push((event, ctx.show(&node)));
        }
        seen
    }

    #[test]
    fn yields_every_node_twice_in_order() {
        let ctx = Context::new();
        let seen = events(&ctx, "a*b");
        assert_eq!(
            seen,
            vec![
                (Event::Entering, "a*b".into()),
                (Event::Entering, "a".into()),
                (Event::Leaving, "a".into()),
                (Event::Entering, "b".into()),
                (Event::Leaving, "b".into()),
                (Event::Leaving, "a*b".into()),
            ]
        );
    }

    #[test]
    fn untouched_walk_returns_the_same_handle() {
        let ctx = Context::new();
        let t = ctx.parse("(a + b)*c^2").unwrap();
        let mut it = TreeIterator::new(&t);
        while it.next().is_some() {}
        assert!(Tensor::same_node(&it.result(), &t));
    }

    #[test]
    fn replacement_on_leaving_rebuilds_the_spine() {
        let ctx = Context::new();
        let t = ctx.parse("a + b*c").unwrap();
        let e = ctx.parse("e").unwrap();
        let mut it = TreeIterator::new(&t);
        while let Some((event, node)) = it.next() {
            if event == Event::Leaving && ctx.show(&node) == "b" {
                it.set(e.clone());
            }
        }
        let result = it.result();
        assert_eq!(ctx.show(&result), "a + c*e");
        assert!(!Tensor::same_node(&result, &t));
    }

    #[test]
    fn replacement_on_entering_is_traversed() {
        let ctx = Context::new();
        let t = ctx.parse("a + b").unwrap();
        let nested = ctx.parse("c*e").unwrap();
        let mut it = TreeIterator::new(&t);
        let mut visited = Vec::new();
        while let Some((event, node)) = it.next() {
            if event == Event::Entering && ctx.show(&node) == "b" {
                it.set(nested.clone());
                continue;
            }
            if event == Event::Entering {
                visited.push(ctx.show(&node));
            }
        }
        assert!(visited.contains(&"c".to_string()));
        assert_eq!(ctx.show(&it.result()), "a + c*e");
    }

    #[test]
    fn entering_replacement_composes_with_leaving_replacement() {
        let ctx = Context::new();
        let t = ctx.parse("a + b").unwrap();
        let nested = ctx.parse("c*e").unwrap();
        let x = ctx.parse("x").unwrap();
        let mut it = TreeIterator::new(&t);
        while let Some((event, node)) = it.next() {
            if event == Event::Entering && ctx.show(&node) == "b" {
                it.set(nested.clone());
            }
            if event == Event::Leaving && ctx.show(&node) == "c" {
                it.set(x.clone());
            }
        }
        assert_eq!(ctx.show(&it.result()), "a + e*x");
    }

    #[test]
    fn guide_skips_subtrees() {
        let ctx = Context::new();
        let t = ctx.parse("a + (b + c)^2").unwrap();
        let mut it = TreeIterator::with_guide(&t, |node| node.as_power().is_none());
        let mut entered = Vec::new();
        while let Some((event, node)) = it.next() {
            if event == Event::Entering {
                entered.push(ctx.show(&node));
            }
        }
        assert!(!entered.contains(&"b + c".to_string()));
        assert!(entered.iter().any(|s| s.contains("^2")));
    }

    #[test]
    fn nested_replacement_normalizes_through_builders() {
        let ctx = Context::new();
        let t = ctx.parse("a + b").unwrap();
        let zero = Tensor::zero();
        let mut it = TreeIterator::new(&t);
        while let Some((event, node)) = it.next() {
            if event == Event::Leaving && ctx.show(&node) == "b" {
                it.set(zero.clone());
            }
        }
        assert_eq!(ctx.show(&it.result()), "a");
    }
}
