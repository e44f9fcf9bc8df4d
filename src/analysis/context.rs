//! Lexical contexts for the semantic analyzer
//!
//! A context frame holds the names declared in one scope plus the two
//! pieces of surrounding information the checks need: whether the scope
//! is inside a loop, and which function (if any) encloses it. Frames are
//! entered and left in LIFO order, so the whole chain is a stack.
//!
//! Carlos permits no shadowing anywhere: declaring a name fails if the
//! name is visible in *any* enclosing frame, not just the current one.

use std::collections::HashMap;
use std::rc::Rc;

use super::ast::{Entity, Function};
use crate::errors::{CarlosError, CarlosResult, SourceSpan};

/// One scope frame
#[derive(Debug)]
struct Frame {
    /// Names declared in this scope
    locals: HashMap<String, Entity>,
    /// Whether this scope is inside a loop body
    in_loop: bool,
    /// The function whose body encloses this scope, if any
    function: Option<Rc<Function>>,
}

/// The context stack threaded through one analysis
#[derive(Debug)]
pub struct Context {
    /// Stack of frames (innermost is last)
    frames: Vec<Frame>,
}

impl Context {
    /// Create a root context seeded with the given bindings
    pub fn with_prelude(bindings: Vec<(String, Entity)>) -> Self {
        let mut locals = HashMap::new();
        for (name, entity) in bindings {
            locals.insert(name, entity);
        }
        Self {
            frames: vec![Frame {
                locals,
                in_loop: false,
                function: None,
            }],
        }
    }

    /// Check whether `name` is bound in this context or any ancestor
    pub fn sees(&self, name: &str) -> bool {
        self.frames.iter().any(|f| f.locals.contains_key(name))
    }

    /// Bind `name` locally; fails if the name is visible anywhere in the
    /// chain (no shadowing)
    pub fn add(&mut self, name: &str, entity: Entity, span: SourceSpan) -> CarlosResult<()> {
        if self.sees(name) {
            return Err(CarlosError::analysis(
                format!("Identifier {} already declared", name),
                span,
            ));
        }
        self.frames
            .last_mut()
            .expect("context should never be empty")
            .locals
            .insert(name.to_string(), entity);
        Ok(())
    }

    /// Return the nearest binding of `name`
    pub fn lookup(&self, name: &str, span: SourceSpan) -> CarlosResult<Entity> {
        for frame in self.frames.iter().rev() {
            if let Some(entity) = frame.locals.get(name) {
                return Ok(entity.clone());
            }
        }
        Err(CarlosError::analysis(
            format!("Identifier {} not declared", name),
            span,
        ))
    }

    /// Enter a child scope, inheriting `in_loop` and the enclosing
    /// function unless overridden
    pub fn enter(&mut self, in_loop: Option<bool>, function: Option<Rc<Function>>) {
        let parent = self.frames.last().expect("context should never be empty");
        let in_loop = in_loop.unwrap_or(parent.in_loop);
        let function = function.or_else(|| parent.function.clone());
        self.frames.push(Frame {
            locals: HashMap::new(),
            in_loop,
            function,
        });
    }

    /// Leave the current scope
    pub fn exit(&mut self) {
        assert!(self.frames.len() > 1, "cannot exit the root context");
        self.frames.pop();
    }

    /// Whether the current scope is inside a loop
    pub fn in_loop(&self) -> bool {
        self.frames
            .last()
            .expect("context should never be empty")
            .in_loop
    }

    /// The function enclosing the current scope, if any
    pub fn function(&self) -> Option<Rc<Function>> {
        self.frames
            .last()
            .expect("context should never be empty")
            .function
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{FunctionType, Type};
    use crate::analysis::Variable;

    fn span() -> SourceSpan {
        SourceSpan::new(0, 0)
    }

    fn var(name: &str) -> Entity {
        Entity::Variable(Rc::new(Variable::new(name, false, Type::Int)))
    }

    #[test]
    fn test_add_and_lookup() {
        let mut ctx = Context::with_prelude(vec![]);
        ctx.add("x", var("x"), span()).unwrap();
        assert!(ctx.sees("x"));
        assert!(matches!(
            ctx.lookup("x", span()).unwrap(),
            Entity::Variable(_)
        ));
    }

    #[test]
    fn test_lookup_missing() {
        let ctx = Context::with_prelude(vec![]);
        let err = ctx.lookup("ghost", span()).unwrap_err();
        assert_eq!(err.message(), "Identifier ghost not declared");
    }

    #[test]
    fn test_no_shadowing_in_same_scope() {
        let mut ctx = Context::with_prelude(vec![]);
        ctx.add("x", var("x"), span()).unwrap();
        let err = ctx.add("x", var("x"), span()).unwrap_err();
        assert_eq!(err.message(), "Identifier x already declared");
    }

    #[test]
    fn test_no_shadowing_across_the_chain() {
        let mut ctx = Context::with_prelude(vec![]);
        ctx.add("x", var("x"), span()).unwrap();
        ctx.enter(None, None);
        let err = ctx.add("x", var("x"), span()).unwrap_err();
        assert_eq!(err.message(), "Identifier x already declared");
    }

    #[test]
    fn test_inner_binding_dropped_on_exit() {
        let mut ctx = Context::with_prelude(vec![]);
        ctx.enter(None, None);
        ctx.add("inner", var("inner"), span()).unwrap();
        assert!(ctx.sees("inner"));
        ctx.exit();
        assert!(!ctx.sees("inner"));
    }

    #[test]
    fn test_loop_flag_inherits_and_overrides() {
        let mut ctx = Context::with_prelude(vec![]);
        assert!(!ctx.in_loop());
        ctx.enter(Some(true), None);
        assert!(ctx.in_loop());
        // A plain child (e.g. an if body) inherits the flag.
        ctx.enter(None, None);
        assert!(ctx.in_loop());
        // A function body resets it.
        let f = Rc::new(Function::new(
            "f",
            Rc::new(FunctionType::new(vec![], Type::Void)),
        ));
        ctx.enter(Some(false), Some(f));
        assert!(!ctx.in_loop());
        assert!(ctx.function().is_some());
    }

    #[test]
    fn test_prelude_participates_in_no_shadowing() {
        let mut ctx = Context::with_prelude(vec![("print".to_string(), var("print"))]);
        ctx.enter(None, None);
        let err = ctx.add("print", var("print"), span()).unwrap_err();
        assert_eq!(err.message(), "Identifier print already declared");
    }
}
