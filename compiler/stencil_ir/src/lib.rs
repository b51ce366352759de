//! Stencil IR - the abstract syntax tree a template run executes.
//!
//! The parser is an external collaborator: it hands the execution core a fully
//! built tree of two node families.
//!
//! - [`Expr`]: pure, value-producing nodes. Literal-only subtrees carry a
//!   write-once constant cache filled by the evaluator.
//! - [`Element`]: effectful nodes that write output. Executing one either
//!   finishes it or yields a slice of child elements for the driver to run.
//!
//! Every node renders a canonical form (for dumps and diagnostics) and exposes
//! a small reflective parameter list (index → sub-node plus syntactic role) for
//! tooling. Nodes never hold parent pointers.
//!
//! # Tree transforms
//!
//! [`Expr::substitute`] is the pure clone-with-substitution transform used by
//! `#escape` blocks; [`Element::escape_block`] applies it to every
//! interpolation in a block body.

mod callable;
mod dump;
mod element;
mod expr;
mod name;
mod number;
mod params;
mod span;
mod template;

pub use callable::{CallableDef, CallableKind, ParamDecl};
pub use element::{
    AssignOp, AssignScope, AssignTarget, Assignment, CallArgs, CallSite, CaseKind,
    ConditionalBranch, Element, ElementKind, ListBlock, LoopVars, SwitchBlock, SwitchCase,
};
pub use expr::{
    BinaryOp, BuiltInKind, ConstKind, Expr, ExprKind, LoopQuery, SpecialVariable, StringPart,
    UnaryOp,
};
pub use name::Name;
pub use number::{Constant, Number};
pub use params::{NodeParam, ParameterRole};
pub use span::Span;
pub use template::{AutoEscapingPolicy, Template};
