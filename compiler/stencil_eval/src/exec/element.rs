//! Element driver.
//!
//! [`Environment::visit`] walks a body with an explicit stack of child
//! iterators. An element that only needs its children run (a sequence, the
//! taken `#if` branch, `#sep`, escape blocks) returns them and the driver
//! pushes them instead of recursing. Elements that must restore state
//! afterwards (loops, calls, format blocks) run their bodies through a
//! nested `visit` themselves.

use smallvec::SmallVec;
use stencil_ir::{Element, ElementKind};
use stencil_values::{
    misplaced_directive, return_outside_callable, CallableValue, ControlAction, Value,
};
use tracing::trace;

use super::at_span;
use crate::environment::Environment;

impl Environment {
    /// Run `body` in order. The first signal or error stops the walk and is
    /// returned to the caller; errors are tagged with the failing element's
    /// location.
    pub fn visit(&mut self, body: &[Element]) -> Result<(), ControlAction> {
        let mut stack: SmallVec<[std::slice::Iter<'_, Element>; 8]> = SmallVec::new();
        stack.push(body.iter());
        while let Some(iter) = stack.last_mut() {
            let Some(element) = iter.next() else {
                stack.pop();
                continue;
            };
            self.counters.count_element();
            trace!(directive = element.directive_name(), span = %element.span, "execute");
            match self.execute(element) {
                Ok(Some(children)) => stack.push(children.iter()),
                Ok(None) => {}
                Err(action) => return Err(at_span(action, element.span)),
            }
        }
        Ok(())
    }

    /// Execute one element. Returns the children to run next, if any.
    fn execute<'e>(
        &mut self,
        element: &'e Element,
    ) -> Result<Option<&'e [Element]>, ControlAction> {
        match &element.kind {
            ElementKind::Text(text) => {
                self.output.write(text);
                Ok(None)
            }
            ElementKind::Interpolation(expr) => {
                self.interpolate(expr)?;
                Ok(None)
            }
            ElementKind::Sequence(children)
            | ElementKind::Escape { body: children, .. }
            | ElementKind::NoEscape(children) => Ok(Some(children)),
            ElementKind::If(branches) => {
                for branch in branches {
                    let taken = match &branch.condition {
                        Some(condition) => self.eval_bool(condition)?,
                        None => true,
                    };
                    if taken {
                        return Ok(Some(&branch.body));
                    }
                }
                Ok(None)
            }
            ElementKind::List(block) => {
                self.exec_list(block)?;
                Ok(None)
            }
            ElementKind::Items { loop_vars, body } => {
                self.exec_items(loop_vars, body)?;
                Ok(None)
            }
            ElementKind::Sep(body) => match self.innermost_loop() {
                Some(frame) if frame.has_next => Ok(Some(body)),
                Some(_) => Ok(None),
                None => Err(misplaced_directive("#sep", "#list or #items").into()),
            },
            ElementKind::Break => Err(ControlAction::Break {
                depth: self.depth(),
            }),
            ElementKind::Continue => Err(ControlAction::Continue {
                depth: self.depth(),
            }),
            ElementKind::Return(value) => {
                if !self.in_callable() {
                    return Err(return_outside_callable().into());
                }
                let value = match value {
                    Some(expr) => Some(self.eval(expr)?),
                    None => None,
                };
                Err(ControlAction::Return {
                    depth: self.depth(),
                    value,
                })
            }
            ElementKind::Stop(message) => {
                let message = match message {
                    Some(expr) => {
                        let value = self.eval(expr)?;
                        Some(self.to_plain_text(&value, expr)?)
                    }
                    None => None,
                };
                Err(ControlAction::Stop(message))
            }
            ElementKind::Switch(block) => {
                self.exec_switch(block)?;
                Ok(None)
            }
            ElementKind::Assignment(assignment) => {
                self.exec_assignment(assignment)?;
                Ok(None)
            }
            ElementKind::Capture {
                scope,
                name,
                namespace,
                body,
            } => {
                self.exec_capture(*scope, name, namespace.as_ref(), body)?;
                Ok(None)
            }
            ElementKind::CallableDef(def) => {
                let value = Value::Callable(CallableValue::new(
                    std::sync::Arc::clone(def),
                    self.current_namespace,
                ));
                self.set_in_namespace(self.current_namespace, def.name.clone(), value)?;
                Ok(None)
            }
            ElementKind::Call(site) => {
                self.exec_call_site(site, element.span)?;
                Ok(None)
            }
            ElementKind::Nested(args) => {
                self.exec_nested(args)?;
                Ok(None)
            }
            ElementKind::Import { library, namespace } => {
                self.exec_import(library, namespace)?;
                Ok(None)
            }
            ElementKind::AutoEsc(body) => {
                self.exec_auto_esc(body)?;
                Ok(None)
            }
            ElementKind::NoAutoEsc(body) => {
                self.exec_no_auto_esc(body)?;
                Ok(None)
            }
            ElementKind::OutputFormat { format, body } => {
                self.exec_output_format(format, body)?;
                Ok(None)
            }
            ElementKind::Attempt { attempt, recover } => {
                self.exec_attempt(attempt, recover)?;
                Ok(None)
            }
        }
    }
}
