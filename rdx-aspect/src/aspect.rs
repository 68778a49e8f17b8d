//! Reversible method interception.
//!
//! [`intercept`] swaps a named member of an [`Object`] for a wrapper that
//! routes every call through a replacement function. The replacement gets a
//! `proceed` function that runs the original with the caller's receiver and
//! arguments, plus the argument list itself. The returned [`Undo`] puts the
//! original back.
//!
//! ```
//! use aspect::prelude::*;
//!
//! let obj = Object::new().with("greet", Function::new(|_, _| Ok("hi".into())));
//! let undo = intercept(
//!     &obj,
//!     "greet",
//!     Function::advice(|_, proceed, _| {
//!         let inner = proceed.call(&Value::Undefined, &[])?;
//!         Ok(format!("intercepted:{}", inner.as_text().unwrap_or_default()).into())
//!     }),
//! )?;
//! assert_eq!(obj.call_method("greet", &[])?, Value::from("intercepted:hi"));
//! undo.restore();
//! assert_eq!(obj.call_method("greet", &[])?, Value::from("hi"));
//! # Ok::<(), aspect::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::value::{Function, Object, Value};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

/// Replaces `target[property]` with a wrapper that delegates to `replacement`.
///
/// The wrapper, called with receiver `R` and arguments `A`, invokes
/// `replacement` with receiver `R` and arguments `[proceed, List(A)]`.
/// Calling `proceed` with no arguments and an `Undefined` receiver runs the
/// original with `R` and `A`; a non-empty argument list or a defined receiver
/// overrides them.
///
/// The wrapper returns the replacement's own result when it is not
/// `Undefined`, otherwise whatever the last `proceed` call produced, otherwise
/// `Undefined`. Errors from either side propagate untouched.
///
/// # Errors
/// [`Error::InvalidArgument`] when `property` is not text, when the member is
/// absent, or when `replacement` is not a function. Nothing is modified in
/// that case.
pub fn intercept(
    target: &Object,
    property: impl Into<Value>,
    replacement: impl Into<Value>,
) -> Result<Undo> {
    let property = match property.into() {
        Value::Text(name) => name,
        other => {
            return Err(Error::InvalidArgument(format!(
                "intercept expects a member name, got {}",
                other.type_name()
            )))
        }
    };
    let original = target.get(&property);
    if original.is_undefined() {
        return Err(Error::InvalidArgument(format!(
            "only existing members may be intercepted, `{}` is absent",
            property
        )));
    }
    let replacement = match replacement.into() {
        Value::Function(f) => f,
        other => {
            return Err(Error::InvalidArgument(format!(
                "intercept expects a function as replacement, got {}",
                other.type_name()
            )))
        }
    };

    let wrapper = wrap(property.clone(), original.clone(), replacement);
    target.set(property.clone(), wrapper);
    debug!(member = %property, "interception installed");

    Ok(Undo {
        target: target.clone(),
        property,
        original,
    })
}

fn wrap(member: String, original: Value, replacement: Function) -> Function {
    let name = format!("intercepted {}", member);
    Function::named(name, move |receiver, args| {
        trace!(member = %member, args = args.len(), "intercepted call");
        let forwarded: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));

        let proceed = {
            let original = original.clone();
            let bound_receiver = receiver.clone();
            let bound_args = args.to_vec();
            let forwarded = Arc::clone(&forwarded);
            Function::named("proceed", move |this, overrides| {
                let this = if this.is_undefined() {
                    &bound_receiver
                } else {
                    this
                };
                let args = if overrides.is_empty() {
                    &bound_args[..]
                } else {
                    overrides
                };
                let result = original.call(this, args)?;
                *forwarded.lock() = Some(result.clone());
                Ok(result)
            })
        };

        let returned = replacement.call(
            receiver,
            &[Value::Function(proceed), Value::List(args.to_vec())],
        )?;
        if !returned.is_undefined() {
            return Ok(returned);
        }
        let forwarded = forwarded.lock().take();
        Ok(forwarded.unwrap_or_default())
    })
}

/// Restores an intercepted member to the value it held before interception.
///
/// Restoring is idempotent: every call writes the same captured value. When a
/// member is intercepted more than once, each handle restores only the state
/// it observed, so handles must be restored newest first to reach the pristine
/// member.
#[derive(Debug, Clone)]
#[must_use = "dropping an Undo leaves the interception installed"]
pub struct Undo {
    target: Object,
    property: String,
    original: Value,
}

impl Undo {
    /// Writes the captured original back into the target.
    pub fn restore(&self) {
        self.target.set(self.property.clone(), self.original.clone());
        debug!(member = %self.property, "interception restored");
    }

    /// Name of the intercepted member.
    pub fn property(&self) -> &str {
        &self.property
    }

    /// The value that was in place when the interception was installed.
    pub fn original(&self) -> &Value {
        &self.original
    }

    /// The object whose member was replaced.
    pub fn target(&self) -> &Object {
        &self.target
    }

    /// A zero-argument function that restores the member when called.
    pub fn into_function(self) -> Function {
        Function::named("undo", move |_, _| {
            self.restore();
            Ok(Value::Undefined)
        })
    }

    /// Ties the interception to a scope: the member is restored on drop.
    pub fn guard(self) -> InterceptGuard {
        InterceptGuard { undo: Some(self) }
    }
}

/// Restores its interception when dropped.
#[derive(Debug)]
#[must_use = "the interception is restored as soon as the guard is dropped"]
pub struct InterceptGuard {
    undo: Option<Undo>,
}

impl InterceptGuard {
    /// Gives the handle back without restoring, keeping the interception alive.
    pub fn disarm(mut self) -> Undo {
        self.undo
            .take()
            .expect("guard holds its handle until dropped")
    }
}

impl Drop for InterceptGuard {
    fn drop(&mut self) {
        if let Some(undo) = self.undo.take() {
            undo.restore();
        }
    }
}
