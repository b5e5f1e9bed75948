//! Callable identity
//!
//! Derives a stable 64-character hex key from a description of a callable,
//! so `throttle` and `debounce` can group calls without an explicit key.

use std::any::{TypeId, type_name};

use sha2::{Digest, Sha256};
use tracing::debug;

/// What can be learned about a callable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callable {
    /// A closure; its type is unique to the source location defining it
    Closure { type_name: &'static str, type_id: TypeId },

    /// A named free function
    Function { name: String },

    /// A method bound to a specific receiver
    Method {
        type_name: String,
        instance: usize,
        method: String,
    },

    /// An associated function of a type
    Static { type_name: String, method: String },

    /// Nothing stable can be derived (fn pointers, trait objects)
    Opaque,
}

impl Callable {
    /// Describe `f` from its type
    ///
    /// Closures map to [`Callable::Closure`], fn items to
    /// [`Callable::Function`] named by their path, and erased callables
    /// (fn pointers, `dyn Fn`) to [`Callable::Opaque`].
    pub fn of<F: 'static>(_f: &F) -> Self {
        let name = type_name::<F>();
        if name.contains("{{closure}}") {
            Callable::Closure {
                type_name: name,
                type_id: TypeId::of::<F>(),
            }
        } else if is_erased(name) {
            Callable::Opaque
        } else {
            Callable::Function { name: name.to_string() }
        }
    }

    /// A named free function
    pub fn function(name: impl Into<String>) -> Self {
        Callable::Function { name: name.into() }
    }

    /// A method `method` bound to `receiver`
    pub fn method<R: ?Sized>(receiver: &R, method: impl Into<String>) -> Self {
        Callable::Method {
            type_name: type_name::<R>().to_string(),
            instance: receiver as *const R as *const () as usize,
            method: method.into(),
        }
    }

    /// An associated function `method` of `R`
    pub fn static_method<R: ?Sized>(method: impl Into<String>) -> Self {
        Callable::Static {
            type_name: type_name::<R>().to_string(),
            method: method.into(),
        }
    }

    fn fingerprint(&self) -> String {
        match self {
            Callable::Closure { type_name, type_id } => format!("{}|{:?}", type_name, type_id),
            Callable::Function { name } => name.clone(),
            Callable::Method {
                type_name,
                instance,
                method,
            } => format!("{}@{:#x}@{}", type_name, instance, method),
            Callable::Static { type_name, method } => format!("{}@{}", type_name, method),
            Callable::Opaque => format!("{:032x}|{:032x}", rand::random::<u128>(), rand::random::<u128>()),
        }
    }
}

fn is_erased(name: &str) -> bool {
    let name = name.trim_start_matches('&');
    name.starts_with("fn(")
        || name.starts_with("unsafe ")
        || name.starts_with("extern ")
        || name.contains("dyn ")
}

/// Derive the key for a callable
///
/// Deterministic for every variant except [`Callable::Opaque`], which hashes
/// fresh randomness and never matches any other derivation.
pub fn identity(callable: &Callable) -> String {
    let key = format!("{:x}", Sha256::digest(callable.fingerprint().as_bytes()));
    debug!(?callable, %key, "identity: derived");
    key
}

/// Derive the key for `f` from its type
pub fn identity_of<F: 'static>(f: &F) -> String {
    identity(&Callable::of(f))
}
