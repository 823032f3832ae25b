//! Cache key derivation
//!
//! A key is a short digest of the call site and an optional discriminator,
//! optionally namespaced by a prefix:
//!
//! ```text
//! <prefix>_<digest>    e.g. balance_3fa9c1
//! <digest>             e.g. 3fa9c1
//! ```
//!
//! The digest is truncated to [`DIGEST_LEN`] hex characters (24 bits), so two
//! different call sites can collide once a few thousand entries exist. A
//! collision serves one call site's value to another.

use std::borrow::Cow;
use std::fmt;
use std::panic::Location;

use sha2::{Digest, Sha256};

/// Hex characters of the digest kept in the key.
pub const DIGEST_LEN: usize = 6;

/// Text hashed in place of an absent discriminator.
const NIL_MARKER: &str = "nil";

/// Where in the source a cached computation is invoked.
///
/// Moving the invocation (or editing lines above it) changes the fingerprint
/// and orphans the entries written under the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
    /// Path of the enclosing function, when known.
    pub function: Option<&'static str>,
}

impl CallSite {
    pub const fn new(file: &'static str, line: u32, column: u32) -> Self {
        Self {
            file,
            line,
            column,
            function: None,
        }
    }

    pub const fn with_function(mut self, function: &'static str) -> Self {
        self.function = Some(function);
        self
    }

    /// The location of whoever called the surrounding `#[track_caller]` fn.
    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }

    /// Bare name of the enclosing function, e.g. `balance` for
    /// `my_crate::Ledger::balance`.
    pub fn function_name(&self) -> Option<&'static str> {
        self.function.map(last_segment).filter(|name| !name.is_empty())
    }
}

impl From<&'static Location<'static>> for CallSite {
    fn from(location: &'static Location<'static>) -> Self {
        Self::new(location.file(), location.line(), location.column())
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Capture the current [`CallSite`], including the enclosing function.
///
/// ```
/// use callsite_cache::{CallSite, call_site};
///
/// fn lookup() -> CallSite {
///     call_site!()
/// }
///
/// assert_eq!(lookup().function_name(), Some("lookup"));
/// ```
#[macro_export]
macro_rules! call_site {
    () => {{
        fn __call_site() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::CallSite::new(file!(), line!(), column!()).with_function(
            $crate::key::enclosing_function(__type_name_of(__call_site)),
        )
    }};
}

/// Strip the marker fn and any closure/async frames from the path of a fn
/// item declared by [`call_site!`].
#[doc(hidden)]
pub fn enclosing_function(marker_path: &'static str) -> &'static str {
    let mut path = marker_path
        .strip_suffix("::__call_site")
        .unwrap_or(marker_path);
    while let Some(outer) = path.strip_suffix("::{{closure}}") {
        path = outer;
    }
    path
}

/// Namespace prepended to a derived key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Prefix {
    #[default]
    None,
    Literal(Cow<'static, str>),
    /// Name of the function the call site sits in.
    CallerMethod,
    /// Type name of the receiver set on the fetch options.
    ReceiverType,
}

impl Prefix {
    pub fn literal(prefix: impl Into<Cow<'static, str>>) -> Self {
        Prefix::Literal(prefix.into())
    }

    /// Resolve to the text placed before `_`, if any.
    pub fn resolve<'a>(&'a self, site: &CallSite, receiver: Option<&'a str>) -> Option<&'a str> {
        match self {
            Prefix::None => None,
            Prefix::Literal(prefix) => Some(prefix.as_ref()),
            Prefix::CallerMethod => site.function_name(),
            Prefix::ReceiverType => receiver.map(short_type_name),
        }
    }
}

impl From<&'static str> for Prefix {
    fn from(prefix: &'static str) -> Self {
        Prefix::literal(prefix)
    }
}

impl From<String> for Prefix {
    fn from(prefix: String) -> Self {
        Prefix::literal(prefix)
    }
}

/// `my_crate::ledger::Ledger<u64>` -> `Ledger`
pub fn short_type_name(type_name: &str) -> &str {
    let without_generics = type_name.split('<').next().unwrap_or(type_name);
    last_segment(without_generics)
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Truncated hex digest of the discriminator and call site.
pub fn digest(discriminator: Option<&str>, site: &CallSite) -> String {
    let mut hasher = Sha256::new();
    hasher.update(discriminator.unwrap_or(NIL_MARKER).as_bytes());
    hasher.update(site.to_string().as_bytes());
    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(DIGEST_LEN);
    hex
}

/// Build the full cache key.
///
/// `discriminator` is the canonical text of the caller's value (see
/// [`canonical_discriminator`]); `receiver` is a type name used by
/// [`Prefix::ReceiverType`].
pub fn build_key(
    discriminator: Option<&str>,
    prefix: &Prefix,
    site: &CallSite,
    receiver: Option<&str>,
) -> String {
    let body = digest(discriminator, site);
    match prefix.resolve(site, receiver) {
        Some(prefix) => format!("{}_{}", prefix, body),
        None => body,
    }
}

/// Canonical text of a discriminator value: its `Debug` rendering.
pub fn canonical_discriminator<D: fmt::Debug + ?Sized>(discriminator: &D) -> String {
    format!("{:?}", discriminator)
}
