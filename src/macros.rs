//! Macros shared by all layers of the app: error boilerplate for the
//! `Error { inner: Context<ErrorKind> }` pattern, error context chaining
//! and diesel newtype plumbing.

/// Chains failure contexts onto an error and converts it into the
/// `Error` type that is in scope at the call site. The last context is
/// expected to be the layer's `ErrorKind`.
///
/// Forms:
/// * `ectx!(err e, ctx1, ..., kind)` - wrap the error `e` right away
/// * `ectx!(ctx1, ..., kind)` - closure for `map_err`
/// * `ectx!(convert => args...)` - closure converting a lower layer error
///   into this layer via `ErrorKind::from(e.kind())`
///
/// Every form also accepts a leading `try` marker so call sites read the
/// same whether the result is propagated with `?` or returned directly.
macro_rules! ectx {
    (try err $e:expr $(, $ctx:expr)* $(,)*) => {
        ectx!(err $e $(, $ctx)*)
    };
    (err $e:expr $(, $ctx:expr)* $(,)*) => {{
        let e = $e;
        $(let e = ::failure::Fail::context(e, $ctx);)*
        Error::from(e)
    }};
    (try convert => $($arg:expr),+ $(,)*) => {
        ectx!(convert => $($arg),+)
    };
    (try convert) => {
        ectx!(convert)
    };
    (convert => $($arg:expr),+ $(,)*) => {
        move |e| {
            let kind = ErrorKind::from(e.kind());
            let args = format!("context: {:?}", ($(&$arg,)+));
            Error::from(::failure::Fail::context(::failure::Fail::context(e, args), kind))
        }
    };
    (convert) => {
        move |e| {
            let kind = ErrorKind::from(e.kind());
            Error::from(::failure::Fail::context(e, kind))
        }
    };
    (try $($ctx:expr),+ $(,)*) => {
        ectx!($($ctx),+)
    };
    ($($ctx:expr),+ $(,)*) => {
        move |e| {
            $(let e = ::failure::Fail::context(e, $ctx);)+
            Error::from(e)
        }
    };
}

/// Implements the boilerplate for a layer error defined as
/// `pub struct Error { inner: Context<ErrorKind> }`. The calling module is
/// expected to have `failure::{Backtrace, Context, Fail}` and `std::fmt`
/// in scope.
macro_rules! derive_error_impls {
    () => {
        #[allow(dead_code)]
        impl Error {
            pub fn kind(&self) -> ErrorKind {
                self.inner.get_context().clone()
            }
        }

        impl Fail for Error {
            fn cause(&self) -> Option<&Fail> {
                self.inner.cause()
            }

            fn backtrace(&self) -> Option<&Backtrace> {
                self.inner.backtrace()
            }
        }

        impl fmt::Display for Error {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Display::fmt(&self.inner, f)
            }
        }

        impl From<ErrorKind> for Error {
            fn from(kind: ErrorKind) -> Error {
                Error {
                    inner: Context::new(kind),
                }
            }
        }

        impl From<Context<ErrorKind>> for Error {
            fn from(inner: Context<ErrorKind>) -> Error {
                Error { inner }
            }
        }
    };
}

/// Forwards diesel `FromSql` / `ToSql` of a newtype to its inner type.
macro_rules! newtype_from_to_sql {
    ($sql_type:ty, $t:ty, $constructor:path) => {
        impl ::diesel::deserialize::FromSql<$sql_type, ::diesel::pg::Pg> for $t {
            fn from_sql(data: Option<&[u8]>) -> ::diesel::deserialize::Result<Self> {
                <_ as ::diesel::deserialize::FromSql<$sql_type, ::diesel::pg::Pg>>::from_sql(data).map($constructor)
            }
        }

        impl ::diesel::serialize::ToSql<$sql_type, ::diesel::pg::Pg> for $t {
            fn to_sql<W: ::std::io::Write>(
                &self,
                out: &mut ::diesel::serialize::Output<W, ::diesel::pg::Pg>,
            ) -> ::diesel::serialize::Result {
                <_ as ::diesel::serialize::ToSql<$sql_type, ::diesel::pg::Pg>>::to_sql(&self.0, out)
            }
        }
    };
}
