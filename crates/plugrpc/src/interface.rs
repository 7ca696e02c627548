//! # Interfaces
//!
//! One shared declaration per RPC-reachable interface, two implementations:
//!
//! - the real one, registered on the side that owns the state;
//! - a generated proxy on the other side, which turns every method call into a frame.
//!
//! `rpc_interface!` produces the trait, the proxy struct, a dispatcher that routes
//! incoming `(method, args)` pairs to a trait object, and the `Interface` impl that ties
//! them to a `ProxyIdentifier`.
//!
//! ## Architecture
//!
//! - **Requests** are `async` and return `CallResult<T>`. The caller awaits the reply.
//! - **Notifications** are plain methods returning `()`. They are fire-and-forget and are
//!   delivered in send order relative to every other frame on the channel.
//! - The wire method name is the Rust method name with a `$` prefix
//!   (`create_terminal` travels as `$create_terminal`).

use std::sync::Arc;

use serde_json::Value;

use crate::error::CallResult;

/// Something that can answer calls addressed to one proxy id.
#[async_trait::async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, method: &str, args: Vec<Value>) -> CallResult<Value>;

    /// Runs synchronously on the receiving pump so that notifications keep their order.
    fn notify(&self, method: &str, args: Vec<Value>) -> CallResult<()>;
}

/// The sending half a proxy talks to. Implemented by the connection.
#[async_trait::async_trait]
pub trait Remote: Send + Sync + 'static {
    async fn call(&self, proxy_id: &str, method: &str, args: Vec<Value>) -> CallResult<Value>;

    fn notify(&self, proxy_id: &str, method: &str, args: Vec<Value>);
}

/// Ties an interface trait object to its generated proxy and dispatcher.
///
/// Implemented by `rpc_interface!` for `dyn Trait`.
pub trait Interface: Send + Sync + 'static {
    fn proxy(remote: Arc<dyn Remote>, proxy_id: &'static str) -> Arc<Self>;

    fn handler(instance: Arc<Self>, proxy_id: &'static str) -> Arc<dyn Handler>;
}

/// Declares an RPC interface.
///
/// ```ignore
/// plugrpc::rpc_interface! {
///     pub trait TerminalServiceMain: proxy TerminalServiceMainProxy, dispatch TerminalServiceMainDispatch {
///         requests {
///             fn create_terminal(&self, options: TerminalCreationOptions) -> u64;
///         }
///         notifications {
///             fn send_text(&self, id: u64, text: String, add_new_line: bool);
///         }
///     }
/// }
/// ```
#[macro_export]
macro_rules! rpc_interface {
    (
        $(#[$meta:meta])*
        $vis:vis trait $name:ident: proxy $proxy:ident, dispatch $dispatch:ident {
            requests {
                $(
                    $(#[$rmeta:meta])*
                    fn $rname:ident(&self $(, $rarg:ident: $rty:ty)*) -> $rret:ty;
                )*
            }
            notifications {
                $(
                    $(#[$nmeta:meta])*
                    fn $nname:ident(&self $(, $narg:ident: $nty:ty)*);
                )*
            }
        }
    ) => {
        $(#[$meta])*
        #[$crate::async_trait]
        $vis trait $name: Send + Sync + 'static {
            $(
                $(#[$rmeta])*
                async fn $rname(&self $(, $rarg: $rty)*) -> $crate::CallResult<$rret>;
            )*
            $(
                $(#[$nmeta])*
                fn $nname(&self $(, $narg: $nty)*);
            )*
        }

        #[derive(Clone)]
        $vis struct $proxy {
            remote: ::std::sync::Arc<dyn $crate::Remote>,
            proxy_id: &'static str,
        }

        impl $proxy {
            pub fn new(remote: ::std::sync::Arc<dyn $crate::Remote>, proxy_id: &'static str) -> Self {
                Self { remote, proxy_id }
            }
        }

        #[$crate::async_trait]
        impl $name for $proxy {
            $(
                async fn $rname(&self $(, $rarg: $rty)*) -> $crate::CallResult<$rret> {
                    let method = concat!("$", stringify!($rname));
                    let args = $crate::codec::ArgsEncoder::new()$(.push(&$rarg))*.finish()?;
                    let value = $crate::Remote::call(&*self.remote, self.proxy_id, method, args).await?;
                    $crate::codec::from_result(method, value)
                }
            )*
            $(
                fn $nname(&self $(, $narg: $nty)*) {
                    let method = concat!("$", stringify!($nname));
                    match $crate::codec::ArgsEncoder::new()$(.push(&$narg))*.finish() {
                        Ok(args) => $crate::Remote::notify(&*self.remote, self.proxy_id, method, args),
                        Err(e) => $crate::__tracing::warn!(
                            proxy = self.proxy_id,
                            method,
                            error = %e,
                            "dropping notification with unencodable arguments"
                        ),
                    }
                }
            )*
        }

        $vis struct $dispatch {
            proxy_id: &'static str,
            instance: ::std::sync::Arc<dyn $name>,
        }

        #[$crate::async_trait]
        impl $crate::Handler for $dispatch {
            async fn call(
                &self,
                method: &str,
                args: ::std::vec::Vec<$crate::Value>,
            ) -> $crate::CallResult<$crate::Value> {
                $(
                    if method == concat!("$", stringify!($rname)) {
                        #[allow(unused_mut)]
                        let mut decoder = $crate::codec::ArgsDecoder::new(method, args);
                        $( let $rarg: $rty = decoder.read()?; )*
                        let result: $rret = self.instance.$rname($($rarg),*).await?;
                        return $crate::codec::to_result(&result);
                    }
                )*
                $crate::Handler::notify(self, method, args)?;
                Ok($crate::Value::Null)
            }

            fn notify(
                &self,
                method: &str,
                args: ::std::vec::Vec<$crate::Value>,
            ) -> $crate::CallResult<()> {
                $(
                    if method == concat!("$", stringify!($nname)) {
                        #[allow(unused_mut)]
                        let mut decoder = $crate::codec::ArgsDecoder::new(method, args);
                        $( let $narg: $nty = decoder.read()?; )*
                        self.instance.$nname($($narg),*);
                        return Ok(());
                    }
                )*
                let _ = args;
                Err($crate::FailureReason::MethodNotFound {
                    proxy: self.proxy_id.to_string(),
                    method: method.to_string(),
                })
            }
        }

        impl $crate::Interface for dyn $name {
            fn proxy(
                remote: ::std::sync::Arc<dyn $crate::Remote>,
                proxy_id: &'static str,
            ) -> ::std::sync::Arc<Self> {
                ::std::sync::Arc::new($proxy { remote, proxy_id })
            }

            fn handler(
                instance: ::std::sync::Arc<Self>,
                proxy_id: &'static str,
            ) -> ::std::sync::Arc<dyn $crate::Handler> {
                ::std::sync::Arc::new($dispatch { proxy_id, instance })
            }
        }
    };
}
