//! # Typed Interfaces
//!
//! `remote_interface!` gives a contract a Rust face. From one declaration it
//! generates:
//!
//! - an async trait, one method per remote method, each returning
//!   `Result<T, Fault>`;
//! - a typed stub implementing that trait by forwarding through a `Stub`;
//! - a dispatcher wrapping any implementation of the trait as a
//!   `RemoteObject`, ready to be bound to a `Skeleton`.
//!
//! Parameter and return types must implement `RemoteValue`; their
//! descriptors make up the contract. Each method lists its failure set
//! explicitly, and a method that leaves out `REMOTE_FAILURE` produces a
//! contract every stub and skeleton constructor rejects.
//!
//! ```ignore
//! use rmi::REMOTE_FAILURE;
//!
//! rmi::remote_interface! {
//!     pub trait Echo as "demo.Echo" {
//!         fn echo(s: Option<String>) throws [REMOTE_FAILURE] -> Option<String>;
//!     }
//!     stub EchoStub;
//!     dispatcher EchoDispatcher;
//! }
//!
//! struct Parrot;
//!
//! #[rmi::async_trait]
//! impl Echo for Parrot {
//!     async fn echo(&self, s: Option<String>) -> Result<Option<String>, rmi::Fault> {
//!         Ok(s)
//!     }
//! }
//!
//! let skeleton = EchoDispatcher::new(Parrot).skeleton()?;
//! skeleton.start().await?;
//! let stub = EchoStub::from_skeleton(&skeleton).await?;
//! assert_eq!(stub.echo(Some("ping".into())).await?, Some("ping".into()));
//! ```

use crate::contract::ServiceContract;

/// Implemented by the typed stubs `remote_interface!` generates.
pub trait RemoteInterface {
    /// Fully qualified interface name.
    const NAME: &'static str;

    /// The contract described by the declaration. Not validated.
    fn contract() -> ServiceContract;
}

#[macro_export]
macro_rules! remote_interface {
    (
        $(#[$meta:meta])*
        $vis:vis trait $trait:ident as $iface:literal {
            $(
                $(#[$mmeta:meta])*
                fn $method:ident ( $( $arg:ident : $argty:ty ),* $(,)? )
                    throws [ $( $throws:expr ),* $(,)? ]
                    -> $ret:ty;
            )*
        }
        stub $stub:ident;
        dispatcher $dispatcher:ident;
    ) => {
        $(#[$meta])*
        #[$crate::async_trait]
        $vis trait $trait: ::std::marker::Send + ::std::marker::Sync + 'static {
            $(
                $(#[$mmeta])*
                async fn $method(&self, $( $arg: $argty ),*) -> ::std::result::Result<$ret, $crate::Fault>;
            )*
        }

        #[doc = concat!("Typed stub for `", $iface, "`.")]
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        $vis struct $stub {
            inner: $crate::Stub,
        }

        impl $crate::RemoteInterface for $stub {
            const NAME: &'static str = $iface;

            fn contract() -> $crate::ServiceContract {
                $crate::ServiceContract::interface($iface)
                $(
                    .method(
                        $crate::MethodSignature::new(stringify!($method))
                        $( .param(<$argty as $crate::RemoteValue>::value_type()) )*
                        .returns(<$ret as $crate::RemoteValue>::value_type())
                        $( .throws($throws) )*
                    )
                )*
            }
        }

        #[allow(dead_code)]
        impl $stub {
            pub fn connect(address: $crate::RemoteAddress) -> $crate::Result<Self> {
                let contract = <Self as $crate::RemoteInterface>::contract();
                Ok(Self { inner: $crate::Stub::new(contract, address)? })
            }

            pub async fn from_skeleton(skeleton: &$crate::Skeleton) -> $crate::Result<Self> {
                Self::from_stub($crate::Stub::from_skeleton(skeleton).await?)
            }

            pub async fn from_skeleton_with_host(
                skeleton: &$crate::Skeleton,
                host: &str,
            ) -> $crate::Result<Self> {
                Self::from_stub($crate::Stub::from_skeleton_with_host(skeleton, host).await?)
            }

            /// Wraps an untyped stub, which must carry this interface's contract.
            pub fn from_stub(stub: $crate::Stub) -> $crate::Result<Self> {
                let expected = <Self as $crate::RemoteInterface>::contract();
                if stub.contract() != &expected {
                    return Err($crate::ContractError::Mismatch {
                        expected: expected.name().to_string(),
                        found: stub.contract().name().to_string(),
                    }.into());
                }
                Ok(Self { inner: stub })
            }

            pub fn with_config(self, config: $crate::StubConfig) -> Self {
                Self { inner: self.inner.with_config(config) }
            }

            pub fn stub(&self) -> &$crate::Stub {
                &self.inner
            }

            pub fn into_stub(self) -> $crate::Stub {
                self.inner
            }
        }

        impl ::std::fmt::Display for $stub {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.inner, f)
            }
        }

        #[$crate::async_trait]
        impl $trait for $stub {
            $(
                async fn $method(&self, $( $arg: $argty ),*) -> ::std::result::Result<$ret, $crate::Fault> {
                    let args = ::std::vec![ $( $crate::RemoteValue::into_value($arg) ),* ];
                    let value = self.inner.invoke(stringify!($method), args).await?;
                    <$ret as $crate::RemoteValue>::from_value(value).map_err($crate::Fault::from)
                }
            )*
        }

        #[doc = concat!("Serves an implementation of `", stringify!($trait), "` through a skeleton.")]
        $vis struct $dispatcher<T>(pub T);

        #[allow(dead_code)]
        impl<T: $trait> $dispatcher<T> {
            pub fn new(object: T) -> Self {
                Self(object)
            }

            /// A stopped skeleton serving this object on an ephemeral port.
            pub fn skeleton(self) -> $crate::Result<$crate::Skeleton> {
                $crate::Skeleton::new(<$stub as $crate::RemoteInterface>::contract(), self)
            }

            pub fn skeleton_at(self, address: $crate::RemoteAddress) -> $crate::Result<$crate::Skeleton> {
                $crate::Skeleton::at(<$stub as $crate::RemoteInterface>::contract(), self, address)
            }
        }

        #[$crate::async_trait]
        impl<T: $trait> $crate::RemoteObject for $dispatcher<T> {
            #[allow(unused_mut, unused_variables)]
            async fn dispatch(
                &self,
                method: &$crate::MethodSignature,
                args: ::std::vec::Vec<$crate::Value>,
            ) -> ::std::result::Result<$crate::Value, $crate::Fault> {
                let mut args = args.into_iter();
                $(
                    if method.name() == stringify!($method) {
                        $(
                            let $arg = match args.next() {
                                Some(value) => <$argty as $crate::RemoteValue>::from_value(value)
                                    .map_err(|e| $crate::Fault::bad_arguments(e.to_string()))?,
                                None => {
                                    return Err($crate::Fault::bad_arguments(
                                        concat!("missing argument ", stringify!($arg)),
                                    ));
                                }
                            };
                        )*
                        let result = <T as $trait>::$method(&self.0, $( $arg ),*).await?;
                        return Ok($crate::RemoteValue::into_value(result));
                    }
                )*
                Err($crate::Fault::no_such_method(::std::format!(
                    "{} has no method {}",
                    $iface,
                    method.name()
                )))
            }
        }
    };
}
