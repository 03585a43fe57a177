use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Debug)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'a str,
    pub id: i32,
    pub method: &'a str,
    pub params: Value,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum JsonRpcResponse<T> {
    Success(JsonRpcResponseSuccess<T>),
    Error(JsonRpcResponseError),
}

#[derive(Deserialize, Debug)]
pub struct JsonRpcResponseSuccess<T> {
    pub jsonrpc: String,
    pub id: i32,
    pub result: T,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JsonRpcResponseError {
    pub jsonrpc: Option<String>,
    pub id: Option<i32>,
    pub error: Error,
}

impl JsonRpcResponseError {
    /// Relay error message, whichever shape the relay used.
    pub fn message(&self) -> &str {
        match &self.error {
            Error::Simple(message) => message,
            Error::Detailed(detailed) => &detailed.message,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Error {
    Simple(String),
    Detailed(JsonRpcResponseDetailedError),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JsonRpcResponseDetailedError {
    pub code: i32,
    pub message: String,
}

/// Implementor will provider a builder (of a `#[derive(Builder])` struct) via the static `::builder()` method,
/// rather than forcing the user to import the builder struct itself.
///
/// Usage:
///
/// ```ignore
/// impl_buildable!(Foo, FooBuilder);
/// ```
pub trait Buildable {
    type Builder;

    fn builder() -> Self::Builder;
}

macro_rules! impl_buildable {
    ($type:ty, $builder:ty) => {
        impl Buildable for $type {
            type Builder = $builder;

            fn builder() -> Self::Builder {
                <$builder>::default()
            }
        }
    };
}

impl_buildable!(CallBundleParams, CallBundleParamsBuilder);
impl_buildable!(SendBundleParams, SendBundleParamsBuilder);

mod call_bundle;
mod send_bundle;

pub use call_bundle::*;
pub use send_bundle::*;
