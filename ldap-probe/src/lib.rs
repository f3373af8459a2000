#![forbid(unsafe_code)]

pub use self::client::run_add;
pub use self::client::run_delete;
pub use self::client::run_modify;
pub use self::client::run_search;
pub use self::client::SearchResponse;
pub use self::client::Session;
pub use self::client::WriteResponse;
pub use self::connection::Connection;
pub use self::connection::Deadline;
pub use self::connection::OriginGate;
pub use self::error::Error;
pub use self::params::AddParams;
pub use self::params::ConnectParams;
pub use self::params::DeleteParams;
pub use self::params::ModifyChange;
pub use self::params::ModifyOp;
pub use self::params::ModifyParams;
pub use self::params::Scope;
pub use self::params::SearchParams;
pub use self::parse::LdapResult;
pub use self::parse::SearchEntry;

pub mod ber;
pub mod message;
pub mod spec;
pub mod util;

mod client;
mod connection;
mod controls;
mod error;
mod frame;
mod params;
mod parse;

#[cfg(feature = "json")]
mod client_json;

#[cfg(test)]
mod tests;
