//! Concrete adapter implementations for `dialog_core`'s capability traits:
//! a rig-core-backed [`oracle::RigLlmOracle`], an Amazon PA-API-backed
//! [`pricing::AmazonPaapiPriceProvider`], and a [`store::JsonFileSessionStore`].
//! None of this crate's logic participates in the policy decision — it only
//! ever fills [`dialog_core::adapters::NluUpdate`] candidates or persists a
//! blob, per the core/adapter split in the distilled spec's §6.

pub mod config;
pub mod oracle;
pub mod pricing;
pub mod prompts;
pub mod store;

pub use config::AgentConfig;
pub use oracle::RigLlmOracle;
pub use pricing::{build_price_provider, AmazonPaapiPriceProvider};
pub use store::JsonFileSessionStore;
