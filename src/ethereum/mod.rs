pub mod abi;
pub mod contract;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod sanitize;
pub mod utils;
