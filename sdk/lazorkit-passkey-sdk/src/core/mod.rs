pub mod connection;
pub mod constants;
pub mod kora;
pub mod paymaster;
pub mod rpc;
pub mod signer;
pub mod transaction;
