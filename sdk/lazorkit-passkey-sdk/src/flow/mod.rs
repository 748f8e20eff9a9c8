pub mod authorization;
pub mod client;
pub mod nonce;
pub mod provision;
pub mod submitter;
