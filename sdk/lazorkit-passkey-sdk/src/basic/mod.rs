pub mod actions;
pub mod proxy;
pub mod wallet;
