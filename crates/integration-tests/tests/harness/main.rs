#![allow(unused_crate_dependencies, clippy::panic)]

mod operations;
mod subscriptions;
