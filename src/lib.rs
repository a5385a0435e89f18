//! Passage CLI: wires the credential store, the Chrome session
//! provisioner, and the login flow controller together behind a small
//! command surface.

pub mod cli;
pub mod config;
