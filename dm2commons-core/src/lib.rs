#![doc = "dm2commons-core: core logic library for dm2commons."]

//! This crate contains the domain logic for bridging Digitalt Museum artifacts to
//! Wikimedia Commons: fetching artifact records, carrying them through session state,
//! the OAuth1 handshake, and the upload protocol.
//!
//! # Usage
//! The CLI crate supplies a concrete [`contract::CommonsTransport`] and drives the
//! steps in [`flow`]. Tests substitute the mockall mocks from [`contract`].

pub mod artifact;
pub mod config;
pub mod contract;
pub mod error;
pub mod flow;
pub mod handshake;
pub mod metadata;
pub mod oauth;
pub mod session;
pub mod source;
pub mod upload;
