pub mod catalog;
pub mod code_service;
pub mod content;
pub mod error;
pub mod extraction;
pub mod locator;
pub mod sandbox;
pub mod tree;
pub mod unpack;
