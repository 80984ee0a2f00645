//! Cryptographic utilities for Auth9 Core

pub mod aes;

pub use aes::{decrypt, encrypt, EncryptionKey};
