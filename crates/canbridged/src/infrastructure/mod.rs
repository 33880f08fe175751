//! Infrastructure layer for the daemon.
//!
//! Contains the OS-facing adapters: the broadcast-manager bus channel, the
//! TCP listener and beacon sockets, and configuration file storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `canbridge_core`, but MUST NOT be imported by the protocol or domain
//! code in `canbridge-core`.

pub mod bus;
pub mod network;
pub mod storage;
