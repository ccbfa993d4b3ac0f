//! Live file tree navigator.
//!
//! The filesystem side ([`fs`], [`projection`], [`browser`]) keeps a set of
//! opened folders in sync with the disk and publishes flattened rows. The
//! terminal side ([`app`], [`ui`], [`handler`]) renders those rows and moves
//! a selection over them.

pub mod app;
pub mod browser;
pub mod components;
pub mod config;
pub mod error;
pub mod event;
pub mod fs;
pub mod handler;
pub mod logging;
pub mod navigation;
pub mod projection;
pub mod theme;
pub mod tui;
pub mod ui;
