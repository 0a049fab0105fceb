//! huewash: tint a base image with a picked color under a blend mode.

#[macro_use]
pub mod i18n;
pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod generate;
pub mod io;
pub mod logger;
pub mod session;
pub mod settings;
