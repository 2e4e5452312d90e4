// Library surface for the terminal front-end, headless simulation and tests.
pub mod app_dirs;
pub mod catalog;
pub mod celebration;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod game;
pub mod history;
pub mod layout;
pub mod logging;
pub mod runtime;
pub mod scoring;
pub mod simulate;
pub mod stage;
pub mod timer;
pub mod window;

pub use error::{Result, SpotError};
