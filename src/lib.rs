//! Animations for elements that Turbo page refreshes create, change or remove, plus protection for
//! elements (usually forms with unsaved input) that a refresh must not morph away.
//!
//! See the README for the attribute contract. The engine is attached with [`install`]:
//!
//! ```no_run
//! use turbo_refresh_animations::{install, Config};
//!
//! install(Config::default()).expect("Failed to install refresh animations.").forget();
//! ```

#![doc(html_root_url = "https://docs.rs/turbo-refresh-animations/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod animation;
pub mod classifier;
pub mod config;
pub mod listener;
pub mod orchestrator;
pub mod protection;
pub mod signature;
pub mod timing;
pub mod tracked;
pub mod transition;
pub mod turbo;

pub use config::Config;
pub use orchestrator::Orchestrator;
pub use turbo::{install, Installation};
