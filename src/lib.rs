#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub(crate) mod api;
pub mod app;
pub mod classification;
pub mod clients;
pub mod config;
pub mod error;
pub mod evidence;
pub mod observability;
pub mod pipeline;
pub mod schema;
pub mod scoring;
pub mod training;
pub mod util;
