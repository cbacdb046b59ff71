//! Command-line front end for pallet-classify.
pub mod commands;
pub mod util;
