pub mod args;
mod detect;
mod predict;
mod utils;
