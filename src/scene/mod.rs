//! Scene-side types the compositor consumes

mod camera;

pub use camera::*;
