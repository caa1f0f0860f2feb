//! `rover-hal` – image sources that feed the perception pipeline.
//!
//! - [`camera`] – the [`Camera`] trait and the raw [`CameraFrame`] it yields.
//! - [`sim`] – [`SimCamera`] synthetic terrain and the [`SimDrive`] pose
//!   generator.
//! - [`file`] – [`ImageFileCamera`], replaying a still image from disk.

pub mod camera;
pub mod file;
pub mod sim;

pub use camera::{Camera, CameraFrame};
pub use file::ImageFileCamera;
pub use sim::{SimCamera, SimDrive};
