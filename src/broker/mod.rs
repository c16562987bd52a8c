pub mod bus;
pub mod controller;

pub use bus::{Bus, PublishReport, Registration};
