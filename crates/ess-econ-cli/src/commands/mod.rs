pub mod economics;
pub mod sensitivity;
