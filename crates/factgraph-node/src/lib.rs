pub mod facade;

pub use facade::FactGraphCore;
