pub mod names;
pub mod numerics;
