pub mod challenges;
pub mod community;
pub mod generator;
