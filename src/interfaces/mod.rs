pub mod mirror;
pub mod outbound;
