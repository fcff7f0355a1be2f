pub mod policies;
pub mod resolve;
