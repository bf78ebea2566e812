pub mod filter;
pub mod score;
pub mod search;
pub mod suggest;
