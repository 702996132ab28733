pub mod abi;
pub mod merkle;
pub mod signing;
