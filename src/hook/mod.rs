pub mod swap_hook;

pub use swap_hook::RedemptionHook;
