pub mod intents;
pub mod roots;
