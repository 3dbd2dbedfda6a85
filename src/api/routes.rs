pub mod failure;
pub mod greeting;
pub mod health;
