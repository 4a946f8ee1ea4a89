pub mod consultation;
pub mod health;
pub mod launch;
