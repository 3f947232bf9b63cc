pub mod coordinator;
pub mod dispatch;
pub mod errors;
pub mod intent;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod tools;
