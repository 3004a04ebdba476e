pub mod repeating;

pub use repeating::RepeatingTask;
