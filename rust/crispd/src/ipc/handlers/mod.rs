pub mod assessments;
pub mod core;
pub mod results;
pub mod submissions;
pub mod users;
