pub mod fetch;
pub mod launch;
pub mod nodes;
pub mod status;
pub mod wait;
