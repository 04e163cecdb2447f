pub mod events;
pub mod leagues;
pub mod mappings;
pub mod matches;
pub mod sports;
pub mod state;
pub mod stats;
pub mod teams;
