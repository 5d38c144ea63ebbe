pub mod check;
pub mod config;
pub mod load;
pub mod plan;
pub mod report;
pub mod run;
