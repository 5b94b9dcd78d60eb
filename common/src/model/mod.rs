pub mod column;
pub mod datasource;
pub mod history;
pub mod outcome;
