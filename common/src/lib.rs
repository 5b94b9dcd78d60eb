//! Types shared between the upload backend and its clients.

pub mod model;
pub mod requests;
