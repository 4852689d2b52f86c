//! SEWNA custom requests: the request wizard, the design-brief generators it
//! drives and the HTTP surface the front-end talks to.

pub mod brief;
pub mod config;
pub mod designers;
pub mod error;
pub mod gemini;
pub mod mock;
pub mod models;
pub mod routes;
pub mod submitter;
pub mod wizard;
