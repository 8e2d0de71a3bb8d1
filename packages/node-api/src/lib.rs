//! Request and response types for the OntoWeft node API.
//!
//! Every body the node reads or writes is defined here, so the node, the
//! CLI's remote mode and the conformance suite agree on one wire contract.
//!
//! # Endpoints covered
//!
//! | Method | Path | Type |
//! |--------|------|------|
//! | GET | `/cypher/resolve` | [`ResolveQuery`] → `text/plain` |
//! | GET | `/cypher/curies` | → [`CurieMap`] |
//! | POST | `/cypher/curies/reload` | → [`CurieMap`] |
//! | GET | `/cypher/entities` | [`EntitiesQuery`] → [`EntitiesResponse`] |
//! | POST | `/categories/closure` | [`ClosureRequest`] → [`ClosureResponse`] |
//! | GET | `/health` | → [`HealthResponse`] |

pub mod category;
pub mod cypher;
pub mod error;
pub mod health;

pub use category::{CategoryOutcome, ClosureRequest, ClosureResponse};
pub use cypher::{CurieMap, EntitiesQuery, EntitiesResponse, ResolveQuery};
pub use error::ErrorResponse;
pub use health::HealthResponse;
