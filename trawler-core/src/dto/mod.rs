//! Wire contracts between the coordinator and worker environments
//!
//! These are the boundary types: the invocation response a worker returns,
//! and the report events a worker emits over the heartbeat channel. The
//! invocation payload itself is the serialized
//! [`DispatchPlan`](crate::domain::plan::DispatchPlan).

pub mod invocation;
pub mod report;
