//! beamswarm: decentralized swarm construction of beam lattices.
//!
//! A swarm of identical agents walks over a growing lattice of rigid beams,
//! carrying beams up from a home area and attaching them near the top of the
//! structure. Each agent only senses beams close to it and consults a
//! structural-analysis oracle before stepping onto a member.
//!
//! ## Layout
//!
//! - [`geometry`] - vector kernel for points and segments
//! - [`beam`] - beams, endpoints and joints
//! - [`structure`] - the shared structure and its cell index
//! - [`oracle`] - structural-analysis backends
//! - [`agent`] - per-agent decisions, movement and beam placement
//! - [`swarm`] - the two-phase tick scheduler
//! - [`report`], [`log`] - run output written outside the core

pub mod agent;
pub mod beam;
pub mod config;
pub mod error;
pub mod geometry;
pub mod log;
pub mod oracle;
pub mod report;
pub mod shutdown;
pub mod structure;
pub mod swarm;
#[doc(hidden)]
pub mod testutil;
