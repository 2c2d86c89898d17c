//! Shared session state and driver loop for the Paddock race control plane.
//!
//! This crate owns the state every other component coordinates on:
//!
//! # Modules
//!
//! - [`session`] -- [`SharedSession`], the lock-guarded session record,
//!   plus admin parameter parsing and the atomic update routine.
//! - [`config`] -- Configuration loading from `paddock-config.yaml` with
//!   environment overrides.
//! - [`runner`] -- The driver loop that reads the session, steps a
//!   [`Simulation`] and publishes tick frames to a [`TickSink`].
//! - [`countdown`] -- [`CountdownSimulation`], the built-in simulation.
//!
//! [`SharedSession`]: session::SharedSession
//! [`Simulation`]: runner::Simulation
//! [`TickSink`]: runner::TickSink
//! [`CountdownSimulation`]: countdown::CountdownSimulation

pub mod config;
pub mod countdown;
pub mod runner;
pub mod session;
