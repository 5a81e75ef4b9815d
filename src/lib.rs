//! **resetwall**: a controller for many concurrently running game
//! instances used in speedrun resetting.
//!
//! The daemon discovers instance processes, tracks the lifecycle state each
//! one publishes in a small file, resizes their windows on demand and
//! decides which instance to reset and which one to focus next.
//!
//! # Architecture
//!
//! The crate is organised around the traits in [`traits`]:
//!
//! * [`traits::ProcessSource`], [`traits::StateReader`],
//!   [`traits::WindowBackend`], [`traits::InputInjector`] and
//!   [`traits::GeometryRpc`] abstract the operating system so the
//!   orchestration logic is not coupled to `/proc`, X11 or TCP.
//! * [`traits::CommandSource`] abstracts the transport that delivers
//!   hotkeys, wall gestures and timer ticks, so the main loop is not
//!   coupled to any specific IPC mechanism.
//!
//! Commands flow through the [`router::KeyEventRouter`] into the
//! [`orchestrator::ResetOrchestrator`], which owns the
//! [`registry::InstanceRegistry`].  Concrete backends live in [`platform`]
//! and [`ipc`].

pub mod command;
pub mod config;
pub mod geometry;
pub mod instance;
pub mod ipc;
pub mod orchestrator;
pub mod platform;
pub mod registry;
pub mod router;
pub mod state;
pub mod traits;
