//! # outreach-rs
//!
//! Paced outreach campaigns against a rate-limited action API.
//!
//! A [`engine::CampaignEngine`] drives an ordered queue of work items one at
//! a time: it waits out closed working hours, launches each action, records
//! successes in a durable ledger so they are never repeated, and sleeps a
//! randomized, human-like delay between actions. Runs can be paused,
//! resumed and stopped at any suspension point.

pub mod action;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod ledger;
pub mod model;
pub mod pacing;
pub mod progress;
pub mod schedule;
pub mod telemetry;
