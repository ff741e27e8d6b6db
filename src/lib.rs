//! Acquisition pipeline for a two-channel ADC streaming node.
//!
//! # Design
//! Samples are collected by two ADCs running in lock-step from a shared
//! sample clock, each filling half of a circular DMA buffer before raising a
//! transfer interrupt. The [capture] stage pairs the two ADCs' half-buffers,
//! interleaves them into fixed-size [frame::Frame]s and hands them across
//! the interrupt/foreground boundary through a bounded SPSC queue. The
//! foreground loop drains the queue with [net::stream::UdpStream], which
//! serializes each frame into one UDP datagram toward the collector.
//!
//! Delivery is strictly best effort: a full queue, a missed half-buffer or a
//! failed send discards data and raises a sticky [frame::DropLatch] so that
//! the next delivered datagram flags the gap to the receiver.
//!
//! The crate is hardware-agnostic. Peripheral bring-up lives behind
//! [pipeline::CaptureDriver] and the `embedded-nal`/`embedded-io` traits, so
//! the whole pipeline also runs under host tests.

#![cfg_attr(not(test), no_std)]

pub mod capture;
pub mod design_parameters;
pub mod frame;
pub mod net;
pub mod pipeline;

pub use capture::{AdcId, DmaHalf, PairedCapture};
pub use frame::{DropLatch, Frame, FLAG_PRECEDING_DROP};
pub use net::stream::UdpStream;
pub use net::StreamTarget;
pub use pipeline::{setup, BringupError, CaptureDriver};
