#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status counters for the firmware target.
//!
//! Lightweight atomics let the UART task, the capture handlers and the control
//! loop report health without sharing mutable state directly.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};
use rover_core::control::mode::Mode;

/// Bytes lost because the RX queue was full.
static RX_OVERFLOW: AtomicU32 = AtomicU32::new(0);
/// Bytes lost because the TX queue was full.
static TX_DROPPED: AtomicU32 = AtomicU32::new(0);
/// Total ticks skipped by the scheduler.
static TICKS_DROPPED: AtomicU32 = AtomicU32::new(0);
/// Ticks executed.
static TICKS_RUN: AtomicU32 = AtomicU32::new(0);
static AUTONOMOUS: AtomicBool = AtomicBool::new(false);

pub fn record_rx_overflow() {
    RX_OVERFLOW.fetch_add(1, Ordering::Relaxed);
}

pub fn record_tx_dropped() {
    TX_DROPPED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_tick(mode: Mode, dropped: u32) {
    TICKS_RUN.fetch_add(1, Ordering::Relaxed);
    if dropped > 0 {
        TICKS_DROPPED.fetch_add(dropped, Ordering::Relaxed);
    }
    AUTONOMOUS.store(mode.is_autonomous(), Ordering::Relaxed);
}

/// Point-in-time copy of the counters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StatusSnapshot {
    pub mode: Mode,
    pub ticks_run: u32,
    pub ticks_dropped: u32,
    pub rx_overflow: u32,
    pub tx_dropped: u32,
}

#[must_use]
pub fn snapshot() -> StatusSnapshot {
    let mode = if AUTONOMOUS.load(Ordering::Relaxed) {
        Mode::Autonomous
    } else {
        Mode::Manual
    };

    StatusSnapshot {
        mode,
        ticks_run: TICKS_RUN.load(Ordering::Relaxed),
        ticks_dropped: TICKS_DROPPED.load(Ordering::Relaxed),
        rx_overflow: RX_OVERFLOW.load(Ordering::Relaxed),
        tx_dropped: TX_DROPPED.load(Ordering::Relaxed),
    }
}
