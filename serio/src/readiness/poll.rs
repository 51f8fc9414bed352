//! Timer-driven readiness for devices without a waitable descriptor.

use std::io;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};

use super::{IoHandler, Readiness, settle};
use crate::config::ReadinessMode;

/// Where the current tick is. A tick checks input first, then output, and
/// hands control back to the caller after each event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickStage {
    Idle,
    Read,
    Write,
}

#[derive(Debug)]
pub(crate) struct PollReadiness {
    interval: Interval,
    write_threshold: u32,
    stage: TickStage,
    read_armed: bool,
    write_armed: bool,
}

impl PollReadiness {
    pub(crate) fn new(period: Duration, write_threshold: u32) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::debug!("Polling device every {:?}", period);
        Self {
            interval,
            write_threshold,
            stage: TickStage::Idle,
            read_armed: true,
            write_armed: false,
        }
    }
}

impl Readiness for PollReadiness {
    fn mode(&self) -> ReadinessMode {
        ReadinessMode::Poll
    }

    fn arm_read(&mut self) {
        self.read_armed = true;
    }

    fn disarm_read(&mut self) {
        self.read_armed = false;
    }

    fn arm_write(&mut self) {
        self.write_armed = true;
    }

    fn disarm_write(&mut self) {
        self.write_armed = false;
    }

    fn is_read_armed(&self) -> bool {
        self.read_armed
    }

    fn is_write_armed(&self) -> bool {
        self.write_armed
    }

    fn poll_ready(&mut self, cx: &mut Context<'_>, io: &mut dyn IoHandler) -> Poll<io::Result<()>> {
        loop {
            match self.stage {
                TickStage::Idle => {
                    ready!(self.interval.poll_tick(cx));
                    self.stage = TickStage::Read;
                }
                TickStage::Read => {
                    self.stage = TickStage::Write;
                    if self.read_armed && io.bytes_to_read()? > 0 {
                        return Poll::Ready(settle(io.on_readable()));
                    }
                }
                TickStage::Write => {
                    self.stage = TickStage::Idle;
                    if self.write_armed && io.bytes_to_write()? < self.write_threshold {
                        return Poll::Ready(settle(io.on_writable()));
                    }
                }
            }
        }
    }
}
