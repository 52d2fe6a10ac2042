// Portions copyright (c) University of Delaware 1992-2015 under the NTP license
//
// Permission to use, copy, modify, and distribute this software and its documentation for any
// purpose with or without fee is hereby granted, provided that the above copyright notice appears
// in all copies and that both the copyright notice and this permission notice appear in supporting
// documentation, and that the name University of Delaware not be used in advertising or publicity
// pertaining to distribution of the software without specific, written prior permission. The
// University of Delaware makes no representations about the suitability this software for any
// purpose. It is provided "as is" without express or implied warranty.

use crate::pps::ioctl;
use crate::pps::Pps;

use std::ops::Deref;

use thiserror::Error;

use tokio::sync::watch;

const MIN_CHANGES: u32 = 12;
const MIN_CLOCK_INCREMENT: u32 = 86;

#[derive(Debug, Error)]
#[error("PPS {0} stopped before precision could be measured")]
pub struct PrecisionError(String);

/// Measures the resolution of the clock behind a PPS source.
#[derive(Default)]
pub struct Precision {}

impl Precision {
    pub fn new() -> Self {
        Precision {}
    }

    /// Calculate precision for `pps`.
    ///
    /// This will capture at least `MIN_CHANGES` samples and calculate the measurement precision
    /// for that PPS device.
    pub async fn once(&self, pps: &Pps) -> Result<i32, PrecisionError> {
        let (sender, mut receiver) = watch::channel(0.0);

        let task = tokio::spawn(measure_ticks(pps.edges(), sender));

        let changed = receiver.changed().await;
        task.abort();

        changed.map_err(|_| PrecisionError(pps.path.clone()))?;

        let tick = *receiver.borrow().deref();

        Ok(precision(tick))
    }

    /// Continuously measure precision for `pps`.
    ///
    /// This will start updating precision through the returned `watch::Receiver` after
    /// `MIN_CHANGES` samples
    pub fn watch(&self, pps: &Pps) -> watch::Receiver<i32> {
        let (tick_sender, mut tick_receiver) = watch::channel(0.0);

        tokio::spawn(measure_ticks(pps.edges(), tick_sender));

        let (precision_sender, precision_receiver) = watch::channel(0);

        tokio::spawn(async move {
            while tick_receiver.changed().await.is_ok() {
                let tick = *tick_receiver.borrow().deref();

                if precision_sender.send(precision(tick)).is_err() {
                    break;
                }
            }
        });

        precision_receiver
    }
}

async fn measure_ticks(
    mut edges: watch::Receiver<Option<ioctl::data>>,
    tick_times: watch::Sender<f64>,
) {
    let mut tick = u32::MAX;
    let mut changes = 0;

    let mut last = match next_tick(&mut edges).await {
        Some(nsec) => nsec,
        None => return,
    };

    while let Some(val) = next_tick(&mut edges).await {
        let diff = val.abs_diff(last);
        last = val;

        if diff > MIN_CLOCK_INCREMENT {
            changes += 1;
            tick = diff.min(tick);
        }

        if changes > MIN_CHANGES && tick_times.send(tick as f64 / 1e9).is_err() {
            return;
        }
    }
}

/// Precision as the power of two nearest to `tick` seconds.
pub fn precision(mut tick: f64) -> i32 {
    let mut precision = 0;

    while tick <= 1.0 {
        tick *= 2.0;
        precision -= 1;
    }

    if tick - 1.0 > 1.0 - tick / 2.0 {
        precision += 1;
    }

    precision
}

async fn next_tick(edges: &mut watch::Receiver<Option<ioctl::data>>) -> Option<u32> {
    loop {
        edges.changed().await.ok()?;

        if let Some(data) = *edges.borrow().deref() {
            return Some(data.info.assert_tu.nsec.max(0) as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision() {
        assert_eq!(-20, precision(1e-6));
        assert_eq!(-30, precision(1e-9));
        assert_eq!(-1, precision(0.5));
    }
}
