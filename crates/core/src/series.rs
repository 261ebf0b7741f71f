//! Windowed aggregation of calibrated readings.
//!
//! Each sensor's series stands on its own timestamp axis; nothing here
//! interpolates or aligns across sensors.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::calibration::{calibrate_with_offset, CalibratedPoint, RawReading};
use crate::device::Device;
use crate::error::{StoreError, StoreResult};
use crate::store::{with_timeout, ReadingStore};
use crate::types::DeviceId;
use crate::window::TimeRange;

/// Readings stamped before 2000-01-01T00:00:00Z are treated as clock garbage.
const MIN_SANE_EPOCH_SECS: i64 = 946_684_800;

/// The calibrated readings of one sensor within one window.
///
/// Calibration happens lazily in [`points`](Self::points); iterating again
/// yields the same sequence.
#[derive(Debug, Clone)]
pub struct CalibratedSeries {
    device_id: DeviceId,
    offset_mm: f64,
    readings: Vec<RawReading>,
    dropped: usize,
}

impl CalibratedSeries {
    /// Build a series from whatever the store returned.
    ///
    /// Malformed readings (non-finite value, timestamp outside the window or
    /// before the sane epoch) are dropped individually. The rest are ordered
    /// by timestamp; the sort is stable so equal timestamps keep store order.
    pub fn from_readings(device: &Device, range: &TimeRange, readings: Vec<RawReading>) -> Self {
        let total = readings.len();
        let mut kept: Vec<RawReading> = readings
            .into_iter()
            .filter(|r| is_well_formed(r, range))
            .collect();
        kept.sort_by_key(|r| r.timestamp);

        let dropped = total - kept.len();
        if dropped > 0 {
            tracing::warn!(
                device_id = %device.id,
                dropped,
                "Dropped malformed readings from series"
            );
        }

        Self {
            device_id: device.id.clone(),
            offset_mm: device.effective_offset_mm(),
            readings: kept,
            dropped,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Number of malformed readings discarded while building the series.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Calibrated points in ascending timestamp order.
    pub fn points(
        &self,
    ) -> impl DoubleEndedIterator<Item = CalibratedPoint> + ExactSizeIterator + '_ {
        self.readings.iter().map(|r| CalibratedPoint {
            timestamp: r.timestamp,
            value: calibrate_with_offset(r.raw_value, self.offset_mm),
        })
    }

    /// The sensor's current value for this window.
    pub fn latest(&self) -> Option<CalibratedPoint> {
        self.points().next_back()
    }

    /// The two most recent points as `(previous, latest)`.
    pub fn last_two(&self) -> Option<(CalibratedPoint, CalibratedPoint)> {
        let mut rev = self.points().rev();
        let latest = rev.next()?;
        let previous = rev.next()?;
        Some((previous, latest))
    }
}

fn is_well_formed(reading: &RawReading, range: &TimeRange) -> bool {
    reading.raw_value.is_finite()
        && reading.timestamp.timestamp() >= MIN_SANE_EPOCH_SECS
        && range.contains(reading.timestamp)
}

/// Result of aggregating one sensor.
#[derive(Debug)]
pub enum SeriesOutcome {
    Ready(CalibratedSeries),
    /// The reading fetch failed or timed out; no data this time.
    Unavailable {
        device_id: DeviceId,
        error: StoreError,
    },
}

impl SeriesOutcome {
    pub fn device_id(&self) -> &str {
        match self {
            SeriesOutcome::Ready(series) => series.device_id(),
            SeriesOutcome::Unavailable { device_id, .. } => device_id,
        }
    }

    pub fn series(&self) -> Option<&CalibratedSeries> {
        match self {
            SeriesOutcome::Ready(series) => Some(series),
            SeriesOutcome::Unavailable { .. } => None,
        }
    }
}

/// Fetches and calibrates reading windows for any number of sensors.
#[derive(Clone)]
pub struct WindowedAggregator {
    readings: Arc<dyn ReadingStore>,
    fetch_timeout: Duration,
}

impl WindowedAggregator {
    pub fn new(readings: Arc<dyn ReadingStore>, fetch_timeout: Duration) -> Self {
        Self {
            readings,
            fetch_timeout,
        }
    }

    /// The calibrated series of one sensor over `range`.
    pub async fn series(
        &self,
        device: &Device,
        range: &TimeRange,
    ) -> StoreResult<CalibratedSeries> {
        let readings = with_timeout(
            "reading",
            self.fetch_timeout,
            self.readings.list_readings(&device.id, range.from, range.to),
        )
        .await?;
        Ok(CalibratedSeries::from_readings(device, range, readings))
    }

    /// Aggregate every sensor over the same range, concurrently.
    ///
    /// Outcomes are returned in the order of `devices`; a failure for one
    /// sensor never affects the others.
    pub async fn aggregate(&self, devices: &[Device], range: &TimeRange) -> Vec<SeriesOutcome> {
        join_all(devices.iter().map(|device| async move {
            match self.series(device, range).await {
                Ok(series) => SeriesOutcome::Ready(series),
                Err(error) => {
                    tracing::warn!(
                        device_id = %device.id,
                        error = %error,
                        "Reading fetch failed, series unavailable"
                    );
                    SeriesOutcome::Unavailable {
                        device_id: device.id.clone(),
                        error,
                    }
                }
            }
        }))
        .await
    }
}
