
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Offset in seconds between the NTP epoch (1900-01-01) and the Unix epoch.
pub const NTP_EPOCH_OFFSET: u32 = 2_208_988_800;

const TWO_POW_32: f64 = 65536.0 * 65536.0;

lazy_static! {
    // Sampled once, on the first call to RtpTime::now(). Readings after
    // that are monotonic-clock based, shifted back to wallclock.
    static ref CLOCK_ANCHOR: (Instant, f64) = {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        (Instant::now(), wall)
    };
}

/// A 64-bit NTP timestamp split into its most and least significant words:
/// seconds since 1900-01-01 UTC in `msw`, a binary fraction in `lsw`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NtpTime {
    msw: u32,
    lsw: u32,
}

impl NtpTime {
    pub fn new(msw: u32, lsw: u32) -> Self {
        NtpTime { msw, lsw }
    }

    /// Returns the most significant word.
    pub fn msw(&self) -> u32 {
        self.msw
    }

    /// Returns the least significant word.
    pub fn lsw(&self) -> u32 {
        self.lsw
    }
}

/// Wallclock time or a delay interval, stored as seconds with microsecond
/// resolution.
///
/// `now()` readings advance at the rate of the monotonic clock but stay
/// comparable to wallclock, so timestamps survive system clock jumps while
/// remaining usable for NTP report generation.
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd)]
pub struct RtpTime(f64);

impl RtpTime {
    pub const ZERO: RtpTime = RtpTime(0.0);

    /// Returns the current wallclock time as seconds since the Unix epoch.
    pub fn now() -> Self {
        let (anchor, wall) = &*CLOCK_ANCHOR;
        RtpTime(wall + anchor.elapsed().as_secs_f64())
    }

    /// Waits the amount of time specified in `delay`. A zero or negative
    /// delay returns immediately; otherwise the full interval elapses
    /// before this resolves.
    pub async fn wait(delay: RtpTime) {
        if delay.0 <= 0.0 {
            return;
        }
        tokio::time::sleep(Duration::from_secs_f64(delay.0)).await;
    }

    pub fn from_secs_f64(t: f64) -> Self {
        RtpTime(t)
    }

    pub fn from_secs_micros(seconds: i64, microseconds: u32) -> Self {
        if seconds >= 0 {
            RtpTime(seconds as f64 + 1e-6 * microseconds as f64)
        } else {
            RtpTime(-((-seconds) as f64 + 1e-6 * microseconds as f64))
        }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0
    }

    /// Returns the whole seconds stored in this instance.
    pub fn seconds(&self) -> i64 {
        self.0 as i64
    }

    /// Returns the fractional part expressed in microseconds.
    pub fn microseconds(&self) -> u32 {
        let t = self.0.abs();
        let sec = t as i64;
        let microsec = (1e6 * (t - sec as f64) + 0.5) as u32;
        microsec.min(999_999)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }

    /// Converts to a `Duration`; negative values clamp to zero.
    pub fn as_duration(&self) -> Duration {
        if self.0 <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(self.0)
        }
    }

    /// Returns the NTP timestamp corresponding to this instance.
    pub fn to_ntp(&self) -> NtpTime {
        let t = self.0.max(0.0);
        let sec = t as u32;
        let microsec = ((t - sec as f64) * 1e6) as u32;

        let msw = sec.wrapping_add(NTP_EPOCH_OFFSET);
        let lsw = ((microsec as f64 / 1e6) * TWO_POW_32) as u32;
        NtpTime::new(msw, lsw)
    }

    /// Converts an NTP timestamp back to Unix-epoch seconds. Timestamps
    /// before the Unix epoch yield zero.
    pub fn from_ntp(ntp: NtpTime) -> Self {
        if ntp.msw() < NTP_EPOCH_OFFSET {
            return RtpTime(0.0);
        }

        let sec = ntp.msw() - NTP_EPOCH_OFFSET;
        let microsec = ((ntp.lsw() as f64 / TWO_POW_32) * 1e6) as u32;
        RtpTime(sec as f64 + 1e-6 * microsec as f64)
    }
}

impl From<Duration> for RtpTime {
    fn from(d: Duration) -> Self {
        RtpTime(d.as_secs_f64())
    }
}

impl Add for RtpTime {
    type Output = RtpTime;

    fn add(self, rhs: RtpTime) -> RtpTime {
        RtpTime(self.0 + rhs.0)
    }
}

impl Sub for RtpTime {
    type Output = RtpTime;

    fn sub(self, rhs: RtpTime) -> RtpTime {
        RtpTime(self.0 - rhs.0)
    }
}

impl AddAssign for RtpTime {
    fn add_assign(&mut self, rhs: RtpTime) {
        self.0 += rhs.0;
    }
}

impl SubAssign for RtpTime {
    fn sub_assign(&mut self, rhs: RtpTime) {
        self.0 -= rhs.0;
    }
}
