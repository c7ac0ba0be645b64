//! MS-DOS date/time conversion.
//!
//! ZIP headers store the modification time as a pair of 16-bit words with
//! two-second resolution and a 1980 epoch.

use time::{Date, Month, PrimitiveDateTime, Time};

/// A raw DOS `(time, date)` pair as stored in ZIP headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable value.
    pub const MIN: DosDateTime = DosDateTime {
        time: 0,
        date: (1 << 5) | 1,
    };

    pub fn new(time: u16, date: u16) -> Self {
        Self { time, date }
    }

    /// Parse into a calendar value; `None` when the words do not form a valid date.
    pub fn to_datetime(self) -> Option<PrimitiveDateTime> {
        let year: i32 = (((self.date >> 9) & 0x7f) + 1980).into();
        let month = Month::try_from(((self.date >> 5) & 0xf) as u8).ok()?;
        let day = (self.date & 0x1f) as u8;
        let hour = ((self.time >> 11) & 0x1f) as u8;
        let minute = ((self.time >> 5) & 0x3f) as u8;
        let second = ((self.time & 0x1f) << 1) as u8;
        Some(PrimitiveDateTime::new(
            Date::from_calendar_date(year, month, day).ok()?,
            Time::from_hms(hour, minute, second).ok()?,
        ))
    }

    /// Encode a calendar value, clamping to the 1980..=2107 range DOS can hold.
    /// Odd seconds are rounded down.
    pub fn from_datetime(dt: PrimitiveDateTime) -> Self {
        let year = dt.year();
        if year < 1980 {
            return Self::MIN;
        }
        if year > 2107 {
            return Self {
                time: (23 << 11) | (59 << 5) | 29,
                date: (127 << 9) | (12 << 5) | 31,
            };
        }

        let date = (((year - 1980) as u16) << 9) | ((dt.month() as u16) << 5) | dt.day() as u16;
        let time = ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | (dt.second() as u16 >> 1);
        Self { time, date }
    }

    /// The current UTC wall-clock time.
    pub fn now() -> Self {
        let now = time::OffsetDateTime::now_utc();
        Self::from_datetime(PrimitiveDateTime::new(now.date(), now.time()))
    }
}
