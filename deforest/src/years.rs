use crate::LossError;

/// Year encoded by `lossyear == 0`; code `n` means loss in `BASE_YEAR + n`.
pub const BASE_YEAR: i32 = 2000;

/// An inclusive range of `lossyear` codes.
///
/// Code 0 means "no loss" and is never part of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LossCodes {
    start: u16,
    end: u16,
}

impl LossCodes {
    /// Converts the calendar years `year_min..=year_max` to codes.
    ///
    /// The lower bound is clamped to code 1, so any `year_min` up to
    /// 2001 starts at the first loss year. Both bounds are clamped to
    /// the largest code a band can hold.
    pub fn from_years(year_min: i32, year_max: i32) -> Result<Self, LossError> {
        let max_code = i32::from(u16::MAX);
        let start = year_min.saturating_sub(BASE_YEAR).clamp(1, max_code);
        let end = year_max.saturating_sub(BASE_YEAR).min(max_code);
        if year_min > year_max || start > end {
            return Err(invalid_range(year_min, year_max));
        }
        let start = u16::try_from(start).map_err(|_| invalid_range(year_min, year_max))?;
        let end = u16::try_from(end).map_err(|_| invalid_range(year_min, year_max))?;
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn contains(&self, code: u16) -> bool {
        self.start <= code && code <= self.end
    }

    /// Returns the calendar year `code` encodes.
    pub fn year(code: u16) -> i32 {
        BASE_YEAR + i32::from(code)
    }
}

fn invalid_range(year_min: i32, year_max: i32) -> LossError {
    LossError::InvalidRange { year_min, year_max }
}
