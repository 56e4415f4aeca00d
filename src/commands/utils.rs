use crate::error::BotError;
use chrono::NaiveDate;

/// Parses the day argument of `/geodaily`:
///
/// today
/// yesterday
/// 2024-05-01
pub fn parse_day(input: &str, today: NaiveDate) -> Result<NaiveDate, BotError> {
    let input = input.trim();
    match input.to_lowercase().as_str() {
        "" | "today" => Ok(today),
        "yesterday" => today
            .pred_opt()
            .ok_or_else(|| BotError::InvalidDate(input.to_string())),
        _ => NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .map_err(|_| BotError::InvalidDate(input.to_string())),
    }
}
